//! Evaluation record attached to every intercepted provider call.

use serde::{Deserialize, Serialize};

use crate::{CallId, InputParameters, OutputParameters, ProviderSlug, Timestamp};

/// Everything the metrics layer learns about one provider call.
///
/// `output` is `None` only when the call itself failed; a response that could
/// not be interpreted still yields `Some(OutputParameters::default())`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Correlation identifier, also present on the call's tracing span.
    pub id: CallId,
    /// Provider that served the call.
    pub provider: ProviderSlug,
    /// When the call was intercepted.
    pub started_at: Timestamp,
    /// When the final attempt returned.
    pub finished_at: Timestamp,
    /// Canonical request.
    pub input: InputParameters,
    /// Canonical response, absent if the call failed.
    pub output: Option<OutputParameters>,
    /// Display form of the surfaced error, if the call failed.
    pub error: Option<String>,
}

impl CallRecord {
    /// Returns `true` if the provider call succeeded.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
