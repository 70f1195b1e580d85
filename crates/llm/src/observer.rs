//! Ready-made [`CallObserver`] implementations.

use std::sync::{Mutex, MutexGuard, PoisonError};

use schema::{CallObserver, CallRecord};
use tracing::{info, warn};

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<CallRecord>>,
}

impl RecordingObserver {
    /// An observer with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of the records seen so far.
    pub fn records(&self) -> Vec<CallRecord> {
        self.lock().clone()
    }

    /// Removes and returns the records seen so far.
    pub fn take(&self) -> Vec<CallRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no records are held.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CallRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallObserver for RecordingObserver {
    fn on_call(&self, record: &CallRecord) {
        self.lock().push(record.clone());
    }
}

/// Emits one structured `tracing` event per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_call(&self, record: &CallRecord) {
        let model = record.input.model().unwrap_or_default();
        let elapsed_ms = (record.finished_at.as_datetime() - record.started_at.as_datetime())
            .num_milliseconds();

        if let Some(error) = &record.error {
            warn!(
                call_id = %record.id,
                provider = %record.provider,
                model,
                elapsed_ms,
                error = %error,
                "Provider call failed"
            );
            return;
        }

        let output = record.output.as_ref();
        let usage = output.and_then(|o| o.usage).unwrap_or_default();
        let tools_called = output
            .and_then(|o| o.tools_called.as_ref())
            .map_or(0, Vec::len);
        info!(
            call_id = %record.id,
            provider = %record.provider,
            model,
            elapsed_ms,
            input_tokens = usage.input_tokens.as_u64(),
            output_tokens = usage.output_tokens.as_u64(),
            tools_called,
            "Provider call completed"
        );
    }
}
