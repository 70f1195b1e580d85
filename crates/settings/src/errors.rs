//! Errors raised while loading, editing, or persisting settings.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key store {path} is not a JSON object of strings: {source}")]
    KeyStoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read dotenv file {path}: {source}")]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    /// The store was reset while the edit was in progress; the edit was discarded.
    #[error("settings were reset during the edit; changes discarded")]
    StaleEdit,

    #[error("unable to determine a directory for the key store")]
    NoKeyStoreLocation,
}
