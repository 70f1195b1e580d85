//! evalkit configuration store.
//!
//! Holds the API keys, endpoints, and feature flags every provider adapter
//! needs, and enforces a single precedence rule for credentials:
//!
//! ```text
//! explicit argument > environment variable > key-store file > None
//! ```
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Environment capture, dotenv parsing, and key-store file
//! I/O live here. Adapters receive an `Arc<Settings>` snapshot (or a
//! `&SettingsStore`) by reference; nothing reads credentials from ambient
//! global state.
//!
//! ## Mutation
//!
//! [`SettingsStore::edit`] is the only way to change settings. An edit works
//! on a private copy, publishes it atomically, and optionally persists changed
//! credentials to the [`KeyStore`]. A failed or panicking edit leaves the
//! published snapshot untouched.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`keys`] | `SettingKey`, credential names and their environment variables |
//! | [`environment`] | `Environment` snapshots and dotenv layering |
//! | [`key_store`] | `KeyStore`, the `.evalkit/keys.json` file |
//! | [`settings`] | `Settings`, `RetrySettings`, `SdkRetryProviders` |
//! | [`store`] | `SettingsStore`: snapshots, reset, scoped edits |
//! | [`errors`] | `SettingsError` |

pub mod environment;
pub mod errors;
pub mod key_store;
pub mod keys;
pub mod settings;
pub mod store;

pub use environment::Environment;
pub use errors::SettingsError;
pub use key_store::KeyStore;
pub use keys::SettingKey;
pub use settings::{RetrySettings, SdkRetryProviders, Settings};
pub use store::{EnvironmentSource, SettingsOptions, SettingsStore};
