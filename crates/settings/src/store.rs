//! The settings store: snapshot publication, reset, and scoped edits.
//!
//! ## Lifecycle
//!
//! ```text
//! UNINITIALIZED --load/global--> ACTIVE --reset--> ACTIVE
//! ```
//!
//! Every `reset` starts a new generation. An edit records the generation it
//! started in and is discarded with [`SettingsError::StaleEdit`] if a reset
//! happened before it commits.
//!
//! ## Concurrency
//!
//! Readers clone an `Arc<Settings>` out of an `RwLock`; editors are serialised
//! by a separate mutex and mutate a private working copy. Publication is a
//! single pointer swap under the write lock, so a reader sees either the old
//! or the new snapshot, never a partial edit.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use tracing::{debug, info};

use crate::environment::read_dotenv_layer;
use crate::{Environment, KeyStore, Settings, SettingsError};

static GLOBAL: OnceLock<SettingsStore> = OnceLock::new();

/// Where a store reads environment variables from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// Re-capture the process environment on every (re)initialization.
    Process,
    /// Use a fixed snapshot.
    Fixed(Environment),
}

/// Construction options for a [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct SettingsOptions {
    /// Environment variable source.
    pub environment: EnvironmentSource,
    /// Directory containing `.env` files; `None` means the working directory.
    pub dotenv_dir: Option<PathBuf>,
    /// Whether dotenv files are read at load time.
    pub load_dotenv: bool,
    /// Durable credential storage.
    pub key_store: KeyStore,
}

impl SettingsOptions {
    /// Options for the process environment with a discovered key store.
    pub fn from_process() -> Result<Self, SettingsError> {
        Ok(Self {
            environment: EnvironmentSource::Process,
            dotenv_dir: None,
            load_dotenv: true,
            key_store: KeyStore::discover()?,
        })
    }

    /// Options for a fixed environment snapshot and key store, without dotenv
    /// loading. This is the form tests use.
    pub fn isolated(environment: Environment, key_store: KeyStore) -> Self {
        Self {
            environment: EnvironmentSource::Fixed(environment),
            dotenv_dir: None,
            load_dotenv: false,
            key_store,
        }
    }

    /// Enables dotenv loading from `dir`.
    pub fn with_dotenv_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dotenv_dir = Some(dir.into());
        self.load_dotenv = true;
        self
    }
}

/// Shared, explicitly passed configuration store.
#[derive(Debug)]
pub struct SettingsStore {
    environment: Mutex<EnvironmentSource>,
    dotenv_dir: Option<PathBuf>,
    dotenv_layer: Mutex<BTreeMap<String, String>>,
    key_store: KeyStore,
    current: RwLock<Arc<Settings>>,
    generation: AtomicU64,
    editor: Mutex<()>,
}

impl SettingsStore {
    /// Builds a store and derives its first snapshot.
    pub fn load(options: SettingsOptions) -> Result<Self, SettingsError> {
        let store = Self {
            environment: Mutex::new(options.environment),
            dotenv_dir: options.dotenv_dir,
            dotenv_layer: Mutex::new(BTreeMap::new()),
            key_store: options.key_store,
            current: RwLock::new(Arc::new(Settings::default())),
            generation: AtomicU64::new(0),
            editor: Mutex::new(()),
        };
        let settings = store.derive(options.load_dotenv)?;
        *store.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
        Ok(store)
    }

    /// The process-wide store, built from the process environment on first access.
    pub fn global() -> Result<&'static SettingsStore, SettingsError> {
        if let Some(store) = GLOBAL.get() {
            return Ok(store);
        }
        let store = Self::load(SettingsOptions::from_process()?)?;
        // A concurrent initializer may have won; either instance is equivalent.
        Ok(GLOBAL.get_or_init(|| store))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Key store backing this instance.
    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    /// Current generation; incremented by every reset.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Re-derives settings from the current environment and key store.
    ///
    /// With `reload_dotenv` the dotenv files are read again; otherwise the
    /// values loaded previously are reused. Edits in flight are discarded.
    pub fn reset(&self, reload_dotenv: bool) -> Result<Arc<Settings>, SettingsError> {
        let settings = Arc::new(self.derive(reload_dotenv)?);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *current = Arc::clone(&settings);
        info!(generation = self.generation(), reload_dotenv, "Settings reset");
        Ok(settings)
    }

    /// Replaces the environment source with a fixed snapshot, then resets.
    pub fn reset_with_environment(
        &self,
        environment: Environment,
        reload_dotenv: bool,
    ) -> Result<Arc<Settings>, SettingsError> {
        *self.environment.lock().unwrap_or_else(PoisonError::into_inner) =
            EnvironmentSource::Fixed(environment);
        self.reset(reload_dotenv)
    }

    /// Applies a scoped edit.
    ///
    /// `f` receives a working copy of the current settings. If it returns
    /// `Ok`, the copy is published atomically; with `persist` every credential
    /// assigned through [`Settings::set_credential`] is first written to the
    /// key store. If `f` returns an error or panics, nothing is published or
    /// persisted.
    ///
    /// Edits are serialised by a non-reentrant lock held while `f` runs, so
    /// calling `edit` on the same store from inside `f` deadlocks.
    pub fn edit<T, E, F>(&self, persist: bool, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Settings) -> Result<T, E>,
        E: From<SettingsError>,
    {
        let _editor = self.editor.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation();
        let mut working = Settings::clone(&self.snapshot());
        working.clear_edits();

        let value = f(&mut working)?;

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation() != generation {
            debug!(generation, "Discarding settings edit started before a reset");
            return Err(SettingsError::StaleEdit.into());
        }
        if persist {
            self.key_store.apply(&working.edited_credentials())?;
        }
        working.clear_edits();
        *current = Arc::new(working);
        debug!(persist, "Settings edit committed");
        Ok(value)
    }

    fn environment(&self) -> Environment {
        match &*self.environment.lock().unwrap_or_else(PoisonError::into_inner) {
            EnvironmentSource::Process => Environment::from_process(),
            EnvironmentSource::Fixed(env) => env.clone(),
        }
    }

    fn derive(&self, reload_dotenv: bool) -> Result<Settings, SettingsError> {
        let env = self.environment();
        let mut layer = self.dotenv_layer.lock().unwrap_or_else(PoisonError::into_inner);
        if env.dotenv_disabled()? {
            layer.clear();
        } else if reload_dotenv {
            let dir = match &self.dotenv_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir().map_err(|source| SettingsError::Io {
                    path: PathBuf::from("."),
                    source,
                })?,
            };
            *layer = read_dotenv_layer(&dir, &env)?;
        }
        let env = env.layered_over(&layer);
        Settings::from_sources(&env, &self.key_store.load()?)
    }
}
