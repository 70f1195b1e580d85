//! Environment snapshots and dotenv layering.
//!
//! Settings are derived from an [`Environment`] value rather than from the
//! live process environment, so tests and concurrent runs can each build
//! their own view without mutating process state.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::SettingsError;

/// Disables dotenv loading when truthy.
pub const DISABLE_DOTENV_VAR: &str = "EVALKIT_DISABLE_DOTENV";

/// Selects the `.env.<name>` file loaded between `.env` and `.env.local`.
pub const ENV_NAME_VAR: &str = "EVALKIT_ENV";

/// A snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Captures the current process environment. Non-UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Builds an environment from explicit pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns a variable's value. Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Sets a variable, returning the modified snapshot.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Removes a variable, returning the modified snapshot.
    pub fn without(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }

    /// Parses a boolean flag. Unset is `Ok(None)`.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, SettingsError> {
        self.get(name).map(|raw| parse_bool(name, raw)).transpose()
    }

    /// Parses a numeric variable. Unset is `Ok(None)`.
    pub fn number<T>(&self, name: &str) -> Result<Option<T>, SettingsError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| SettingsError::InvalidValue {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Returns `true` if dotenv loading is disabled by [`DISABLE_DOTENV_VAR`].
    pub fn dotenv_disabled(&self) -> Result<bool, SettingsError> {
        Ok(self.flag(DISABLE_DOTENV_VAR)?.unwrap_or(false))
    }

    /// Adds values from `layer` that are not already present.
    ///
    /// The snapshot's own values always win over dotenv values.
    pub fn layered_over(mut self, layer: &BTreeMap<String, String>) -> Self {
        for (k, v) in layer {
            if self.get(k).is_none() {
                self.vars.insert(k.clone(), v.clone());
            }
        }
        self
    }
}

/// Reads the dotenv files in `dir`: `.env`, then `.env.<EVALKIT_ENV>`, then
/// `.env.local`. Later files override earlier ones. Missing files are skipped.
///
/// `env` is consulted only for [`ENV_NAME_VAR`]; nothing is written to the
/// process environment.
pub fn read_dotenv_layer(
    dir: &Path,
    env: &Environment,
) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut files = vec![dir.join(".env")];
    if let Some(name) = env.get(ENV_NAME_VAR) {
        files.push(dir.join(format!(".env.{}", name.trim())));
    }
    files.push(dir.join(".env.local"));

    let mut layer = BTreeMap::new();
    for path in files {
        if !path.is_file() {
            continue;
        }
        let entries = dotenvy::from_path_iter(&path).map_err(|source| SettingsError::Dotenv {
            path: path.clone(),
            source,
        })?;
        let mut count = 0usize;
        for entry in entries {
            let (key, value) = entry.map_err(|source| SettingsError::Dotenv {
                path: path.clone(),
                source,
            })?;
            layer.insert(key, value);
            count += 1;
        }
        debug!(path = %path.display(), entries = count, "Loaded dotenv file");
    }
    Ok(layer)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Ok(true),
        "0" | "false" | "no" | "off" | "n" => Ok(false),
        other => Err(SettingsError::InvalidValue {
            name: name.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
