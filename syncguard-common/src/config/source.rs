//! Source tracking for resolved configuration values.

use serde::Serialize;
use std::path::PathBuf;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Config file at the given path.
    File(PathBuf),
    /// `SYNCGUARD_*` environment variable.
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File(path) => write!(f, "file ({})", path.display()),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// A value together with the layer that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// Environment variable name when `source` is `Environment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            env_var: None,
        }
    }

    pub fn from_file(value: T, path: PathBuf) -> Self {
        Self {
            value,
            source: ConfigSource::File(path),
            env_var: None,
        }
    }

    pub fn from_env(value: T, var: String) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            env_var: Some(var),
        }
    }

    /// Replace this value with `other` when `other` came from the environment.
    pub fn overridden_by(self, other: Sourced<T>) -> Self {
        if other.source == ConfigSource::Environment {
            other
        } else {
            self
        }
    }

    /// Describe the origin for display (`env SYNCGUARD_X`, `file (...)`, `default`).
    pub fn origin(&self) -> String {
        match (&self.source, &self.env_var) {
            (ConfigSource::Environment, Some(var)) => format!("env {var}"),
            (source, _) => source.to_string(),
        }
    }
}
