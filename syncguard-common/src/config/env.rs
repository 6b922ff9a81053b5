//! `SYNCGUARD_*` environment overrides.
//!
//! A bad value never aborts parsing on its own. The parser falls back to the
//! default, remembers what was wrong, and lets the caller report every
//! problem in one go.

use super::source::Sourced;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("{var}={value:?} is not a valid {expected}")]
    InvalidValue {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("{var}={value} is outside {min}..={max}")]
    OutOfRange {
        var: String,
        value: u32,
        min: u32,
        max: u32,
    },
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Reads prefixed variables into [`Sourced`] values.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self::with_prefix("SYNCGUARD_")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    pub fn var_name(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Look up `name` and run `parse` on its raw value.
    ///
    /// Unset variables yield `default` silently. A parse failure yields
    /// `default` and records the error.
    fn read<T>(
        &mut self,
        name: &str,
        default: T,
        parse: impl FnOnce(&str, &str) -> Result<T, EnvError>,
    ) -> Sourced<T> {
        let var = self.var_name(name);
        let Ok(raw) = env::var(&var) else {
            return Sourced::default_value(default);
        };
        match parse(&var, &raw) {
            Ok(value) => Sourced::from_env(value, var),
            Err(err) => {
                self.errors.push(err);
                Sourced::default_value(default)
            }
        }
    }

    /// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitively. An
    /// empty value means false.
    pub fn get_bool(&mut self, name: &str, default: bool) -> Sourced<bool> {
        self.read(name, default, |var, raw| {
            parse_bool(raw).ok_or_else(|| invalid(var, raw, "boolean (true/false/1/0/yes/no)"))
        })
    }

    pub fn get_u32_range(&mut self, name: &str, default: u32, min: u32, max: u32) -> Sourced<u32> {
        self.read(name, default, |var, raw| {
            let value: u32 = raw
                .trim()
                .parse()
                .map_err(|_| invalid(var, raw, "unsigned integer"))?;
            if (min..=max).contains(&value) {
                Ok(value)
            } else {
                Err(EnvError::OutOfRange {
                    var: var.to_string(),
                    value,
                    min,
                    max,
                })
            }
        })
    }

    /// A tracing level name, normalized to lowercase.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        self.read(name, default.to_string(), |var, raw| {
            parse_log_level(raw).ok_or_else(|| invalid(var, raw, "log level (trace/debug/info/warn/error)"))
        })
    }

    /// Blank values count as unset.
    pub fn get_optional_path(&mut self, name: &str) -> Sourced<Option<PathBuf>> {
        let path = self.read(name, None, |_, raw| {
            let trimmed = raw.trim();
            Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
        });
        if path.value.is_none() {
            return Sourced::default_value(None);
        }
        path
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(var: &str, raw: &str, expected: &'static str) -> EnvError {
    EnvError::InvalidValue {
        var: var.to_string(),
        value: raw.to_string(),
        expected,
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_log_level(value: &str) -> Option<String> {
    let level = value.trim().to_ascii_lowercase();
    LOG_LEVELS.contains(&level.as_str()).then_some(level)
}
