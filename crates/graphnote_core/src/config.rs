//! Engine configuration.
//!
//! # Responsibility
//! - Collect tunables (autosave delay, start workspace, optional search cap).
//! - Read overrides from `GRAPHNOTE_*` environment variables.
//!
//! # Invariants
//! - Autosave delay is never zero; a search limit, when set, is never zero.

use crate::autosave::DEFAULT_AUTOSAVE_DELAY;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Environment variable names.
pub mod env_vars {
    pub const AUTOSAVE_MS: &str = "GRAPHNOTE_AUTOSAVE_MS";
    pub const DEFAULT_WORKSPACE: &str = "GRAPHNOTE_DEFAULT_WORKSPACE";
    pub const SEARCH_LIMIT: &str = "GRAPHNOTE_SEARCH_LIMIT";
    pub const LOG_LEVEL: &str = "GRAPHNOTE_LOG_LEVEL";
    pub const LOG_DIR: &str = "GRAPHNOTE_LOG_DIR";
}

/// Workspace opened after sign-in when nothing else is selected.
pub const DEFAULT_WORKSPACE_NAME: &str = "Personal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: `{value}`"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub autosave_delay: Duration,
    pub default_workspace: String,
    /// `None` returns every search match.
    pub search_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            default_workspace: DEFAULT_WORKSPACE_NAME.to_string(),
            search_limit: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(env_vars::AUTOSAVE_MS) {
            config.autosave_delay = Duration::from_millis(parse_positive(env_vars::AUTOSAVE_MS, &raw)?);
        }
        if let Some(raw) = lookup(env_vars::DEFAULT_WORKSPACE) {
            let name = raw.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: env_vars::DEFAULT_WORKSPACE,
                    value: raw,
                });
            }
            config.default_workspace = name.to_string();
        }
        if let Some(raw) = lookup(env_vars::SEARCH_LIMIT) {
            config.search_limit = Some(parse_positive(env_vars::SEARCH_LIMIT, &raw)? as usize);
        }

        Ok(config)
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{env_vars, ConfigError, EngineConfig};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_editor_behavior() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.autosave_delay, Duration::from_secs(1));
        assert_eq!(config.default_workspace, "Personal");
        assert_eq!(config.search_limit, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup(&[
            (env_vars::AUTOSAVE_MS, "250"),
            (env_vars::DEFAULT_WORKSPACE, " Shared "),
            (env_vars::SEARCH_LIMIT, "5"),
        ]))
        .unwrap();
        assert_eq!(config.autosave_delay, Duration::from_millis(250));
        assert_eq!(config.default_workspace, "Shared");
        assert_eq!(config.search_limit, Some(5));
    }

    #[test]
    fn zero_delay_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[(env_vars::AUTOSAVE_MS, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == env_vars::AUTOSAVE_MS
        ));
    }

    #[test]
    fn zero_search_limit_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[(env_vars::SEARCH_LIMIT, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == env_vars::SEARCH_LIMIT
        ));
    }
}
