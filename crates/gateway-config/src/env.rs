//! Environment variable loading with type conversion and prefixed defaults.
//!
//! Every gateway setting in [`crate::GatewayConfig`] is loaded through one
//! of these helpers, keeping env-var parsing in a single place so error
//! messages stay consistent across the config surface.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Environment loading errors.
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("environment variable not found: {var}")]
    NotFound { var: String },

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Loads `GATEWAY_`-prefixed environment variables with per-field defaults.
pub struct EnvConfigLoader {
    prefix: String,
    defaults: HashMap<String, String>,
}

impl EnvConfigLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            defaults: HashMap::new(),
        }
    }

    pub fn default(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(var.into(), value.into());
        self
    }

    fn full_name(&self, var: &str) -> String {
        format!("{}{}", self.prefix, var)
    }

    /// Required string, falling back to a registered default.
    pub fn get(&self, var: &str) -> Result<String, EnvError> {
        let full = self.full_name(var);
        env::var(&full).or_else(|_| {
            self.defaults
                .get(var)
                .cloned()
                .ok_or_else(|| EnvError::NotFound { var: full.clone() })
        })
    }

    /// Optional string: `None` if unset and no default registered.
    pub fn get_optional(&self, var: &str) -> Option<String> {
        env::var(self.full_name(var)).ok().or_else(|| self.defaults.get(var).cloned())
    }

    pub fn get_u64(&self, var: &str) -> Result<u64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.full_name(var),
            reason: format!("not an unsigned integer: {e}"),
        })
    }

    pub fn get_usize(&self, var: &str) -> Result<usize, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.full_name(var),
            reason: format!("not a usize: {e}"),
        })
    }

    pub fn get_u32(&self, var: &str) -> Result<u32, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.full_name(var),
            reason: format!("not a u32: {e}"),
        })
    }

    pub fn get_seconds(&self, var: &str) -> Result<Duration, EnvError> {
        Ok(Duration::from_secs(self.get_u64(var)?))
    }

    pub fn get_millis(&self, var: &str) -> Result<u64, EnvError> {
        self.get_u64(var)
    }

    /// Comma-separated list, trimmed, empty entries dropped.
    pub fn get_list(&self, var: &str) -> Result<Vec<String>, EnvError> {
        let value = self.get(var)?;
        Ok(value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_registered_default_when_env_unset() {
        let loader = EnvConfigLoader::new("GATEWAY_TEST_UNSET_").default("session_ttl", "86400");
        assert_eq!(loader.get("session_ttl").unwrap(), "86400");
    }

    #[test]
    fn missing_without_default_is_an_error() {
        let loader = EnvConfigLoader::new("GATEWAY_TEST_MISSING_");
        assert!(matches!(loader.get("nope"), Err(EnvError::NotFound { .. })));
    }

    #[test]
    fn list_parses_and_trims_comma_separated_values() {
        let loader = EnvConfigLoader::new("GATEWAY_TEST_LIST_").default("roles", "ADMIN, DEVELOPER,, USER");
        assert_eq!(
            loader.get_list("roles").unwrap(),
            vec!["ADMIN".to_string(), "DEVELOPER".to_string(), "USER".to_string()]
        );
    }
}
