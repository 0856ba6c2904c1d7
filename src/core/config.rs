/*!
 * Supervisor Configuration
 *
 * Runtime configuration with defaults from `limits` and overrides from the
 * environment:
 * - SUPERVISOR_SHM_NAME: shared segment name (default: /myshm)
 * - SUPERVISOR_POLL_INTERVAL_MS: reaper sweep interval (default: 1000)
 * - SUPERVISOR_SHELL: shell used for `-c <command>` (default: sh)
 * - SUPERVISOR_TRACE_JSON: JSON log output (default: false)
 */

use super::errors::{ConfigError, ResourceError};
use super::limits::{DEFAULT_POLL_INTERVAL, DEFAULT_SHELL, DEFAULT_SHM_NAME};
use std::time::Duration;

pub const ENV_SHM_NAME: &str = "SUPERVISOR_SHM_NAME";
pub const ENV_POLL_INTERVAL_MS: &str = "SUPERVISOR_POLL_INTERVAL_MS";
pub const ENV_SHELL: &str = "SUPERVISOR_SHELL";
pub const ENV_TRACE_JSON: &str = "SUPERVISOR_TRACE_JSON";

/// Supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Name of the shared segment holding the slot table
    pub shm_name: String,
    /// Interval between reaper sweeps
    pub poll_interval: Duration,
    /// Shell that interprets command lines
    pub shell: String,
    /// Emit JSON logs instead of the compact format
    pub trace_json: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shm_name: DEFAULT_SHM_NAME.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            shell: DEFAULT_SHELL.to_string(),
            trace_json: false,
        }
    }
}

impl SupervisorConfig {
    /// Build from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_SHM_NAME) {
            validate_segment_name(&name).map_err(|e| invalid(ENV_SHM_NAME, &name, e))?;
            config.shm_name = name;
        }

        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|e| invalid(ENV_POLL_INTERVAL_MS, &raw, e))?;
            if millis == 0 {
                return Err(invalid(ENV_POLL_INTERVAL_MS, &raw, "must be positive"));
            }
            config.poll_interval = Duration::from_millis(millis);
        }

        if let Some(shell) = lookup(ENV_SHELL) {
            if shell.trim().is_empty() {
                return Err(invalid(ENV_SHELL, &shell, "must not be empty"));
            }
            config.shell = shell;
        }

        if let Some(raw) = lookup(ENV_TRACE_JSON) {
            config.trace_json = raw == "1" || raw.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }
}

/// POSIX shm names are a single path component with a leading slash
pub fn validate_segment_name(name: &str) -> Result<(), ResourceError> {
    let valid = name.len() > 1
        && name.starts_with('/')
        && !name[1..].contains('/')
        && !name.contains('\0');
    if valid {
        Ok(())
    } else {
        Err(ResourceError::InvalidName(name.to_string()))
    }
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = SupervisorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, SupervisorConfig::default());
        assert_eq!(config.shm_name, "/myshm");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = SupervisorConfig::from_lookup(lookup_from(&[
            (ENV_SHM_NAME, "/other"),
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_SHELL, "/bin/bash"),
            (ENV_TRACE_JSON, "true"),
        ]))
        .unwrap();

        assert_eq!(config.shm_name, "/other");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.shell, "/bin/bash");
        assert!(config.trace_json);
    }

    #[test]
    fn test_rejects_bad_interval() {
        for raw in ["abc", "0", "-5"] {
            let result =
                SupervisorConfig::from_lookup(lookup_from(&[(ENV_POLL_INTERVAL_MS, raw)]));
            assert!(matches!(result, Err(ConfigError::InvalidValue { .. })), "{raw}");
        }
    }

    #[test]
    fn test_rejects_bad_segment_names() {
        for name in ["myshm", "/", "/a/b", ""] {
            assert!(validate_segment_name(name).is_err(), "{name}");
        }
        assert!(validate_segment_name("/myshm").is_ok());

        let result = SupervisorConfig::from_lookup(lookup_from(&[(ENV_SHM_NAME, "no-slash")]));
        assert!(result.is_err());
    }
}
