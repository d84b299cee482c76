use crate::error::{ControllerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variables with this prefix override file settings,
/// e.g. `DOMAIN_CONTROLLER_HOST_TIMEOUT_MS=2000`.
pub const ENV_PREFIX: &str = "DOMAIN_CONTROLLER";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Per-host request timeout.
    pub host_timeout_ms: u64,
    /// Upper bound on hosts contacted at once.
    pub max_concurrent_dispatch: usize,
    /// Rollback eligibility of bare `submit_update` calls.
    pub rollback_single_updates: bool,
    pub log_level: String,
    /// Broadcast buffer of the event bus. Slow subscribers lag past it.
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host_timeout_ms: 5000,
            max_concurrent_dispatch: 16,
            rollback_single_updates: true,
            log_level: "info".to_string(),
            event_capacity: 256,
        }
    }
}

impl ControllerConfig {
    /// Loads the configuration from an optional file layered under the
    /// environment. A missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: ControllerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_dispatch == 0 {
            return Err(ControllerError::InvalidConfig(
                "max_concurrent_dispatch must be at least 1".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ControllerError::InvalidConfig(
                "event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_millis(self.host_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.host_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_concurrent_dispatch, 16);
        assert!(config.rollback_single_updates);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("domain-controller-{}.json", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "host_timeout_ms": 250, "rollback_single_updates": false }}"#).unwrap();

        let config = ControllerConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.host_timeout_ms, 250);
        assert!(!config.rollback_single_updates);
        assert_eq!(config.max_concurrent_dispatch, 16);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ControllerConfig::load(Some("/nonexistent/domain-controller")).unwrap();
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = ControllerConfig {
            max_concurrent_dispatch: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
