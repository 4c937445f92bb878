//! Poller configuration, loaded once at startup from YAML.
//!
//! ```yaml
//! host: 192.168.1.50
//! poll_interval_secs: 10
//! request_timeout_secs: 5
//! max_consecutive_failures: 5
//! tolerate_startup_failure: true
//! transmitters:
//!   iss: 2
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::fetch::{DeviceEndpoint, DEFAULT_PORT};
use crate::mapper::BindingHints;

/// Fastest rate the device sustains.
pub const MIN_SUSTAINED_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollConfig {
    /// Hostname or IP address of the WeatherLink Live. Required, but may
    /// come from the command line instead of the file.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Immediate retries within one tick before the tick counts as failed.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Failed ticks in a row tolerated before a fatal error is raised.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// When false, an unreachable device on the first tick is fatal.
    #[serde(default = "default_tolerate_startup_failure")]
    pub tolerate_startup_failure: bool,

    /// Preferred logical id per block kind, for setups with several
    /// transmitters of the same kind.
    #[serde(default)]
    pub transmitters: BindingHints,

    /// Display name reported to the host.
    #[serde(default)]
    pub hardware: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_poll_interval() -> u64 {
    MIN_SUSTAINED_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    5
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_tolerate_startup_failure() -> bool {
    true
}

impl PollConfig {
    /// Defaults for everything but the host.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: 0,
            max_consecutive_failures: default_max_consecutive_failures(),
            tolerate_startup_failure: default_tolerate_startup_failure(),
            transmitters: BindingHints::new(),
            hardware: None,
        }
    }

    /// Load and validate configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` with `host_override` replacing the file's host.
    ///
    /// With an override, a missing file means defaults for that host.
    pub fn resolve(path: &Path, host_override: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match host_override {
            Some(host) if !path.exists() => {
                log::info!(
                    "Config file {} not found, using defaults for {}",
                    path.display(),
                    host
                );
                Self::for_host(host)
            }
            _ => {
                log::info!("Loading config from: {}", path.display());
                let content = std::fs::read_to_string(path)?;
                serde_yaml::from_str::<Self>(&content)?
            }
        };
        if let Some(host) = host_override {
            config.host = host.to_string();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable values; warn about ones the device may not sustain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::Invalid(
                "`host` (WeatherLink Live hostname or IP) is required".to_string(),
            ));
        }
        if host.contains('/') || host.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "`host` must be a bare hostname or IP, got '{}'",
                self.host
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "`poll_interval_secs` must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "`request_timeout_secs` must be at least 1".to_string(),
            ));
        }

        if self.poll_interval_secs < MIN_SUSTAINED_INTERVAL_SECS {
            log::warn!(
                "poll_interval_secs={} is below the {}s the device sustains",
                self.poll_interval_secs,
                MIN_SUSTAINED_INTERVAL_SECS
            );
        }
        if self.request_timeout_secs > self.poll_interval_secs {
            log::warn!(
                "request_timeout_secs={} exceeds poll_interval_secs={}; slow polls will skip ticks",
                self.request_timeout_secs,
                self.poll_interval_secs
            );
        }
        Ok(())
    }

    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint::new(self.host.trim(), self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::BlockKind;
    use std::io::Write;

    #[test]
    fn test_minimal_config_defaults() {
        let config = PollConfig::from_yaml("host: 192.168.1.50\n").unwrap();
        assert_eq!(config, PollConfig::for_host("192.168.1.50"));
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.max_consecutive_failures, 5);
        assert!(config.tolerate_startup_failure);
        assert!(config.transmitters.is_empty());
        assert_eq!(
            config.endpoint().current_conditions_url(),
            "http://192.168.1.50:80/v1/current_conditions"
        );
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
host: wll.local
port: 8080
poll_interval_secs: 30
request_timeout_secs: 4
retry_attempts: 2
retry_delay_ms: 250
max_consecutive_failures: 10
tolerate_startup_failure: false
hardware: "WeatherLink Live (roof)"
transmitters:
  iss: 2
  leaf_soil: 3
"#;
        let config = PollConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert!(!config.tolerate_startup_failure);
        assert_eq!(config.hardware.as_deref(), Some("WeatherLink Live (roof)"));
        assert_eq!(config.transmitters.get(&BlockKind::Iss), Some(&2));
        assert_eq!(config.transmitters.get(&BlockKind::LeafSoil), Some(&3));
    }

    #[test]
    fn test_missing_host_is_invalid() {
        let err = PollConfig::from_yaml("poll_interval_secs: 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");
    }

    #[test]
    fn test_unknown_transmitter_kind_is_parse_error() {
        let err = PollConfig::from_yaml("host: a\ntransmitters:\n  lightning: 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
    }

    #[test]
    fn test_invalid_values() {
        for yaml in [
            "host: ''",
            "host: 'http://1.2.3.4/'",
            "host: 1.2.3.4\npoll_interval_secs: 0",
            "host: 1.2.3.4\nrequest_timeout_secs: 0",
        ] {
            let err = PollConfig::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml}: {err:?}");
        }
    }

    #[test]
    fn test_fast_interval_is_accepted() {
        let config = PollConfig::from_yaml("host: 1.2.3.4\npoll_interval_secs: 2").unwrap();
        assert_eq!(config.poll_interval_secs, 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: 10.0.0.7\npoll_interval_secs: 15").unwrap();

        let config = PollConfig::load(file.path()).unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PollConfig::load(Path::new("/nonexistent/wll.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_resolve_host_override_fills_file_without_host() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_secs: 20\nretry_attempts: 3").unwrap();

        let config = PollConfig::resolve(file.path(), Some("10.0.0.9")).unwrap();
        assert_eq!(config.host, "10.0.0.9");
        assert_eq!(config.poll_interval_secs, 20);
        assert_eq!(config.retry_attempts, 3);

        let err = PollConfig::resolve(file.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");
    }

    #[test]
    fn test_resolve_host_override_replaces_file_host() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: 10.0.0.7").unwrap();

        let config = PollConfig::resolve(file.path(), Some("wll.local")).unwrap();
        assert_eq!(config.host, "wll.local");
    }

    #[test]
    fn test_resolve_missing_file() {
        let path = Path::new("/nonexistent/wll.yaml");
        let config = PollConfig::resolve(path, Some("10.0.0.9")).unwrap();
        assert_eq!(config, PollConfig::for_host("10.0.0.9"));

        let err = PollConfig::resolve(path, None).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
