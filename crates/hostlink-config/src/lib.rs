use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Default liveness timeout: silence longer than this drops the link
pub const DEFAULT_NO_MESSAGE_TIMEOUT_MS: u64 = 40_000;

/// Default pause between failed connection attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// One supervised connection to a host
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinkConfig {
    /// Link role, also the namespace of its disable keys
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[serde(default = "default_no_message_timeout_ms")]
    #[validate(range(min = 1))]
    pub no_message_timeout_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    #[validate(range(min = 1))]
    pub retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,
}

fn default_no_message_timeout_ms() -> u64 {
    DEFAULT_NO_MESSAGE_TIMEOUT_MS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl LinkConfig {
    pub fn no_message_timeout(&self) -> Duration {
        Duration::from_millis(self.no_message_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Host link agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentConfig {
    #[validate(length(min = 1))]
    pub service_name: String,
    #[validate(length(min = 1))]
    pub log_level: String,
    #[validate(range(min = 1, max = 65535))]
    pub metrics_port: u16,
    #[validate(length(min = 1), nested)]
    pub links: Vec<LinkConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_name: "hostlink".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            links: vec![LinkConfig {
                name: "host".to_string(),
                host: "127.0.0.1".to_string(),
                port: 9000,
                no_message_timeout_ms: DEFAULT_NO_MESSAGE_TIMEOUT_MS,
                retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
                connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            }],
        }
    }
}

/// Load configuration from file, with `HOSTLINK_` environment overrides
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("HOSTLINK"))
        .build()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Load configuration from YAML string (for testing)
pub fn load_from_yaml<T>(yaml: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::LoadError(e.to_string()))?;
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.service_name, "hostlink");
        assert_eq!(config.links.len(), 1);
        assert_eq!(config.links[0].no_message_timeout(), Duration::from_secs(40));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_applies_defaults() {
        let yaml = r#"
service_name: egm-host
log_level: debug
metrics_port: 8080
links:
  - name: bingo
    host: 10.0.0.10
    port: 7500
  - name: progressive
    host: 10.0.0.11
    port: 7600
    no_message_timeout_ms: 15000
    retry_delay_ms: 250
"#;
        let config: AgentConfig = load_from_yaml(yaml).unwrap();
        assert_eq!(config.links.len(), 2);

        let bingo = &config.links[0];
        assert_eq!(bingo.name, "bingo");
        assert_eq!(bingo.no_message_timeout_ms, DEFAULT_NO_MESSAGE_TIMEOUT_MS);
        assert_eq!(bingo.retry_delay(), Duration::from_secs(1));
        assert_eq!(bingo.connect_timeout(), Duration::from_secs(5));

        let progressive = &config.links[1];
        assert_eq!(progressive.no_message_timeout(), Duration::from_secs(15));
        assert_eq!(progressive.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_validation_error_on_empty_links() {
        let yaml = r#"
service_name: egm-host
log_level: info
metrics_port: 9090
links: []
"#;
        let result: Result<AgentConfig, _> = load_from_yaml(yaml);
        match result {
            Err(ConfigError::ValidationError(_)) => (), // Expected
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_validation_error_in_nested_link() {
        let yaml = r#"
service_name: egm-host
log_level: info
metrics_port: 9090
links:
  - name: bingo
    host: ""
    port: 7500
"#;
        let result: Result<AgentConfig, _> = load_from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let yaml = r#"
name: bingo
host: 10.0.0.10
port: 7500
no_message_timeout_ms: 0
"#;
        let result: Result<LinkConfig, _> = load_from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_malformed_yaml_is_load_error() {
        let result: Result<LinkConfig, _> = load_from_yaml("name: [unterminated");
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
