//! Stream controller configuration.
//!
//! Configuration is loaded from environment variables. The API password is
//! held as a `SecretString` and redacted in Debug output.

use crate::services::admission::{EvictionPolicy, DEFAULT_MAX_STREAMS};
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8083";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default drain period after a shutdown signal, in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "sc";

/// Credentials for HTTP Basic auth on the stream routes.
#[derive(Clone)]
pub struct ApiCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Stream controller configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8083").
    pub bind_address: String,

    /// Registry capacity (default: 4).
    pub max_streams: usize,

    /// Which stream gets evicted when the registry is full.
    pub eviction_policy: EvictionPolicy,

    /// Per-request timeout in seconds (default: 30).
    pub request_timeout_seconds: u64,

    /// Basic auth credentials. `None` leaves the stream routes open.
    pub api_credentials: Option<ApiCredentials>,

    /// Unique identifier for this instance, reported by `/health`.
    pub instance_id: String,

    /// Seconds to wait after a shutdown signal before exiting (default: 30).
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let username = self
            .api_credentials
            .as_ref()
            .map(|credentials| credentials.username.as_str());

        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("max_streams", &self.max_streams)
            .field("eviction_policy", &self.eviction_policy)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("api_username", &username)
            .field(
                "api_password",
                &self.api_credentials.as_ref().map(|_| "[REDACTED]"),
            )
            .field("instance_id", &self.instance_id)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid max streams configuration: {0}")]
    InvalidMaxStreams(String),

    #[error("Invalid eviction policy configuration: {0}")]
    InvalidEvictionPolicy(String),

    #[error("Invalid request timeout configuration: {0}")]
    InvalidRequestTimeout(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),

    #[error("Invalid API credentials configuration: {0}")]
    InvalidCredentials(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let max_streams = if let Some(value_str) = vars.get("SC_MAX_STREAMS") {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidMaxStreams(format!(
                    "SC_MAX_STREAMS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidMaxStreams(
                    "SC_MAX_STREAMS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_MAX_STREAMS
        };

        let eviction_policy = match vars.get("SC_EVICTION_POLICY") {
            Some(value_str) => value_str
                .parse::<EvictionPolicy>()
                .map_err(ConfigError::InvalidEvictionPolicy)?,
            None => EvictionPolicy::default(),
        };

        let request_timeout_seconds = parse_seconds(
            vars,
            "SC_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )
        .map_err(ConfigError::InvalidRequestTimeout)?;

        if request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidRequestTimeout(
                "SC_REQUEST_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        // Zero is allowed and skips the drain
        let drain_seconds = parse_seconds(vars, "SC_DRAIN_SECONDS", DEFAULT_DRAIN_SECONDS)
            .map_err(ConfigError::InvalidDrainPeriod)?;

        let api_credentials = match (vars.get("SC_API_USERNAME"), vars.get("SC_API_PASSWORD")) {
            (Some(username), Some(password)) => {
                if username.is_empty() || password.is_empty() {
                    return Err(ConfigError::InvalidCredentials(
                        "SC_API_USERNAME and SC_API_PASSWORD must not be empty".to_string(),
                    ));
                }
                Some(ApiCredentials {
                    username: username.clone(),
                    password: SecretString::from(password.clone()),
                })
            }
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidCredentials(
                    "SC_API_USERNAME and SC_API_PASSWORD must be set together".to_string(),
                ))
            }
        };

        let instance_id = vars.get("SC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!(
                "{}-{}-{}",
                DEFAULT_INSTANCE_ID_PREFIX, hostname, short_suffix
            )
        });

        Ok(Config {
            bind_address,
            max_streams,
            eviction_policy,
            request_timeout_seconds,
            api_credentials,
            instance_id,
            drain_seconds,
        })
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, String> {
    match vars.get(name) {
        Some(value_str) => value_str.parse().map_err(|e| {
            format!(
                "{} must be a valid non-negative integer, got '{}': {}",
                name, value_str, e
            )
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = HashMap::new();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.max_streams, 4);
        assert_eq!(config.eviction_policy, EvictionPolicy::OldestAdmitted);
        assert_eq!(
            config.request_timeout_seconds,
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        );
        assert!(config.api_credentials.is_none());
        assert_eq!(config.drain_seconds, DEFAULT_DRAIN_SECONDS);
        assert!(config.instance_id.starts_with("sc-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("SC_MAX_STREAMS".to_string(), "16".to_string()),
            (
                "SC_EVICTION_POLICY".to_string(),
                "least-recently-touched".to_string(),
            ),
            ("SC_REQUEST_TIMEOUT_SECONDS".to_string(), "5".to_string()),
            ("SC_API_USERNAME".to_string(), "operator".to_string()),
            ("SC_API_PASSWORD".to_string(), "hunter2".to_string()),
            ("SC_INSTANCE_ID".to_string(), "sc-custom-001".to_string()),
            ("SC_DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.max_streams, 16);
        assert_eq!(config.eviction_policy, EvictionPolicy::LeastRecentlyTouched);
        assert_eq!(config.request_timeout_seconds, 5);
        assert_eq!(config.instance_id, "sc-custom-001");
        assert_eq!(config.drain_seconds, 0);

        let credentials = config.api_credentials.expect("credentials should be set");
        assert_eq!(credentials.username, "operator");
        assert_eq!(credentials.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_max_streams_rejects_zero() {
        let vars = HashMap::from([("SC_MAX_STREAMS".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidMaxStreams(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_max_streams_rejects_non_numeric() {
        let vars = HashMap::from([("SC_MAX_STREAMS".to_string(), "four".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidMaxStreams(msg)) if msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_eviction_policy_rejects_unknown() {
        let vars = HashMap::from([("SC_EVICTION_POLICY".to_string(), "random".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidEvictionPolicy(_))));
    }

    #[test]
    fn test_request_timeout_rejects_zero() {
        let vars = HashMap::from([("SC_REQUEST_TIMEOUT_SECONDS".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidRequestTimeout(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_drain_seconds_rejects_negative() {
        let vars = HashMap::from([("SC_DRAIN_SECONDS".to_string(), "-1".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidDrainPeriod(msg)) if msg.contains("SC_DRAIN_SECONDS"))
        );
    }

    #[test]
    fn test_credentials_require_both_vars() {
        let vars = HashMap::from([("SC_API_USERNAME".to_string(), "operator".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCredentials(msg)) if msg.contains("set together"))
        );
    }

    #[test]
    fn test_credentials_reject_empty_password() {
        let vars = HashMap::from([
            ("SC_API_USERNAME".to_string(), "operator".to_string()),
            ("SC_API_PASSWORD".to_string(), String::new()),
        ]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidCredentials(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let vars = HashMap::from([
            ("SC_API_USERNAME".to_string(), "operator".to_string()),
            ("SC_API_PASSWORD".to_string(), "hunter2".to_string()),
        ]);
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("operator"));
        assert!(!debug_output.contains("hunter2"));
    }
}
