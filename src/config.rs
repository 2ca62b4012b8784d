//! Process-wide coordinator configuration.
//!
//! Loaded from `DAGFLOW_*` environment variables (with `.env` support via
//! dotenvy), every option has a default and the loaded set is validated
//! fail-fast before the coordinator starts.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

const DEFAULT_GRAPH_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_NODE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STATE_TTL_SECS: u64 = 24 * 60 * 60;

/// Configuration loading/validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    #[diagnostic(
        code(dagflow::config::invalid_value),
        help("durations are whole numbers of seconds")
    )]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    #[diagnostic(code(dagflow::config::zero_duration))]
    ZeroDuration { key: &'static str },

    #[error("{key} must not be empty")]
    #[diagnostic(code(dagflow::config::empty_value))]
    EmptyValue { key: &'static str },
}

/// Options consumed by the execution coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Deadline for a whole execution; the deadline supervisor reaps
    /// executions still non-terminal when it elapses.
    pub graph_execution_timeout: Duration,
    /// Advisory per-node timeout, forwarded in work envelopes and enforced
    /// by the worker tier, not the coordinator.
    pub node_execution_timeout: Duration,
    /// Maximum drain time for `shutdown`.
    pub shutdown_timeout: Duration,
    /// TTL applied to every persisted record.
    pub state_ttl: Duration,
    /// Consumer-group identity used on subscriptions.
    pub consumer_group: String,
    /// Consumer name within the group.
    pub consumer_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            graph_execution_timeout: Duration::from_secs(DEFAULT_GRAPH_TIMEOUT_SECS),
            node_execution_timeout: Duration::from_secs(DEFAULT_NODE_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            state_ttl: Duration::from_secs(DEFAULT_STATE_TTL_SECS),
            consumer_group: "dagflow-coordinator".to_string(),
            consumer_name: "coordinator-1".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for unset variables, then validates the result.
    ///
    /// Recognized variables: `DAGFLOW_GRAPH_TIMEOUT_SECS`,
    /// `DAGFLOW_NODE_TIMEOUT_SECS`, `DAGFLOW_SHUTDOWN_TIMEOUT_SECS`,
    /// `DAGFLOW_STATE_TTL_SECS`, `DAGFLOW_CONSUMER_GROUP`,
    /// `DAGFLOW_CONSUMER_NAME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        let config = Self {
            graph_execution_timeout: env_duration(
                "DAGFLOW_GRAPH_TIMEOUT_SECS",
                defaults.graph_execution_timeout,
            )?,
            node_execution_timeout: env_duration(
                "DAGFLOW_NODE_TIMEOUT_SECS",
                defaults.node_execution_timeout,
            )?,
            shutdown_timeout: env_duration(
                "DAGFLOW_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout,
            )?,
            state_ttl: env_duration("DAGFLOW_STATE_TTL_SECS", defaults.state_ttl)?,
            consumer_group: env_string("DAGFLOW_CONSUMER_GROUP", defaults.consumer_group),
            consumer_name: env_string("DAGFLOW_CONSUMER_NAME", defaults.consumer_name),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, duration) in [
            ("graph_execution_timeout", self.graph_execution_timeout),
            ("node_execution_timeout", self.node_execution_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
            ("state_ttl", self.state_ttl),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::ZeroDuration { key });
            }
        }
        if self.consumer_group.is_empty() {
            return Err(ConfigError::EmptyValue {
                key: "consumer_group",
            });
        }
        if self.consumer_name.is_empty() {
            return Err(ConfigError::EmptyValue {
                key: "consumer_name",
            });
        }
        Ok(())
    }
}

fn env_duration(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.graph_execution_timeout, Duration::from_secs(3600));
        assert_eq!(config.state_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = CoordinatorConfig {
            graph_execution_timeout: Duration::ZERO,
            ..CoordinatorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration {
                key: "graph_execution_timeout"
            })
        );
    }

    #[test]
    fn empty_consumer_identity_is_rejected() {
        let config = CoordinatorConfig {
            consumer_group: String::new(),
            ..CoordinatorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyValue {
                key: "consumer_group"
            })
        );
    }

    #[test]
    fn env_overrides_apply() {
        // Single test mutating the environment so parallel tests don't race.
        std::env::set_var("DAGFLOW_GRAPH_TIMEOUT_SECS", "120");
        std::env::set_var("DAGFLOW_CONSUMER_NAME", "coordinator-7");
        let config = CoordinatorConfig::from_env().unwrap();
        assert_eq!(config.graph_execution_timeout, Duration::from_secs(120));
        assert_eq!(config.consumer_name, "coordinator-7");
        std::env::remove_var("DAGFLOW_GRAPH_TIMEOUT_SECS");
        std::env::remove_var("DAGFLOW_CONSUMER_NAME");
    }
}
