use std::env;
use std::time::Duration;

/// When the consumer commits a message's offset relative to its pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Commit after the full per-message pipeline (at-least-once)
    AfterProcessing,
    /// Commit as soon as the message is received (at-most-once)
    BeforeProcessing,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub kafka_broker: String,
    pub kafka_topic: String,
    pub consumer_group: String,
    pub client_id: String,
    /// `earliest` or `latest`
    pub auto_offset_reset: String,
    pub reconnect_delay: Duration,
    pub commit_policy: CommitPolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let kafka_broker = env::var("KAFKA_BROKER").unwrap_or_else(|_| "kafka:9092".to_string());
        if kafka_broker.trim().is_empty() {
            return Err(ConfigError::InvalidValue("KAFKA_BROKER must not be empty".to_string()));
        }

        let kafka_topic =
            env::var("KAFKA_TOPIC").unwrap_or_else(|_| "video-stream-logs".to_string());
        if kafka_topic.trim().is_empty() {
            return Err(ConfigError::InvalidValue("KAFKA_TOPIC must not be empty".to_string()));
        }

        let consumer_group =
            env::var("CONSUMER_GROUP").unwrap_or_else(|_| "log-consumer-group".to_string());

        let client_id = env::var("CLIENT_ID").unwrap_or_else(|_| "log-consumer-client".to_string());

        let auto_offset_reset = env::var("AUTO_OFFSET_RESET")
            .unwrap_or_else(|_| "earliest".to_string())
            .to_lowercase();
        if auto_offset_reset != "earliest" && auto_offset_reset != "latest" {
            return Err(ConfigError::InvalidValue(format!(
                "AUTO_OFFSET_RESET must be 'earliest' or 'latest', got '{}'",
                auto_offset_reset
            )));
        }

        let reconnect_delay_secs = env::var("RECONNECT_DELAY_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(format!("RECONNECT_DELAY_SECS: {}", e)))?;
        if reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_DELAY_SECS must be greater than 0".to_string(),
            ));
        }

        let commit_str = env::var("OFFSET_COMMIT").unwrap_or_else(|_| "after".to_string());
        let commit_policy = match commit_str.to_lowercase().as_str() {
            "after" => CommitPolicy::AfterProcessing,
            "before" => CommitPolicy::BeforeProcessing,
            _ => {
                log::warn!(
                    "Invalid OFFSET_COMMIT '{}', defaulting to after",
                    commit_str
                );
                CommitPolicy::AfterProcessing
            }
        };

        Ok(Self {
            kafka_broker,
            kafka_topic,
            consumer_group,
            client_id,
            auto_offset_reset,
            reconnect_delay: Duration::from_secs(reconnect_delay_secs),
            commit_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "KAFKA_BROKER",
        "KAFKA_TOPIC",
        "RECONNECT_DELAY_SECS",
        "OFFSET_COMMIT",
        "AUTO_OFFSET_RESET",
    ];

    #[test]
    fn test_runtime_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.kafka_broker, "kafka:9092");
        assert_eq!(config.kafka_topic, "video-stream-logs");
        assert_eq!(config.auto_offset_reset, "earliest");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.commit_policy, CommitPolicy::AfterProcessing);

        env::set_var("OFFSET_COMMIT", "before");
        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.commit_policy, CommitPolicy::BeforeProcessing);

        env::set_var("OFFSET_COMMIT", "sometimes");
        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.commit_policy, CommitPolicy::AfterProcessing);

        env::set_var("RECONNECT_DELAY_SECS", "0");
        assert!(matches!(RuntimeConfig::from_env(), Err(ConfigError::InvalidValue(_))));

        env::set_var("RECONNECT_DELAY_SECS", "3");
        env::set_var("AUTO_OFFSET_RESET", "middle");
        assert!(matches!(RuntimeConfig::from_env(), Err(ConfigError::InvalidValue(_))));

        for var in VARS {
            env::remove_var(var);
        }
    }
}
