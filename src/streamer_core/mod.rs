pub mod codec;
pub mod config;
pub mod error_handler;
pub mod kafka_client;
pub mod source;

pub use codec::{decode, DecodeError};
pub use config::{CommitPolicy, ConfigError, RuntimeConfig};
pub use error_handler::FixedDelay;
pub use kafka_client::{KafkaConnector, KafkaSource};
pub use source::{ConsumerError, MessageSource, RawMessage, SourceConnector};
