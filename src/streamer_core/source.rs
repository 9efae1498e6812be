//! Broker source abstraction
//!
//! The ingest loop only sees these traits; the Kafka implementation lives in
//! `kafka_client`, tests plug in scripted sources.

use async_trait::async_trait;

#[derive(Debug)]
pub enum ConsumerError {
    /// Broker unreachable or client could not be created
    Connection(String),
    Subscription(String),
    /// Error surfaced while waiting for the next message
    Fetch(String),
    Commit(String),
}

impl std::fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ConsumerError::Subscription(msg) => write!(f, "Subscription error: {}", msg),
            ConsumerError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            ConsumerError::Commit(msg) => write!(f, "Commit error: {}", msg),
        }
    }
}

impl std::error::Error for ConsumerError {}

/// One message as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// A connected broker client for one topic
#[async_trait]
pub trait MessageSource: Send {
    /// Join the consumer group and subscribe to the topic
    async fn subscribe(&mut self) -> Result<(), ConsumerError>;

    /// Wait for the next message. Must be cancel-safe.
    async fn recv(&mut self) -> Result<RawMessage, ConsumerError>;

    /// Mark `message` as consumed for the group
    async fn commit(&mut self, message: &RawMessage) -> Result<(), ConsumerError>;

    /// Leave the group; the connection is released when the source is dropped
    fn close(&mut self);
}

/// Creates fresh sources for every (re)connect attempt
#[async_trait]
pub trait SourceConnector: Send + Sync {
    type Source: MessageSource;

    async fn connect(&self) -> Result<Self::Source, ConsumerError>;

    /// Human-readable target for logging
    fn describe(&self) -> String;
}
