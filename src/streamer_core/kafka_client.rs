use crate::streamer_core::config::RuntimeConfig;
use crate::streamer_core::source::{ConsumerError, MessageSource, RawMessage, SourceConnector};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds a fresh consumer group member per connect attempt
pub struct KafkaConnector {
    config: RuntimeConfig,
}

impl KafkaConnector {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.kafka_broker)
            .set("group.id", &self.config.consumer_group)
            .set("client.id", &self.config.client_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set("session.timeout.ms", "10000");
        client_config
    }
}

#[async_trait]
impl SourceConnector for KafkaConnector {
    type Source = KafkaSource;

    async fn connect(&self) -> Result<KafkaSource, ConsumerError> {
        let consumer: StreamConsumer = self
            .client_config()
            .create()
            .map_err(|e| ConsumerError::Connection(e.to_string()))?;

        // librdkafka connects lazily; fetch metadata so a dead broker fails here
        let topic = self.config.kafka_topic.clone();
        let consumer = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(&topic), METADATA_TIMEOUT)
                .map(|_| consumer)
        })
        .await
        .map_err(|e| ConsumerError::Connection(format!("metadata fetch aborted: {}", e)))?
        .map_err(|e| ConsumerError::Connection(e.to_string()))?;

        log::info!("✅ Connected to Kafka at {}", self.config.kafka_broker);

        Ok(KafkaSource {
            consumer,
            topic: self.config.kafka_topic.clone(),
        })
    }

    fn describe(&self) -> String {
        format!(
            "{} (topic: {}, group: {})",
            self.config.kafka_broker, self.config.kafka_topic, self.config.consumer_group
        )
    }
}

pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn subscribe(&mut self) -> Result<(), ConsumerError> {
        self.consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| ConsumerError::Subscription(e.to_string()))?;

        log::info!("📡 Subscribed to topic {}", self.topic);
        Ok(())
    }

    async fn recv(&mut self) -> Result<RawMessage, ConsumerError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| ConsumerError::Fetch(e.to_string()))?;

        Ok(RawMessage {
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn commit(&mut self, message: &RawMessage) -> Result<(), ConsumerError> {
        // Kafka commits the offset of the next message to read
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&self.topic, message.partition, Offset::Offset(message.offset + 1))
            .map_err(|e| ConsumerError::Commit(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| ConsumerError::Commit(e.to_string()))
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
        log::info!("🔌 Left consumer group for {}", self.topic);
    }
}
