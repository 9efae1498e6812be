//! Traffic Generator - simulated viewers publishing playback events to Kafka
//!
//! Environment variables:
//!   KAFKA_BROKER - broker list (default: kafka:9092)
//!   KAFKA_TOPIC - topic (default: video-stream-logs)
//!   NUM_VIEWERS - concurrent viewers (default: 3)
//!   TRAFFIC_MIN_DELAY_MS / TRAFFIC_MAX_DELAY_MS - pause between events (default: 1000 / 4000)

use dotenv::dotenv;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::env;
use std::time::Duration;
use streamlens::server::shutdown_signal;
use streamlens::traffic::{Viewer, CATALOG};
use tokio_util::sync::CancellationToken;

const RECORD_KEY: &str = "log";

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let broker = env::var("KAFKA_BROKER").unwrap_or_else(|_| "kafka:9092".to_string());
    let topic = env::var("KAFKA_TOPIC").unwrap_or_else(|_| "video-stream-logs".to_string());
    let viewers: usize = env_or("NUM_VIEWERS", 3);
    let min_delay: u64 = env_or("TRAFFIC_MIN_DELAY_MS", 1000);
    let max_delay: u64 = env_or::<u64>("TRAFFIC_MAX_DELAY_MS", 4000).max(min_delay);

    info!("🚀 Traffic Generator");
    info!("   ├─ Kafka: {} / {}", broker, topic);
    info!("   ├─ Viewers: {}", viewers);
    info!("   └─ Delay: {}..{}ms", min_delay, max_delay);

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &broker)
        .set("message.timeout.ms", "5000")
        .create()?;

    let cancel = CancellationToken::new();
    let mut tasks = Vec::with_capacity(viewers);

    for number in 1..=viewers {
        let Some(mut viewer) = Viewer::new(number, CATALOG) else {
            return Err("title catalog is empty".into());
        };
        let producer = producer.clone();
        let topic = topic.clone();
        let cancel = cancel.clone();

        tasks.push(tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            info!("👤 {} started", viewer.user_id());

            loop {
                let event = viewer.next_event(&mut rng);
                match serde_json::to_string(&event) {
                    Ok(payload) => {
                        let record = FutureRecord::to(&topic).key(RECORD_KEY).payload(&payload);
                        match producer.send(record, Duration::from_secs(5)).await {
                            Ok(_) => log::debug!("📤 {}", payload),
                            Err((e, _)) => warn!("⚠️  {} failed to publish: {}", viewer.user_id(), e),
                        }
                    }
                    Err(e) => error!("❌ Failed to encode event: {}", e),
                }

                let delay = Duration::from_millis(rng.gen_range(min_delay..=max_delay));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!("👋 {} stopped", viewer.user_id());
        }));
    }

    shutdown_signal().await;
    cancel.cancel();

    for task in tasks {
        let _ = task.await;
    }

    info!("✅ Traffic generator stopped");
    Ok(())
}
