//! Stream Runtime - ingest, live fan-out, indexing and query API in one process
//!
//! Tasks:
//! - Ingest loop (Kafka → window → observers → Elasticsearch), with the
//!   aggregation tick on the same loop
//! - Live websocket channel (WS_PORT)
//! - Query HTTP API (API_PORT)
//!
//! Usage:
//!   cargo run --release --bin stream_runtime
//!
//! See `RuntimeConfig::from_env` and `PipelineConfig::from_env` for the
//! environment variables.

use dotenv::dotenv;
use log::{error, info};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use streamlens::clock::{Clock, SystemClock};
use streamlens::pipeline::{
    BatchIndexer, Broadcaster, IngestPipeline, PipelineConfig, SlidingWindow,
};
use streamlens::query::QueryService;
use streamlens::server::{serve_api, serve_live, shutdown_signal, LiveState};
use streamlens::store::{ElasticsearchStore, SearchStore};
use streamlens::streamer_core::{KafkaConnector, RuntimeConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Logger first so config fallbacks are visible
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let runtime_config = RuntimeConfig::from_env()?;
    let config = PipelineConfig::from_env();

    info!("🚀 Stream Runtime");
    info!("   ├─ Kafka: {} / {}", runtime_config.kafka_broker, runtime_config.kafka_topic);
    info!("   ├─ Group: {}", runtime_config.consumer_group);
    info!("   ├─ Elasticsearch: {} / {}", config.elasticsearch_host, config.elasticsearch_index);
    info!("   ├─ Window: {}ms, tick {}ms", config.window_duration_ms, config.aggregate_interval_ms);
    info!("   ├─ Batch size: {}", config.batch_size);
    info!("   └─ Ports: ws {} / api {}", config.ws_port, config.api_port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let es = Arc::new(ElasticsearchStore::new(
        &config.elasticsearch_host,
        &config.elasticsearch_index,
    )?);
    let store: Arc<dyn SearchStore> = es.clone();

    let broadcaster = Arc::new(Broadcaster::new(config.observer_buffer));
    let cancel = CancellationToken::new();

    // Query API
    let api_listener = TcpListener::bind(("0.0.0.0", config.api_port)).await?;
    let query_service = QueryService::new(store.clone(), clock.clone());
    let api_cancel = cancel.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = serve_api(api_listener, query_service, api_cancel).await {
            error!("❌ Query API failed: {}", e);
        }
    });

    // Live channel
    let ws_listener = TcpListener::bind(("0.0.0.0", config.ws_port)).await?;
    let live_state = LiveState {
        broadcaster: broadcaster.clone(),
        cancel: cancel.clone(),
    };
    let ws_task = tokio::spawn(async move {
        if let Err(e) = serve_live(ws_listener, live_state).await {
            error!("❌ Live channel failed: {}", e);
        }
    });

    // Ingest loop
    let indexer = BatchIndexer::new(store, config.batch_size, config.flush_failure_policy()?);
    let window = SlidingWindow::new(config.window_duration_ms, clock.clone());
    let mut pipeline = IngestPipeline::new(
        window,
        broadcaster,
        indexer,
        clock,
        runtime_config.commit_policy,
        Duration::from_millis(config.aggregate_interval_ms),
    );
    let reconnect_delay = runtime_config.reconnect_delay;
    let connector = KafkaConnector::new(runtime_config);
    let ingest_cancel = cancel.clone();
    let ingest_task = tokio::spawn(async move {
        // Nothing is indexed before the mapping exists, or the store would
        // infer one that breaks the terms aggregations
        match es.ensure_index_until_ready(reconnect_delay, &ingest_cancel).await {
            Ok(Some(_)) => pipeline.run(&connector, reconnect_delay, ingest_cancel).await,
            Ok(None) => info!("🛑 Shutdown before index was ready"),
            Err(e) => {
                error!("❌ Could not create index '{}': {}", es.index(), e);
                ingest_cancel.cancel();
            }
        }
    });

    info!("✅ All tasks running");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });
    cancel.cancelled().await;

    for (name, task) in [("ingest", ingest_task), ("live", ws_task), ("api", api_task)] {
        if let Err(e) = task.await {
            error!("❌ {} task panicked: {}", name, e);
        }
    }

    info!("✅ Stream runtime stopped");
    Ok(())
}
