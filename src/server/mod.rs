pub mod error;
pub mod http;
pub mod ws;

pub use error::ApiError;
pub use http::{api_router, serve_api};
pub use ws::{live_router, serve_live, LiveState};

use tokio::signal;

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("🛑 Received SIGINT, starting graceful shutdown"),
        _ = terminate => log::info!("🛑 Received SIGTERM, starting graceful shutdown"),
    }
}
