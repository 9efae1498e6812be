//! Live update channel: one websocket per observer, fed by the broadcaster

use crate::pipeline::broadcast::Broadcaster;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct LiveState {
    pub broadcaster: Arc<Broadcaster>,
    pub cancel: CancellationToken,
}

pub fn live_router(state: LiveState) -> Router {
    Router::new().route("/", get(live_websocket)).with_state(state)
}

pub async fn serve_live(listener: TcpListener, state: LiveState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("📺 Live channel listening on ws://{}", addr);
    }

    let cancel = state.cancel.clone();
    axum::serve(listener, live_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    log::info!("✅ Live channel stopped");
    Ok(())
}

async fn live_websocket(ws: WebSocketUpgrade, State(state): State<LiveState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_observer(socket, state))
}

async fn handle_observer(socket: WebSocket, state: LiveState) {
    let (id, mut frames) = state.broadcaster.connect();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if sender.send(Message::Text(frame.to_string())).await.is_err() {
                            break;
                        }
                    }
                    // dropped by the broadcaster after its queue closed
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    state.broadcaster.disconnect(id);
}
