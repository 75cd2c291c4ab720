//! Inbound chat stream server.
//!
//! One WebSocket connection is one bidirectional stream: each inbound
//! frame is a JSON [`UserMessage`], each outbound frame a JSON
//! [`BrainResponse`]. Frames on a stream are processed sequentially, so
//! responses leave in arrival order. A bounded semaphore caps the number
//! of concurrently served streams.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::brain::orchestrator::Orchestrator;
use crate::types::{BrainResponse, UserMessage};

/// Shared server state.
pub struct AppState {
    orchestrator: Orchestrator,
    workers: Semaphore,
}

impl AppState {
    /// Create server state with a bounded worker pool.
    pub fn new(orchestrator: Orchestrator, workers: usize) -> Self {
        Self {
            orchestrator,
            workers: Semaphore::new(workers.max(1)),
        }
    }
}

/// Build the service router: `/healthz` and the `/chat` stream.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/chat", get(chat_upgrade))
        .with_state(state)
}

/// Bind and serve until shutdown is signalled.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "chat stream server listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install shutdown handler");
    }
    info!("shutdown signal received, draining");
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "cortex" }))
}

async fn chat_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| chat_stream(socket, state))
}

/// Serve one bidirectional stream.
async fn chat_stream(mut socket: WebSocket, state: Arc<AppState>) {
    // Hold a worker slot for the lifetime of the stream.
    let Ok(_permit) = state.workers.acquire().await else {
        // Semaphore closed means the process is shutting down.
        return;
    };
    debug!("chat stream opened");

    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // Ignore pings/pongs/binary.
            Err(e) => {
                debug!(error = %e, "chat stream read error");
                break;
            }
        };

        let response = match serde_json::from_str::<UserMessage>(&message) {
            Ok(user_message) => state.orchestrator.handle_message(&user_message).await,
            Err(e) => {
                warn!(error = %e, "malformed inbound frame");
                BrainResponse {
                    text: "I could not read that message; please send a UserMessage object."
                        .to_owned(),
                    is_partial: false,
                }
            }
        };

        let payload = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode response");
                continue;
            }
        };

        if socket.send(Message::Text(payload)).await.is_err() {
            // Client went away; the pipeline result is simply dropped.
            break;
        }
    }

    debug!("chat stream closed");
}
