//! WebSocket support for real-time run updates.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use personaforge_core::{
    model::{ItemStatus, RunId},
    GenerationPipeline, GenerationResults, RunStatus,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Interval between heartbeats sent to connected clients.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Phase, progress, busy flag or log trail changed.
    Status { status: RunStatus },
    /// The result snapshot changed. Clients fetch `GET /run` for the assets.
    ResultsUpdated {
        run_id: Option<RunId>,
        looks: usize,
        items: usize,
        ready: usize,
        failed: usize,
        narration: bool,
    },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::Status { .. } => "status",
            WsMessage::ResultsUpdated { .. } => "results_updated",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Summary of a result snapshot, without asset bytes.
    pub fn results_updated(results: &GenerationResults) -> Self {
        let (items, ready, failed) = match results.plan() {
            Ok(plan) => plan.items().fold((0, 0, 0), |(n, r, f), item| {
                (
                    n + 1,
                    r + usize::from(item.status == ItemStatus::Ready),
                    f + usize::from(item.status == ItemStatus::Failed),
                )
            }),
            Err(_) => (0, 0, 0),
        };
        WsMessage::ResultsUpdated {
            run_id: results.run_id,
            looks: results.wardrobe.len(),
            items,
            ready,
            failed,
            narration: results.narration.is_some(),
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn status_changed(&self, status: RunStatus) {
        self.broadcast(WsMessage::Status { status });
    }

    pub fn results_changed(&self, results: &GenerationResults) {
        self.broadcast(WsMessage::results_updated(results));
    }

    pub fn heartbeat(&self) {
        self.broadcast(WsMessage::Heartbeat {
            timestamp: chrono::Utc::now().timestamp(),
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Forward pipeline status and result changes to the broadcaster.
///
/// Watch channels only keep the latest value, so a burst of progress
/// updates collapses into one message per wakeup.
pub fn spawn_forwarder(pipeline: GenerationPipeline, broadcaster: WsBroadcaster) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut status_rx = pipeline.subscribe_status();
        let mut results_rx = pipeline.subscribe_results();
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        debug!("Status channel closed, stopping forwarder");
                        break;
                    }
                    let status = status_rx.borrow_and_update().clone();
                    broadcaster.status_changed(status);
                }
                changed = results_rx.changed() => {
                    if changed.is_err() {
                        debug!("Results channel closed, stopping forwarder");
                        break;
                    }
                    let results = results_rx.borrow_and_update().clone();
                    broadcaster.results_changed(&results);
                }
                _ = heartbeat.tick() => {
                    broadcaster.heartbeat();
                }
            }
        }
    })
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> bool {
    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            true
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so no change falls in between
    let mut rx = state.ws_broadcaster().subscribe();
    let initial = WsMessage::Status {
        status: state.pipeline().status(),
    };

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        if !send_json(&mut sender, &initial).await {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !send_json(&mut sender, &msg).await {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
