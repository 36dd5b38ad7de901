//! Per-client WebSocket handling and event delivery.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::error::SessionError;
use crate::events::{ClientMessage, EventSink, ServerEvent};

/// Maps session ids to the outbound channel of the owning client. This is
/// the `EventSink` the session core emits through; a missing entry means the
/// client is gone and the event is dropped.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<String, mpsc::UnboundedSender<ServerEvent>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, id: String, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.clients.insert(id, tx);
    }

    fn unregister(&self, id: &str) {
        self.clients.remove(id);
    }
}

impl EventSink for ClientRegistry {
    fn emit(&self, session_id: &str, event: ServerEvent) {
        if let Some(tx) = self.clients.get(session_id) {
            // A closed channel just means the client task is winding down.
            let _ = tx.send(event);
        }
    }
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

/// Drive one client connection: forward its pty events out and dispatch its
/// inbound messages until the socket closes.
async fn handle_client(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(client_id.clone(), tx);
    info!("[ws:{}] client connected", client_id);

    let send_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("[ws:{}] failed to encode event: {}", send_id, e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => dispatch(&state, &client_id, text.as_str()),
            Ok(Message::Close(_)) => {
                debug!("[ws:{}] client closed connection", client_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("[ws:{}] socket error: {}", client_id, e);
                break;
            }
        }
    }

    send_task.abort();
    state.registry.unregister(&client_id);
    state.service.on_disconnect(&client_id);
    info!("[ws:{}] client disconnected", client_id);
}

fn dispatch(state: &AppState, client_id: &str, raw: &str) {
    let msg: ClientMessage = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("[ws:{}] unparseable message: {}", client_id, e);
            return;
        }
    };

    match msg {
        ClientMessage::Container { container } => {
            match state.service.on_connect(client_id, &container) {
                Ok(()) => {}
                Err(SessionError::AlreadyConnected) => {}
                Err(e) => warn!("[ws:{}] connect failed: {}", client_id, e),
            }
        }
        ClientMessage::PtyInput { input } => state.service.on_input(client_id, &input),
        ClientMessage::Resize { rows, cols } => state.service.on_resize(client_id, rows, cols),
    }
}
