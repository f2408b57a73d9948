//! `/ws?token=JWT` push bus endpoint (§4.3).
//!
//! Each connection is one actor: a reader task drains subscribe/unsubscribe
//! frames, a writer task owns the socket's sink and drains a mailbox fed by
//! one forwarder per subscribed run, and a 30s heartbeat keeps idle
//! connections honest. No mutex is shared over the socket.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::verify_query_token;
use crate::error::ApiError;
use crate::state::SharedState;
use workflow_engine::push_bus::PushEvent;

const PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
const PONG_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe { run_id: Uuid },
    Unsubscribe { run_id: Uuid },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ServerFrame {
    Event(PushEvent),
    Error { error: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = verify_query_token(&state, &query.token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, auth.tenant_id)))
}

async fn handle_socket(socket: WebSocket, state: SharedState, tenant_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let (mailbox_tx, mut mailbox_rx) = mpsc::channel::<ServerFrame>(64);
    let mut forwarders: HashMap<Uuid, tokio::task::JoinHandle<()>> = HashMap::new();

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            frame = mailbox_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let Ok(json) = serde_json::to_string(&frame) else { continue };
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&text, &state, tenant_id, &mailbox_tx, &mut forwarders).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    for (_, handle) in forwarders.drain() {
        handle.abort();
    }
    let _ = sender.send(Message::Close(None)).await;
}

async fn handle_client_frame(
    text: &str,
    state: &SharedState,
    tenant_id: Uuid,
    mailbox_tx: &mpsc::Sender<ServerFrame>,
    forwarders: &mut HashMap<Uuid, tokio::task::JoinHandle<()>>,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            let _ = mailbox_tx
                .send(ServerFrame::Error {
                    error: format!("malformed frame: {e}"),
                })
                .await;
            return;
        }
    };
    match frame {
        ClientFrame::Subscribe { run_id } => {
            if forwarders.contains_key(&run_id) {
                return;
            }
            let scope = platform_core::tenancy::TenantScope::new(tenant_id);
            if state.engine.observe_run(scope, run_id).await.is_err() {
                let _ = mailbox_tx
                    .send(ServerFrame::Error {
                        error: format!("run {run_id} not found"),
                    })
                    .await;
                return;
            }
            let mut rx = state.push_bus.subscribe(run_id);
            let tx = mailbox_tx.clone();
            let handle = tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            if tx.send(ServerFrame::Event(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
            forwarders.insert(run_id, handle);
        }
        ClientFrame::Unsubscribe { run_id } => {
            if let Some(handle) = forwarders.remove(&run_id) {
                handle.abort();
            }
        }
    }
}
