//! WebSocket transport
//!
//! One socket per viewer. Server→client traffic is JSON text events
//! (`status`, `error`) plus binary frames carrying raw video chunks
//! verbatim. Client→server traffic is JSON text events (`start-stream`,
//! `stop-stream`).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::backend::StartOptions;
use crate::control::StreamStatus;
use crate::error::StreamError;

use super::AppState;

/// Events a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Ask for capture to start (no-op while streaming)
    #[serde(rename = "start-stream")]
    StartStream {
        /// Trade robustness for latency in the selected backend
        #[serde(default, rename = "ultraLowLatency")]
        ultra_low_latency: bool,
    },
    /// Tear down the capture session, leaving viewers connected
    #[serde(rename = "stop-stream")]
    StopStream,
}

/// Events the server sends as JSON text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "status")]
    Status {
        connected: bool,
        streaming: bool,
        clients: usize,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    fn status(status: StreamStatus) -> Self {
        ServerEvent::Status {
            connected: true,
            streaming: status.streaming,
            clients: status.clients,
        }
    }

    fn error(error: &StreamError) -> Self {
        ServerEvent::Error {
            message: error.to_string(),
        }
    }
}

/// Handle a single viewer connection
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = state.allocate_subscriber_id();
    let (mut ws_tx, mut ws_rx) = socket.split();

    tracing::debug!(subscriber = id, "Viewer connected");

    let (mut chunk_rx, start_error) = state.controller.connect(id).await;

    // Current status first, as the original protocol does on connect
    send_event(&mut ws_tx, &ServerEvent::status(state.controller.status().await)).await;
    if let Some(error) = start_error {
        send_event(&mut ws_tx, &ServerEvent::error(&error)).await;
    }

    loop {
        tokio::select! {
            chunk = chunk_rx.recv() => {
                match chunk {
                    Some(chunk) => {
                        if ws_tx.send(Message::Binary(chunk)).await.is_err() {
                            break;
                        }
                    }
                    // Queue dropped by the hub, session is over
                    None => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_event(&state, &mut ws_tx, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.controller.disconnect(id).await;
    tracing::debug!(subscriber = id, "Viewer disconnected");
}

async fn handle_client_event(
    state: &Arc<AppState>,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    text: &str,
) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::StartStream { ultra_low_latency }) => {
            tracing::info!(ultra_low_latency, "Client requested stream start");
            let opts = StartOptions { ultra_low_latency };
            if let Err(error) = state.controller.request_start(opts).await {
                send_event(ws_tx, &ServerEvent::error(&error)).await;
            }
            send_event(ws_tx, &ServerEvent::status(state.controller.status().await)).await;
        }
        Ok(ClientEvent::StopStream) => {
            tracing::info!("Client requested stream stop");
            state.controller.request_stop().await;
            send_event(ws_tx, &ServerEvent::status(state.controller.status().await)).await;
        }
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unrecognized client event");
        }
    }
}

async fn send_event(ws_tx: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }
}
