// WebSocket Certificate Stream
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::api::{models::ApiError, state::AppState};
use crate::stream::message::Channel;
use crate::stream::registry::Subscription;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Handshake query parameters
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub channel: Option<String>,
}

impl StreamQuery {
    /// Absent or empty selects the default channel
    pub fn channel(&self) -> Result<Channel, ApiError> {
        match self.channel.as_deref() {
            None | Some("") => Ok(Channel::Default),
            Some(name) => Ok(name.parse::<Channel>()?),
        }
    }
}

/// Handle the websocket handshake. The channel is validated before the
/// upgrade, so an invalid selector never registers a subscriber.
pub async fn handle_websocket(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    let channel = query.channel()?;

    let ws = ws.ok_or_else(|| {
        ApiError::UpgradeRequired("connect with a websocket client to receive updates".to_string())
    })?;

    if state.is_shutting_down() {
        return Err(ApiError::ServiceUnavailable("server is shutting down".to_string()));
    }

    let remote = remote_address(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    Ok(ws.on_upgrade(move |socket| websocket_handler(socket, state, remote, channel)))
}

/// Client address, preferring the first X-Forwarded-For hop
fn remote_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .or_else(|| peer.map(|addr| addr.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// WebSocket handler
async fn websocket_handler(socket: WebSocket, state: Arc<AppState>, remote: String, channel: Channel) {
    let Subscription {
        id,
        mut receiver,
        token,
        ..
    } = state.registry.register(remote, channel).await;

    let (mut sender, mut inbound) = socket.split();

    // Drain this subscriber's queue until it is closed or cancelled
    let send_state = state.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    let frame = if send_state.is_shutting_down() {
                        CloseFrame { code: close_code::AWAY, reason: "server shutting down".into() }
                    } else {
                        CloseFrame { code: close_code::POLICY, reason: "subscriber too slow".into() }
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
                frame = receiver.recv() => match frame {
                    Some(frame) => {
                        if sender.send(Message::Text(frame.to_string())).await.is_err() {
                            debug!("Subscriber {} disconnected mid-send", id);
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    // Clients send nothing meaningful; watch for close and errors only
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = inbound.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Subscriber {} sent close", id);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Subscriber {} websocket error: {}", id, e);
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.registry.remove(id).await;
    info!("Subscriber {} disconnected", id);
}
