//! Real-time client connections.
//!
//! Two transports share one registry:
//!
//! - native: plain WebSocket on its own port at `/`
//! - channel: WebSocket at `/socket` on the HTTP port
//!
//! Both carry JSON text frames shaped `{"type": <event>, "data": <payload>}`.
//! The channel is not Engine.IO/Socket.IO framed, so a `socket.io-client`
//! viewer cannot attach; viewers use a plain `WebSocket` and switch on `type`.
//! Channel clients get a `status` frame on connect and may send `ping`,
//! `startRecording` and `stopRecording` besides `step`.

pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{Event, StatusPayload};
use crate::registry::ClientHandle;
use crate::state::AppState;
use crate::types::{ClientInfo, Transport};

/// Upgrade handler for the plain WebSocket listener
pub async fn native_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, Transport::Native, addr, state))
}

/// Upgrade handler for the named-event socket channel
pub async fn channel_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("Socket channel connection request from {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, Transport::Channel, addr, state))
}

/// Drive one connection from registration until it closes or is evicted
async fn handle_socket(
    socket: WebSocket,
    transport: Transport,
    addr: SocketAddr,
    state: Arc<AppState>,
) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut outbound) = mpsc::channel(state.config.client_queue_capacity);
    let info = ClientInfo::new(transport, Some(addr));
    let client_id = info.id.clone();
    state.registry().register(ClientHandle::new(info, tx)).await;

    let count = state.registry().len().await;
    tracing::info!(
        "Client connected: {} ({:?}, id={}), now {} connected",
        addr,
        transport,
        client_id,
        count
    );

    if transport == Transport::Channel {
        let status = Event::Status(StatusPayload {
            connected: true,
            clients: count,
        });
        if let Err(e) = state.relay.send_to(&client_id, &status).await {
            tracing::warn!("Failed to queue connect status: {}", e);
        }
    }

    loop {
        tokio::select! {
            // Queued events for this client; None means the registry dropped us
            queued = outbound.recv() => {
                match queued {
                    Some(json) => {
                        if sender.send(Message::Text(json.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::warn!("Client {} evicted from registry", client_id);
                        break;
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text.as_str());
                        if let Some(reply) =
                            handlers::handle_text(text.as_str(), transport, &client_id, &state.relay).await
                        {
                            if let Err(e) = state.relay.send_to(&client_id, &reply).await {
                                tracing::warn!("Failed to queue reply: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.registry().unregister(&client_id).await;
    tracing::info!(
        "Client disconnected: {} (id={}), now {} connected",
        addr,
        client_id,
        state.registry().len().await
    );
}
