//! WebSocket transport for the real-time core.
//!
//! Each socket is registered with the [`Gateway`](likoo_realtime::Gateway)
//! as one session. Inbound text frames are handed to the gateway in arrival
//! order; outbound frames flow through a bounded per-session queue drained by
//! a writer task.

use crate::auth::{issue_token, verify_token};
use crate::middleware::IdentityContext;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use futures_util::{SinkExt, StreamExt};
use likoo_realtime::{EventError, SessionId};
use likoo_store::ChatStore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Query parameters for WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    /// Signed token issued by the auth service or `/api/auth/ws-token`.
    pub token: Option<String>,
}

/// Handler for `POST /api/auth/ws-token`.
///
/// Exchanges a valid bearer token for a fresh one carrying the configured
/// lifetime.
pub async fn create_ws_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(user)): Extension<IdentityContext>,
) -> Json<Value> {
    let token = issue_token(&user.id, &state.token_key, state.token_ttl_secs);
    Json(json!({
        "token": token,
        "expires_in_secs": state.token_ttl_secs,
    }))
}

/// WebSocket handler: `GET /ws?token=...`.
///
/// A valid token yields a session bound to its user for its whole lifetime.
/// Without a token the connection is refused unless `auth.require_token` is
/// off, in which case the session starts unverified and trusts the user ids
/// carried by its events.
///
/// All auth failures are logged with the remote address.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectParams>,
) -> impl IntoResponse {
    let Some(token) = params.token else {
        if state.require_token {
            tracing::warn!(remote_addr = %addr, "websocket connect missing token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        tracing::debug!(remote_addr = %addr, "accepting unverified websocket session");
        return ws
            .on_upgrade(move |socket| handle_socket(socket, state, None))
            .into_response();
    };

    let user_id = match verify_token(&token, &state.token_key) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!(remote_addr = %addr, "websocket token verification failed: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let lookup = {
        let state = state.clone();
        let user_id = user_id.clone();
        tokio::task::spawn_blocking(move || state.store.find_user(&user_id)).await
    };

    match lookup {
        Ok(Ok(Some(user))) => {
            tracing::info!(user_id = %user.id, remote_addr = %addr, "websocket auth success");
            ws.on_upgrade(move |socket| handle_socket(socket, state, Some(user.id)))
                .into_response()
        }
        Ok(Ok(None)) => {
            tracing::warn!(
                user_id = %user_id,
                remote_addr = %addr,
                "websocket token names an unknown user"
            );
            StatusCode::UNAUTHORIZED.into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(remote_addr = %addr, "websocket auth lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(_) => {
            tracing::error!(remote_addr = %addr, "websocket auth task panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, verified_user: Option<String>) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded so a slow consumer loses frames instead of growing memory.
    let (tx, mut rx) = mpsc::channel::<String>(state.session_buffer);
    let session_id = state.gateway.connect(tx, verified_user).await;

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(AxumMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => {
                if let Err(e) = state.gateway.handle_frame(session_id, text.as_str()).await {
                    log_dropped_event(session_id, &e);
                }
            }
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    state.gateway.disconnect(session_id).await;
    send_task.abort();
}

/// Dropped events are never reported to the client.
fn log_dropped_event(session_id: SessionId, error: &EventError) {
    match error {
        EventError::Bind(e) => {
            tracing::warn!(session_id = %session_id, "event rejected: {}", e);
        }
        EventError::Signal(likoo_realtime::SignalError::Bind(e)) => {
            tracing::warn!(session_id = %session_id, "signal rejected: {}", e);
        }
        _ => {
            tracing::debug!(session_id = %session_id, "event dropped: {}", error);
        }
    }
}
