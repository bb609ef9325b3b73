//! Avatar and server icon updates.
//!
//! Both persist through the Presence Broadcaster, which announces the change
//! to the connected sessions that display it.

use crate::middleware::IdentityContext;
use crate::AppState;
use axum::{extract::Path, http::StatusCode, Extension, Json};
use likoo_realtime::PresenceError;
use likoo_store::ChatStore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct UpdateAvatarRequest {
    pub avatar: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServerIconRequest {
    pub icon_image: String,
}

/// Handler for `PUT /api/users/me/avatar`.
pub async fn update_avatar_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(user)): Extension<IdentityContext>,
    Json(body): Json<UpdateAvatarRequest>,
) -> Result<Json<Value>, StatusCode> {
    let recipients = state
        .gateway
        .presence()
        .change_avatar(&user.id, &body.avatar)
        .await
        .map_err(presence_status)?;

    tracing::info!(user_id = %user.id, recipients, "avatar updated");
    Ok(Json(json!({
        "user_id": user.id,
        "avatar": body.avatar,
    })))
}

/// Handler for `PUT /api/servers/{serverId}/icon`. Owner only.
pub async fn update_server_icon_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(user)): Extension<IdentityContext>,
    Path(server_id): Path<String>,
    Json(body): Json<UpdateServerIconRequest>,
) -> Result<Json<Value>, StatusCode> {
    let server = {
        let state = state.clone();
        let server_id = server_id.clone();
        tokio::task::spawn_blocking(move || state.store.find_server(&server_id))
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .map_err(|e| {
                tracing::error!("failed to load server: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::NOT_FOUND)?
    };

    if server.owner_id != user.id {
        tracing::warn!(
            user_id = %user.id,
            server_id = %server_id,
            "non-owner attempted to change server icon"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    let recipients = state
        .gateway
        .presence()
        .change_server_icon(&server_id, &body.icon_image)
        .await
        .map_err(presence_status)?;

    tracing::info!(server_id = %server_id, recipients, "server icon updated");
    Ok(Json(json!({
        "server_id": server_id,
        "icon_image": body.icon_image,
    })))
}

fn presence_status(err: PresenceError) -> StatusCode {
    match err {
        PresenceError::MissingField(_) | PresenceError::InvalidStatus(_) => {
            StatusCode::BAD_REQUEST
        }
        PresenceError::UnknownUser(_) | PresenceError::UnknownServer(_) => StatusCode::NOT_FOUND,
        PresenceError::Store(e) => {
            tracing::error!("profile update failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        PresenceError::Encode(e) => {
            tracing::error!("failed to encode profile event: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
