//! Channel history.

use crate::AppState;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use likoo_store::{ChannelMessage, ChatStore};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Defaults to the store's page size; capped at its maximum.
    pub limit: Option<u32>,
}

/// Handler for `GET /api/channels/{channelId}/messages`.
///
/// Returns persisted messages oldest first, the same order in which they
/// were broadcast.
pub async fn get_channel_history_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChannelMessage>>, StatusCode> {
    let messages = tokio::task::spawn_blocking(move || {
        if state.store.find_channel(&channel_id)?.is_none() {
            return Ok(None);
        }
        state
            .store
            .list_channel_messages(&channel_id, params.limit)
            .map(Some)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|e: likoo_store::StoreError| {
        tracing::error!("failed to load channel history: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(messages))
}
