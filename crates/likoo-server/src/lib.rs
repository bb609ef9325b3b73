//! Likoo server library logic.

pub mod api_messages;
pub mod api_profile;
pub mod api_ws;
pub mod auth;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use config::Config;
use likoo_db::DbPool;
use likoo_realtime::{Gateway, GatewaySettings};
use likoo_store::SqliteStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Persistence collaborator used by handlers and the real-time core.
    pub store: Arc<SqliteStore>,
    /// Real-time core: sessions, rooms and fanout.
    pub gateway: Arc<Gateway<SqliteStore>>,
    /// HMAC key for connection tokens.
    pub token_key: [u8; 32],
    /// Lifetime of freshly issued tokens.
    pub token_ttl_secs: u64,
    /// Refuse tokenless WebSocket connections.
    pub require_token: bool,
    /// Outbound frames buffered per WebSocket session.
    pub session_buffer: usize,
}

impl AppState {
    pub fn new(pool: DbPool, token_key: [u8; 32], config: &Config) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&store),
            GatewaySettings {
                store_timeout: config.realtime.persist_timeout(),
                offline_on_last_disconnect: config.realtime.offline_on_last_disconnect,
            },
        ));
        Self {
            pool,
            store,
            gateway,
            token_key,
            token_ttl_secs: config.auth.token_ttl_secs,
            require_token: config.auth.require_token,
            session_buffer: config.realtime.session_buffer.max(1),
        }
    }
}

/// Maximum request body size (2 MiB). Avatars and icons arrive as data URLs.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/auth/ws-token", post(api_ws::create_ws_token_handler))
        .route(
            "/api/channels/{channelId}/messages",
            get(api_messages::get_channel_history_handler),
        )
        .route("/api/users/me/avatar", put(api_profile::update_avatar_handler))
        .route(
            "/api/servers/{serverId}/icon",
            put(api_profile::update_server_icon_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
