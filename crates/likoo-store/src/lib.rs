//! Persistence for the Likoo chat platform.
//!
//! Owns durable storage of users, servers, channels, channel messages and
//! direct messages on top of the `likoo-db` SQLite pool. Query helpers are
//! plain functions over a `rusqlite::Connection`; the [`ChatStore`] trait
//! bundles the subset the real-time core needs so that it can be backed by
//! [`SqliteStore`] in production and by stubs in tests.

mod channels;
mod chat_store;
mod messages;
mod servers;
mod users;

pub use channels::{create_channel, find_channel, Channel, NewChannel};
pub use chat_store::{ChatStore, SqliteStore};
pub use messages::{
    create_direct_message, create_message, list_messages, ChannelMessage, DirectMessage,
    NewDirectMessage, NewMessage, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT,
};
pub use servers::{
    add_server_member, create_server, find_server, server_ids_for_user, set_server_icon,
    NewServer, Server,
};
pub use users::{create_user, find_user, set_user_avatar, set_user_status, NewUser, User};

use thiserror::Error;

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Current server time in the format used by every timestamp column.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Maps a stored enum string through `parse`, reporting failures as a
/// conversion error on column `idx`.
pub(crate) fn parse_column<T, E>(
    idx: usize,
    raw: String,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
