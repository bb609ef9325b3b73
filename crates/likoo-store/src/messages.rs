//! Channel messages and direct messages.
//!
//! Each insert loads the author projection and writes the row in one
//! transaction, so a returned error always means nothing was committed.

use crate::users::{find_user, map_user_at, User};
use crate::{now_timestamp, StoreError};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// Number of history messages returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
/// Upper bound on a single history page.
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// A persisted channel message with its author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelMessage {
    pub id: String,
    pub content: String,
    pub author: User,
    pub channel_id: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    pub edited_at: Option<String>,
}

/// A persisted direct message with its sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectMessage {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Projection of the sender.
    pub author: User,
    pub created_at: String,
}

/// Parameters for creating a channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
}

/// Parameters for creating a direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDirectMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

/// Inserts a channel message stamped with the current server time.
///
/// Unknown author or channel ids are rejected by foreign keys.
pub fn create_message(conn: &Connection, new: &NewMessage) -> Result<ChannelMessage, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = now_timestamp();

    let tx = conn.unchecked_transaction()?;
    let author = find_user(&tx, &new.author_id)?
        .ok_or_else(|| StoreError::NotFound(new.author_id.clone()))?;
    tx.execute(
        "INSERT INTO messages (id, content, author_id, channel_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, new.content, new.author_id, new.channel_id, created_at],
    )?;
    tx.commit()?;

    Ok(ChannelMessage {
        id,
        content: new.content.clone(),
        author,
        channel_id: new.channel_id.clone(),
        created_at,
        edited_at: None,
    })
}

/// Inserts a direct message stamped with the current server time.
pub fn create_direct_message(
    conn: &Connection,
    new: &NewDirectMessage,
) -> Result<DirectMessage, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = now_timestamp();

    let tx = conn.unchecked_transaction()?;
    let author = find_user(&tx, &new.sender_id)?
        .ok_or_else(|| StoreError::NotFound(new.sender_id.clone()))?;
    tx.execute(
        "INSERT INTO direct_messages (id, sender_id, receiver_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, new.sender_id, new.receiver_id, new.content, created_at],
    )?;
    tx.commit()?;

    Ok(DirectMessage {
        id,
        content: new.content.clone(),
        sender_id: new.sender_id.clone(),
        receiver_id: new.receiver_id.clone(),
        author,
        created_at,
    })
}

/// Returns the most recent messages of a channel in persistence order.
///
/// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and is capped at
/// [`MAX_HISTORY_LIMIT`].
pub fn list_messages(
    conn: &Connection,
    channel_id: &str,
    limit: Option<u32>,
) -> Result<Vec<ChannelMessage>, StoreError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);

    let mut stmt = conn.prepare(
        "SELECT * FROM (
            SELECT m.seq, m.id, m.content, m.channel_id, m.created_at, m.edited_at,
                   u.id, u.username, u.email, u.avatar, u.color, u.status, u.tag, u.created_at
            FROM messages m JOIN users u ON u.id = m.author_id
            WHERE m.channel_id = ?1
            ORDER BY m.seq DESC
            LIMIT ?2
        ) ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![channel_id, limit], map_row_to_message)?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

fn map_row_to_message(row: &Row) -> rusqlite::Result<ChannelMessage> {
    Ok(ChannelMessage {
        id: row.get(1)?,
        content: row.get(2)?,
        channel_id: row.get(3)?,
        created_at: row.get(4)?,
        edited_at: row.get(5)?,
        author: map_user_at(row, 6)?,
    })
}
