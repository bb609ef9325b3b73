//! Channel rows.

use crate::{now_timestamp, StoreError};
use likoo_types::ChannelType;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A text or voice channel inside a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub server_id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub description: String,
    pub created_at: String,
}

/// Parameters for creating a channel.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub id: String,
    pub name: String,
    pub server_id: String,
    pub channel_type: ChannelType,
    pub description: String,
}

impl NewChannel {
    /// A text channel with an empty description.
    pub fn text(id: impl Into<String>, name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_id: server_id.into(),
            channel_type: ChannelType::Text,
            description: String::new(),
        }
    }
}

/// Creates a channel.
pub fn create_channel(conn: &Connection, new: &NewChannel) -> Result<Channel, StoreError> {
    let channel = conn.query_row(
        "INSERT INTO channels (id, name, server_id, type, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, name, server_id, type, description, created_at",
        params![
            new.id,
            new.name,
            new.server_id,
            new.channel_type.as_str(),
            new.description,
            now_timestamp(),
        ],
        map_row_to_channel,
    )?;
    Ok(channel)
}

/// Looks up a channel by id.
pub fn find_channel(conn: &Connection, channel_id: &str) -> Result<Option<Channel>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, name, server_id, type, description, created_at
             FROM channels WHERE id = ?1",
            [channel_id],
            map_row_to_channel,
        )
        .optional()?)
}

fn map_row_to_channel(row: &Row) -> rusqlite::Result<Channel> {
    let type_str: String = row.get(3)?;
    let channel_type = ChannelType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown channel type: {type_str}").into(),
        )
    })?;

    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        server_id: row.get(2)?,
        channel_type,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    #[test]
    fn find_channel_returns_created_row() {
        let conn = setup_db();
        let channel = find_channel(&conn, "c1").unwrap().expect("channel exists");
        assert_eq!(channel.name, "general");
        assert_eq!(channel.server_id, "s1");
        assert_eq!(channel.channel_type, ChannelType::Text);
    }

    #[test]
    fn voice_channel_type_is_stored() {
        let conn = setup_db();
        let new = NewChannel {
            channel_type: ChannelType::Voice,
            ..NewChannel::text("v1", "lounge", "s1")
        };
        create_channel(&conn, &new).unwrap();
        let channel = find_channel(&conn, "v1").unwrap().unwrap();
        assert_eq!(channel.channel_type, ChannelType::Voice);

        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["type"], "voice");
    }

    #[test]
    fn channel_requires_existing_server() {
        let conn = setup_db();
        let err = create_channel(&conn, &NewChannel::text("c2", "orphan", "nope"))
            .expect_err("foreign key should reject unknown server");
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn find_missing_channel_is_none() {
        let conn = setup_db();
        assert!(find_channel(&conn, "nope").unwrap().is_none());
    }
}
