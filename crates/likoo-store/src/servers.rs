//! Server (guild) rows and memberships.

use crate::{now_timestamp, StoreError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A server (guild).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub icon: String,
    /// Uploaded icon image path, if any.
    pub icon_image: Option<String>,
    pub owner_id: String,
    pub description: String,
    pub created_at: String,
}

/// Parameters for creating a server.
#[derive(Debug, Clone)]
pub struct NewServer {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// Creates a server and records its owner as the first member.
pub fn create_server(conn: &Connection, new: &NewServer) -> Result<Server, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let server = tx.query_row(
        "INSERT INTO servers (id, name, owner_id, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, name, icon, icon_image, owner_id, description, created_at",
        params![new.id, new.name, new.owner_id, now_timestamp()],
        map_row_to_server,
    )?;
    tx.execute(
        "INSERT INTO server_members (user_id, server_id) VALUES (?1, ?2)",
        params![new.owner_id, new.id],
    )?;
    tx.commit()?;
    Ok(server)
}

/// Adds a user to a server. Adding an existing member is a no-op.
pub fn add_server_member(conn: &Connection, server_id: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO server_members (user_id, server_id) VALUES (?1, ?2)",
        params![user_id, server_id],
    )?;
    Ok(())
}

/// Looks up a server by id.
pub fn find_server(conn: &Connection, server_id: &str) -> Result<Option<Server>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, name, icon, icon_image, owner_id, description, created_at
             FROM servers WHERE id = ?1",
            [server_id],
            map_row_to_server,
        )
        .optional()?)
}

/// Returns the ids of every server the user belongs to, ordered by join time.
pub fn server_ids_for_user(conn: &Connection, user_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT server_id FROM server_members WHERE user_id = ?1 ORDER BY joined_at ASC, server_id ASC",
    )?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Sets the uploaded icon image. Returns `false` if the server does not exist.
pub fn set_server_icon(conn: &Connection, server_id: &str, icon_image: &str) -> Result<bool, StoreError> {
    let count = conn.execute(
        "UPDATE servers SET icon_image = ?1 WHERE id = ?2",
        params![icon_image, server_id],
    )?;
    Ok(count > 0)
}

fn map_row_to_server(row: &Row) -> rusqlite::Result<Server> {
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        icon_image: row.get(3)?,
        owner_id: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}
