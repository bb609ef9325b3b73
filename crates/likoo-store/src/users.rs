//! User rows.

use crate::{now_timestamp, parse_column, StoreError};
use likoo_types::UserStatus;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A user account, in the external projection sent to clients.
///
/// The password hash never leaves the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Emoji or URL/relative path of an uploaded image.
    pub avatar: String,
    pub color: String,
    pub status: UserStatus,
    pub tag: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Parameters for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub tag: Option<String>,
}

impl NewUser {
    pub fn new(id: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
            avatar: None,
            color: None,
            tag: None,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, avatar, color, status, tag, created_at";

/// Creates a user with column defaults for any omitted field.
pub fn create_user(conn: &Connection, new: &NewUser) -> Result<User, StoreError> {
    let sql = format!(
        "INSERT INTO users (id, username, email, avatar, color, tag, created_at)
         VALUES (?1, ?2, ?3, COALESCE(?4, '👤'), COALESCE(?5, '#94a3b8'), ?6, ?7)
         RETURNING {USER_COLUMNS}"
    );
    let user = conn.query_row(
        &sql,
        params![
            new.id,
            new.username,
            new.email,
            new.avatar,
            new.color,
            new.tag,
            now_timestamp(),
        ],
        map_row_to_user,
    )?;
    Ok(user)
}

/// Looks up a user by id.
pub fn find_user(conn: &Connection, user_id: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, [user_id], map_row_to_user).optional()?)
}

/// Updates the stored presence status. Returns `false` if the user does not exist.
pub fn set_user_status(
    conn: &Connection,
    user_id: &str,
    status: UserStatus,
) -> Result<bool, StoreError> {
    let count = conn.execute(
        "UPDATE users SET status = ?1 WHERE id = ?2",
        params![status.as_str(), user_id],
    )?;
    Ok(count > 0)
}

/// Updates the avatar. Returns `false` if the user does not exist.
pub fn set_user_avatar(conn: &Connection, user_id: &str, avatar: &str) -> Result<bool, StoreError> {
    let count = conn.execute(
        "UPDATE users SET avatar = ?1 WHERE id = ?2",
        params![avatar, user_id],
    )?;
    Ok(count > 0)
}

/// Maps a row selected with the user column list starting at `offset`.
pub(crate) fn map_user_at(row: &Row, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        email: row.get(offset + 2)?,
        avatar: row.get(offset + 3)?,
        color: row.get(offset + 4)?,
        status: parse_column(offset + 5, row.get(offset + 5)?, UserStatus::from_str)?,
        tag: row.get(offset + 6)?,
        created_at: row.get(offset + 7)?,
    })
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    map_user_at(row, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    #[test]
    fn create_user_applies_defaults() {
        let conn = setup_db();
        let user = find_user(&conn, "u1").unwrap().expect("user should exist");
        assert_eq!(user.username, "ana");
        assert_eq!(user.avatar, "👤");
        assert_eq!(user.color, "#94a3b8");
        assert_eq!(user.status, UserStatus::Offline);
        assert!(user.tag.is_none());
    }

    #[test]
    fn find_missing_user_is_none() {
        let conn = setup_db();
        assert!(find_user(&conn, "ghost").unwrap().is_none());
    }

    #[test]
    fn status_update_round_trips() {
        let conn = setup_db();
        assert!(set_user_status(&conn, "u1", UserStatus::Dnd).unwrap());
        let user = find_user(&conn, "u1").unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Dnd);

        assert!(!set_user_status(&conn, "ghost", UserStatus::Away).unwrap());
    }

    #[test]
    fn avatar_update_reports_missing_user() {
        let conn = setup_db();
        assert!(set_user_avatar(&conn, "u1", "/uploads/avatars/u1.png").unwrap());
        assert_eq!(
            find_user(&conn, "u1").unwrap().unwrap().avatar,
            "/uploads/avatars/u1.png"
        );
        assert!(!set_user_avatar(&conn, "ghost", "🦊").unwrap());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let conn = setup_db();
        let err = create_user(&conn, &NewUser::new("u2", "ana", "other@likoo.test"))
            .expect_err("username is unique");
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn user_serializes_external_projection() {
        let conn = setup_db();
        let user = find_user(&conn, "u1").unwrap().unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["status"], "offline");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("created_at").is_some());
    }
}
