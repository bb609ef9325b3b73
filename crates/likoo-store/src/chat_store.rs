//! The persistence seam consumed by the real-time core.

use crate::{
    channels, messages, servers, users, Channel, ChannelMessage, DirectMessage, NewDirectMessage,
    NewMessage, Server, StoreError, User,
};
use likoo_db::DbPool;
use likoo_types::UserStatus;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

/// Synchronous persistence operations needed for fanout and presence.
///
/// Implementations may block; async callers run them on the blocking pool.
pub trait ChatStore: Send + Sync + 'static {
    fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    fn find_channel(&self, channel_id: &str) -> Result<Option<Channel>, StoreError>;

    fn find_server(&self, server_id: &str) -> Result<Option<Server>, StoreError>;

    /// Durably inserts a channel message. Only an `Ok` result may be broadcast.
    fn insert_message(&self, message: &NewMessage) -> Result<ChannelMessage, StoreError>;

    /// Durably inserts a direct message. Only an `Ok` result may be broadcast.
    fn insert_direct_message(
        &self,
        message: &NewDirectMessage,
    ) -> Result<DirectMessage, StoreError>;

    /// Returns `false` if the user does not exist.
    fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<bool, StoreError>;

    /// Returns `false` if the user does not exist.
    fn set_user_avatar(&self, user_id: &str, avatar: &str) -> Result<bool, StoreError>;

    /// Servers the user is a member of.
    fn server_ids_for_user(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Returns `false` if the server does not exist.
    fn set_server_icon(&self, server_id: &str, icon_image: &str) -> Result<bool, StoreError>;

    fn list_channel_messages(
        &self,
        channel_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ChannelMessage>, StoreError>;
}

/// [`ChatStore`] backed by the SQLite pool.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

impl ChatStore for SqliteStore {
    fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        users::find_user(&conn, user_id)
    }

    fn find_channel(&self, channel_id: &str) -> Result<Option<Channel>, StoreError> {
        let conn = self.conn()?;
        channels::find_channel(&conn, channel_id)
    }

    fn find_server(&self, server_id: &str) -> Result<Option<Server>, StoreError> {
        let conn = self.conn()?;
        servers::find_server(&conn, server_id)
    }

    fn insert_message(&self, message: &NewMessage) -> Result<ChannelMessage, StoreError> {
        let conn = self.conn()?;
        messages::create_message(&conn, message)
    }

    fn insert_direct_message(
        &self,
        message: &NewDirectMessage,
    ) -> Result<DirectMessage, StoreError> {
        let conn = self.conn()?;
        messages::create_direct_message(&conn, message)
    }

    fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        users::set_user_status(&conn, user_id, status)
    }

    fn set_user_avatar(&self, user_id: &str, avatar: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        users::set_user_avatar(&conn, user_id, avatar)
    }

    fn server_ids_for_user(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        servers::server_ids_for_user(&conn, user_id)
    }

    fn set_server_icon(&self, server_id: &str, icon_image: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        servers::set_server_icon(&conn, server_id, icon_image)
    }

    fn list_channel_messages(
        &self,
        channel_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ChannelMessage>, StoreError> {
        let conn = self.conn()?;
        messages::list_messages(&conn, channel_id, limit)
    }
}
