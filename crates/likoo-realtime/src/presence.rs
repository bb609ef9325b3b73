//! Status, avatar and server icon broadcasts.

use crate::connections::ConnectionManager;
use crate::error::PresenceError;
use crate::event::OutgoingEvent;
use crate::store_call;
use likoo_store::ChatStore;
use likoo_types::{Room, UserStatus};
use std::sync::Arc;
use std::time::Duration;

/// Pushes presence and profile changes to the sessions that display them.
pub struct PresenceBroadcaster<S> {
    store: Arc<S>,
    connections: ConnectionManager,
    store_timeout: Duration,
}

impl<S: ChatStore> PresenceBroadcaster<S> {
    pub fn new(store: Arc<S>, connections: ConnectionManager, store_timeout: Duration) -> Self {
        Self {
            store,
            connections,
            store_timeout,
        }
    }

    /// Records the user's status and announces it to every live session.
    ///
    /// Nothing is broadcast for an unknown user.
    pub async fn set_status(&self, user_id: &str, status: UserStatus) -> Result<usize, PresenceError> {
        if user_id.is_empty() {
            return Err(PresenceError::MissingField("user_id"));
        }

        let updated = {
            let user_id = user_id.to_string();
            store_call::run(&self.store, self.store_timeout, move |store| {
                store.set_user_status(&user_id, status)
            })
            .await?
        };
        if !updated {
            return Err(PresenceError::UnknownUser(user_id.to_string()));
        }

        let frame = OutgoingEvent::UserStatusChanged {
            user_id: user_id.to_string(),
            status,
        }
        .to_frame()?;
        let recipients = self.connections.broadcast_all(&frame).await;
        tracing::debug!(user_id = %user_id, status = %status, recipients, "status broadcast");
        Ok(recipients)
    }

    /// Stores a new avatar, then announces it.
    pub async fn change_avatar(&self, user_id: &str, avatar: &str) -> Result<usize, PresenceError> {
        if user_id.is_empty() {
            return Err(PresenceError::MissingField("user_id"));
        }
        if avatar.is_empty() {
            return Err(PresenceError::MissingField("avatar"));
        }

        let updated = {
            let user_id = user_id.to_string();
            let avatar = avatar.to_string();
            store_call::run(&self.store, self.store_timeout, move |store| {
                store.set_user_avatar(&user_id, &avatar)
            })
            .await?
        };
        if !updated {
            return Err(PresenceError::UnknownUser(user_id.to_string()));
        }
        self.broadcast_avatar_change(user_id, avatar).await
    }

    /// Announces an avatar change to every server the user belongs to and to
    /// the user's own room. Each session receives it at most once.
    pub async fn broadcast_avatar_change(
        &self,
        user_id: &str,
        avatar: &str,
    ) -> Result<usize, PresenceError> {
        let server_ids = {
            let user_id = user_id.to_string();
            store_call::run(&self.store, self.store_timeout, move |store| {
                store.server_ids_for_user(&user_id)
            })
            .await?
        };

        let mut rooms: Vec<Room> = server_ids.into_iter().map(Room::Server).collect();
        rooms.push(Room::User(user_id.to_string()));

        let frame = OutgoingEvent::UserAvatarChanged {
            user_id: user_id.to_string(),
            avatar: avatar.to_string(),
        }
        .to_frame()?;
        let recipients = self.connections.broadcast_rooms(&rooms, &frame).await;
        tracing::debug!(user_id = %user_id, rooms = rooms.len(), recipients, "avatar broadcast");
        Ok(recipients)
    }

    /// Stores a new server icon, then announces it.
    pub async fn change_server_icon(
        &self,
        server_id: &str,
        icon_image: &str,
    ) -> Result<usize, PresenceError> {
        if server_id.is_empty() {
            return Err(PresenceError::MissingField("server_id"));
        }
        if icon_image.is_empty() {
            return Err(PresenceError::MissingField("icon_image"));
        }

        let updated = {
            let server_id = server_id.to_string();
            let icon_image = icon_image.to_string();
            store_call::run(&self.store, self.store_timeout, move |store| {
                store.set_server_icon(&server_id, &icon_image)
            })
            .await?
        };
        if !updated {
            return Err(PresenceError::UnknownServer(server_id.to_string()));
        }
        self.broadcast_server_icon_change(server_id, icon_image).await
    }

    /// Announces a server icon change to `server:<server_id>`.
    pub async fn broadcast_server_icon_change(
        &self,
        server_id: &str,
        icon_image: &str,
    ) -> Result<usize, PresenceError> {
        let room = Room::Server(server_id.to_string());
        let frame = OutgoingEvent::ServerIconChanged {
            server_id: server_id.to_string(),
            icon_image: icon_image.to_string(),
        }
        .to_frame()?;
        let recipients = self.connections.broadcast(&room, &frame).await;
        tracing::debug!(room = %room, recipients, "server icon broadcast");
        Ok(recipients)
    }
}
