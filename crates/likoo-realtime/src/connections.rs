//! Live connection state and delivery primitives.

use crate::directory::SessionDirectory;
use crate::error::BindError;
use crate::registry::RoomRegistry;
use likoo_types::{Room, SessionId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Room registry and session directory, always mutated together.
#[derive(Debug, Default)]
struct Hub {
    rooms: RoomRegistry,
    sessions: SessionDirectory,
}

impl Hub {
    fn deliver(&self, session_id: SessionId, frame: &str, context: &str) -> bool {
        let Some(entry) = self.sessions.get(session_id) else {
            return false;
        };
        match entry.outbox.try_send(frame.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    session_id = %session_id,
                    target = %context,
                    "dropping frame for slow consumer"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    session_id = %session_id,
                    target = %context,
                    "dropping frame for closed session"
                );
                false
            }
        }
    }
}

/// What remained of a session when it disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub session_id: SessionId,
    pub user_id: Option<String>,
    /// Rooms the session was removed from.
    pub rooms: Vec<Room>,
    /// Other sessions still bound to the same user.
    pub remaining_user_sessions: usize,
}

/// Manages live sessions, room membership and frame delivery.
///
/// Every delivery method returns how many sessions accepted the frame.
/// Frames go through each session's bounded outbox with `try_send`, so a
/// slow consumer loses frames instead of stalling the sender.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    hub: Arc<RwLock<Hub>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session and returns its id.
    ///
    /// `verified_user` is the identity proven by the transport, if any; the
    /// session is bound to it and joins its personal room right away.
    pub async fn add_session(
        &self,
        outbox: mpsc::Sender<String>,
        verified_user: Option<String>,
    ) -> SessionId {
        let session_id = Uuid::new_v4();
        let mut hub = self.hub.write().await;
        if let Some(user_id) = &verified_user {
            hub.rooms.join(Room::User(user_id.clone()), session_id);
        }
        hub.sessions.register(session_id, outbox, verified_user);
        session_id
    }

    /// Removes the session from every room and from the directory.
    ///
    /// Returns `None` if the session was already gone.
    pub async fn remove_session(&self, session_id: SessionId) -> Option<Departure> {
        let mut hub = self.hub.write().await;
        let rooms = hub.rooms.leave_all(session_id);
        let entry = hub.sessions.unregister(session_id)?;
        let remaining_user_sessions = entry
            .user_id
            .as_deref()
            .map(|user_id| hub.sessions.sessions_of_user(user_id).len())
            .unwrap_or(0);

        Some(Departure {
            session_id,
            user_id: entry.user_id,
            rooms,
            remaining_user_sessions,
        })
    }

    /// Adds a registered session to a room. Idempotent.
    pub async fn join(&self, room: Room, session_id: SessionId) -> Result<bool, BindError> {
        let mut hub = self.hub.write().await;
        if !hub.sessions.contains(session_id) {
            return Err(BindError::UnknownSession(session_id));
        }
        Ok(hub.rooms.join(room, session_id))
    }

    /// Removes a session from a room. Leaving a room never joined is a no-op.
    pub async fn leave(&self, room: &Room, session_id: SessionId) -> bool {
        self.hub.write().await.rooms.leave(room, session_id)
    }

    /// Binds the session to a user and joins the user's personal room.
    ///
    /// Rebinding an unverified session moves it out of the previous user's room.
    pub async fn bind_user(&self, session_id: SessionId, user_id: &str) -> Result<bool, BindError> {
        let mut hub = self.hub.write().await;
        let previous = hub.sessions.user_of(session_id).map(str::to_string);
        hub.sessions.bind_user(session_id, user_id)?;
        if let Some(previous) = previous.filter(|previous| previous != user_id) {
            hub.rooms.leave(&Room::User(previous), session_id);
        }
        Ok(hub.rooms.join(Room::User(user_id.to_string()), session_id))
    }

    /// Checks that the session may act for `user_id`.
    pub async fn check_claim(&self, session_id: SessionId, user_id: &str) -> Result<(), BindError> {
        self.hub.read().await.sessions.check_claim(session_id, user_id)
    }

    pub async fn user_of(&self, session_id: SessionId) -> Option<String> {
        self.hub
            .read()
            .await
            .sessions
            .user_of(session_id)
            .map(str::to_string)
    }

    pub async fn members_of(&self, room: &Room) -> Vec<SessionId> {
        self.hub.read().await.rooms.members_of(room)
    }

    pub async fn rooms_of(&self, session_id: SessionId) -> Vec<Room> {
        self.hub.read().await.rooms.rooms_of(session_id)
    }

    pub async fn sessions_of_user(&self, user_id: &str) -> Vec<SessionId> {
        self.hub.read().await.sessions.sessions_of_user(user_id)
    }

    pub async fn session_count(&self) -> usize {
        self.hub.read().await.sessions.len()
    }

    /// Sends to every member of the room.
    pub async fn broadcast(&self, room: &Room, frame: &str) -> usize {
        let hub = self.hub.read().await;
        let target = room.to_string();
        hub.rooms
            .members_of(room)
            .into_iter()
            .filter(|session_id| hub.deliver(*session_id, frame, &target))
            .count()
    }

    /// Sends to every member of the room except `origin`.
    pub async fn broadcast_except(&self, room: &Room, frame: &str, origin: SessionId) -> usize {
        let hub = self.hub.read().await;
        let target = room.to_string();
        hub.rooms
            .members_of(room)
            .into_iter()
            .filter(|session_id| *session_id != origin)
            .filter(|session_id| hub.deliver(*session_id, frame, &target))
            .count()
    }

    /// Sends once to every session that is a member of any of the rooms.
    pub async fn broadcast_rooms(&self, rooms: &[Room], frame: &str) -> usize {
        let hub = self.hub.read().await;
        let mut seen = HashSet::new();
        let mut delivered = 0;
        for room in rooms {
            let target = room.to_string();
            for session_id in hub.rooms.members_of(room) {
                if seen.insert(session_id) && hub.deliver(session_id, frame, &target) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Sends to every live session.
    pub async fn broadcast_all(&self, frame: &str) -> usize {
        let hub = self.hub.read().await;
        hub.sessions
            .iter()
            .filter(|(session_id, _)| hub.deliver(**session_id, frame, "*"))
            .count()
    }

    /// Sends to every session bound to the user.
    pub async fn send_to_user(&self, user_id: &str, frame: &str) -> usize {
        let hub = self.hub.read().await;
        hub.sessions
            .sessions_of_user(user_id)
            .into_iter()
            .filter(|session_id| hub.deliver(*session_id, frame, user_id))
            .count()
    }

    /// Sends to a single session.
    pub async fn send(&self, session_id: SessionId, frame: &str) -> bool {
        self.hub
            .read()
            .await
            .deliver(session_id, frame, "session")
    }
}
