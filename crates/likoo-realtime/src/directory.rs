//! Live sessions, their bound user and their outbound queue.

use crate::error::BindError;
use likoo_types::SessionId;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// State kept for one live connection.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// User this session acts for, once bound.
    pub user_id: Option<String>,
    /// Set when the identity was proven at connect time; such a binding is
    /// never replaced and every claimed user id must match it.
    pub verified: bool,
    /// Outbound queue drained by the connection's writer task.
    pub outbox: mpsc::Sender<String>,
}

/// Session to user mapping. A user may hold several sessions at once.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<SessionId, SessionEntry>,
    by_user: HashMap<String, HashSet<SessionId>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. A `verified_user` binds it immediately and
    /// permanently.
    pub fn register(
        &mut self,
        session_id: SessionId,
        outbox: mpsc::Sender<String>,
        verified_user: Option<String>,
    ) {
        let verified = verified_user.is_some();
        if let Some(user_id) = &verified_user {
            self.by_user
                .entry(user_id.clone())
                .or_default()
                .insert(session_id);
        }
        self.sessions.insert(
            session_id,
            SessionEntry {
                user_id: verified_user,
                verified,
                outbox,
            },
        );
    }

    /// Associates a user with the session.
    ///
    /// An unverified session may be rebound; the previous association is
    /// dropped. A verified session only accepts its own user id.
    pub fn bind_user(&mut self, session_id: SessionId, user_id: &str) -> Result<(), BindError> {
        let entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(BindError::UnknownSession(session_id))?;

        match entry.user_id.as_deref() {
            Some(bound) if bound == user_id => return Ok(()),
            Some(bound) if entry.verified => {
                return Err(BindError::IdentityMismatch {
                    bound: bound.to_string(),
                    claimed: user_id.to_string(),
                });
            }
            _ => {}
        }

        if let Some(previous) = entry.user_id.replace(user_id.to_string()) {
            remove_from_index(&mut self.by_user, &previous, session_id);
        }
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id);
        Ok(())
    }

    /// Checks that an event claiming `user_id` may be accepted from the session.
    pub fn check_claim(&self, session_id: SessionId, user_id: &str) -> Result<(), BindError> {
        let entry = self
            .sessions
            .get(&session_id)
            .ok_or(BindError::UnknownSession(session_id))?;
        match entry.user_id.as_deref() {
            Some(bound) if entry.verified && bound != user_id => {
                Err(BindError::IdentityMismatch {
                    bound: bound.to_string(),
                    claimed: user_id.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Removes the session, returning its final state.
    pub fn unregister(&mut self, session_id: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session_id)?;
        if let Some(user_id) = &entry.user_id {
            remove_from_index(&mut self.by_user, user_id, session_id);
        }
        Some(entry)
    }

    pub fn get(&self, session_id: SessionId) -> Option<&SessionEntry> {
        self.sessions.get(&session_id)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn user_of(&self, session_id: SessionId) -> Option<&str> {
        self.sessions.get(&session_id)?.user_id.as_deref()
    }

    /// Sessions currently bound to the user, sorted.
    pub fn sessions_of_user(&self, user_id: &str) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self
            .by_user
            .get(user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        sessions.sort();
        sessions
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &SessionEntry)> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn remove_from_index(
    by_user: &mut HashMap<String, HashSet<SessionId>>,
    user_id: &str,
    session_id: SessionId,
) {
    if let Some(ids) = by_user.get_mut(user_id) {
        ids.remove(&session_id);
        if ids.is_empty() {
            by_user.remove(user_id);
        }
    }
}
