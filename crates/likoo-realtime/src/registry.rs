//! Room membership bookkeeping.
//!
//! Plain data structure with no locking of its own; [`ConnectionManager`]
//! owns it behind the same lock as the session directory so membership and
//! session state change together.
//!
//! [`ConnectionManager`]: crate::ConnectionManager

use likoo_types::{Room, SessionId};
use std::collections::{HashMap, HashSet};

/// Room name to member sessions, with a reverse index for disconnect cleanup.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<Room, HashSet<SessionId>>,
    memberships: HashMap<SessionId, HashSet<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the session to the room. Returns `false` if it was already a member.
    pub fn join(&mut self, room: Room, session_id: SessionId) -> bool {
        let inserted = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(session_id);
        if inserted {
            self.memberships.entry(session_id).or_default().insert(room);
        }
        inserted
    }

    /// Removes the session from the room. Returns `false` if it was not a member.
    pub fn leave(&mut self, room: &Room, session_id: SessionId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(members) => {
                let removed = members.remove(&session_id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
                removed
            }
            None => false,
        };

        if removed {
            if let Some(rooms) = self.memberships.get_mut(&session_id) {
                rooms.remove(room);
                if rooms.is_empty() {
                    self.memberships.remove(&session_id);
                }
            }
        }
        removed
    }

    /// Removes the session from every room it joined, returning those rooms.
    pub fn leave_all(&mut self, session_id: SessionId) -> Vec<Room> {
        let Some(rooms) = self.memberships.remove(&session_id) else {
            return Vec::new();
        };

        for room in &rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&session_id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }

        let mut rooms: Vec<Room> = rooms.into_iter().collect();
        rooms.sort();
        rooms
    }

    /// Snapshot of the room's members, sorted for stable iteration.
    pub fn members_of(&self, room: &Room) -> Vec<SessionId> {
        let mut members: Vec<SessionId> = self
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Rooms the session currently belongs to, sorted by name.
    pub fn rooms_of(&self, session_id: SessionId) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .memberships
            .get(&session_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub fn is_member(&self, room: &Room, session_id: SessionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn channel(id: &str) -> Room {
        Room::Channel(id.to_string())
    }

    #[test]
    fn join_is_idempotent() {
        let mut registry = RoomRegistry::new();
        let s = Uuid::new_v4();
        assert!(registry.join(channel("c1"), s));
        assert!(!registry.join(channel("c1"), s));
        assert_eq!(registry.members_of(&channel("c1")), vec![s]);
        assert_eq!(registry.rooms_of(s), vec![channel("c1")]);
    }

    #[test]
    fn leave_of_non_member_is_noop() {
        let mut registry = RoomRegistry::new();
        let s = Uuid::new_v4();
        assert!(!registry.leave(&channel("c1"), s));

        registry.join(channel("c1"), s);
        assert!(!registry.leave(&channel("c2"), s));
        assert!(registry.is_member(&channel("c1"), s));
    }

    #[test]
    fn leave_drops_empty_rooms() {
        let mut registry = RoomRegistry::new();
        let s = Uuid::new_v4();
        registry.join(channel("c1"), s);
        assert!(registry.leave(&channel("c1"), s));
        assert!(registry.rooms.is_empty());
        assert!(registry.rooms_of(s).is_empty());
    }

    #[test]
    fn leave_all_clears_both_indexes() {
        let mut registry = RoomRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.join(channel("c1"), a);
        registry.join(Room::User("u1".into()), a);
        registry.join(channel("c1"), b);

        let left = registry.leave_all(a);
        assert_eq!(left, vec![channel("c1"), Room::User("u1".into())]);
        assert_eq!(registry.members_of(&channel("c1")), vec![b]);
        assert!(registry.members_of(&Room::User("u1".into())).is_empty());
        assert!(registry.rooms_of(a).is_empty());
        assert!(registry.leave_all(a).is_empty());
    }

    #[test]
    fn room_kinds_are_distinct() {
        let mut registry = RoomRegistry::new();
        let s = Uuid::new_v4();
        registry.join(Room::Voice("x".into()), s);
        assert!(registry.members_of(&channel("x")).is_empty());
        assert!(registry.is_member(&Room::Voice("x".into()), s));
    }
}
