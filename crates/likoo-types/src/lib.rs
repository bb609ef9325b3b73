//! Shared types for the Likoo chat platform.
//!
//! This crate provides the vocabulary used across every Likoo crate: the
//! naming scheme for real-time rooms, user presence statuses, channel kinds
//! and the identifier given to each live connection.
//!
//! Room names are part of the wire contract with clients and with any future
//! pub/sub backend, so their string form is defined here once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of one live client connection.
///
/// Opaque and unique for the lifetime of the process; a reconnecting client
/// always receives a fresh one.
pub type SessionId = uuid::Uuid;

/// A logical fanout group.
///
/// The four kinds are distinguished only by their name prefix:
/// `channel:<id>`, `user:<id>`, `server:<id>` and `voice:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    /// Text chat for a single channel.
    Channel(String),
    /// Personal notification room of a user (DMs, avatar updates).
    User(String),
    /// Server-wide broadcast room.
    Server(String),
    /// Voice session signaling and presence for a voice channel.
    Voice(String),
}

impl Room {
    /// Returns the name prefix for this room kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Channel(_) => "channel",
            Self::User(_) => "user",
            Self::Server(_) => "server",
            Self::Voice(_) => "voice",
        }
    }

    /// Returns the id part of the room name.
    pub fn id(&self) -> &str {
        match self {
            Self::Channel(id) | Self::User(id) | Self::Server(id) | Self::Voice(id) => id,
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Presence status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Away,
    Dnd,
    Offline,
}

impl UserStatus {
    /// Returns the string stored in the `users.status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Dnd => "dnd",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a status string outside online/away/dnd/offline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown user status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for UserStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "dnd" => Ok(Self::Dnd),
            "offline" => Ok(Self::Offline),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Text chat channel.
    Text,
    /// Voice channel.
    Voice,
}

impl ChannelType {
    /// Returns the string stored in the `channels.type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }

    /// Parses the `channels.type` column, returning `None` for unknown kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }
}
