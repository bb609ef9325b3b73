use likoo_store::StoreError;
use likoo_types::{ParseStatusError, SessionId};
use std::time::Duration;
use thiserror::Error;

/// Session identity errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("session {0} is not registered")]
    UnknownSession(SessionId),
    #[error("session is bound to {bound}, event claims {claimed}")]
    IdentityMismatch { bound: String, claimed: String },
}

/// Failure of a blocking persistence call.
#[derive(Debug, Error)]
pub enum StoreCallError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("message content exceeds {max} bytes")]
    ContentTooLong { max: usize },
    #[error("unknown author: {0}")]
    UnknownAuthor(String),
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("lookup failed: {0}")]
    Lookup(StoreCallError),
    #[error("persistence failed: {0}")]
    Persistence(StoreCallError),
    /// The insert outlived the persistence timeout. It is still running and
    /// is broadcast if it commits.
    #[error("persistence still running after {0:?}, broadcast deferred")]
    PersistPending(Duration),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidStatus(#[from] ParseStatusError),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("unknown server: {0}")]
    UnknownServer(String),
    #[error("store call failed: {0}")]
    Store(#[from] StoreCallError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("user {0} has no live session")]
    TargetNotConnected(String),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why an inbound client event produced no effect.
///
/// Clients never see these; the socket loop logs them and moves on.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(serde_json::Error),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Fanout(#[from] FanoutError),
    #[error(transparent)]
    Presence(#[from] PresenceError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error("encode error: {0}")]
    Encode(serde_json::Error),
}
