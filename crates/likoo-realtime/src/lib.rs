//! Real-time presence and message fanout for Likoo.
//!
//! Maps live connections to named rooms, persists chat messages before
//! fanning them out, broadcasts presence changes and relays WebRTC
//! signaling between voice participants.
//!
//! Layering, leaves first:
//!
//! - [`RoomRegistry`]: room name to member sessions, plus the reverse index.
//! - [`SessionDirectory`]: session to bound user id and outbound queue.
//! - [`ConnectionManager`]: both of the above behind one lock, with the
//!   delivery primitives (room, room-except-origin, user, everyone).
//! - [`FanoutEngine`], [`PresenceBroadcaster`], [`SignalingRelay`]: the
//!   operations behind each client event.
//! - [`Gateway`]: connection lifecycle and dispatch over the closed
//!   [`IncomingEvent`] union.
//!
//! Every fanout is expressed as "publish to a named room", so the in-memory
//! registry can later be replaced by a shared broker.

mod connections;
mod directory;
mod error;
mod event;
mod fanout;
mod gateway;
mod locks;
mod presence;
mod registry;
mod signaling;
mod store_call;

pub use connections::{ConnectionManager, Departure};
pub use directory::{SessionDirectory, SessionEntry};
pub use error::{BindError, EventError, FanoutError, PresenceError, SignalError, StoreCallError};
pub use event::{
    ChannelRef, IncomingEvent, OutgoingEvent, RelayedSignal, SendDirectMessage, SendMessage,
    ServerRef, SignalEnvelope, StatusChange, Typing, UserRef, VoiceMembership, VoiceState,
    VoiceStateUpdate,
};
pub use fanout::{Delivered, FanoutEngine, MAX_CONTENT_LEN};
pub use gateway::{Gateway, GatewaySettings};
pub use locks::ChannelLocks;
pub use presence::PresenceBroadcaster;
pub use registry::RoomRegistry;
pub use signaling::{SignalKind, SignalingRelay, VoiceStateKind};

pub use likoo_types::{Room, SessionId, UserStatus};
