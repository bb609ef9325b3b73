//! Connection lifecycle and event dispatch.

use crate::connections::{ConnectionManager, Departure};
use crate::error::{EventError, PresenceError};
use crate::event::{
    ChannelRef, IncomingEvent, OutgoingEvent, SendDirectMessage, SendMessage, ServerRef,
    StatusChange, Typing, UserRef,
};
use crate::fanout::FanoutEngine;
use crate::locks::ChannelLocks;
use crate::presence::PresenceBroadcaster;
use crate::signaling::{SignalKind, SignalingRelay, VoiceStateKind};
use likoo_store::ChatStore;
use likoo_types::{Room, SessionId, UserStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const CONNECTED_MESSAGE: &str = "Connected to server";
const JOINED_MESSAGE: &str = "User joined the channel";
const LEFT_MESSAGE: &str = "User left the channel";
const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Upper bound on any single persistence call.
    pub store_timeout: Duration,
    /// Mark a user offline when their last session disconnects.
    pub offline_on_last_disconnect: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            offline_on_last_disconnect: true,
        }
    }
}

/// Entry point for everything a connection does.
///
/// Events from one connection are handled in arrival order; events from
/// different connections run concurrently.
pub struct Gateway<S> {
    connections: ConnectionManager,
    fanout: FanoutEngine<S>,
    presence: PresenceBroadcaster<S>,
    signaling: SignalingRelay,
    /// Serializes binding a user against marking that user offline.
    user_locks: ChannelLocks,
    settings: GatewaySettings,
}

impl<S: ChatStore> Gateway<S> {
    pub fn new(store: Arc<S>, settings: GatewaySettings) -> Self {
        let connections = ConnectionManager::new();
        Self {
            fanout: FanoutEngine::new(
                Arc::clone(&store),
                connections.clone(),
                settings.store_timeout,
            ),
            presence: PresenceBroadcaster::new(store, connections.clone(), settings.store_timeout),
            signaling: SignalingRelay::new(connections.clone()),
            connections,
            user_locks: ChannelLocks::new(),
            settings,
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn fanout(&self) -> &FanoutEngine<S> {
        &self.fanout
    }

    pub fn presence(&self) -> &PresenceBroadcaster<S> {
        &self.presence
    }

    pub fn signaling(&self) -> &SignalingRelay {
        &self.signaling
    }

    /// Registers a new connection and greets it with `connect_response`.
    pub async fn connect(
        &self,
        outbox: mpsc::Sender<String>,
        verified_user: Option<String>,
    ) -> SessionId {
        let verified = verified_user.is_some();
        let guard = match &verified_user {
            Some(user_id) => Some(self.lock_user(user_id).await),
            None => None,
        };
        let session_id = self.connections.add_session(outbox, verified_user).await;
        drop(guard);

        let greeting = OutgoingEvent::ConnectResponse {
            message: CONNECTED_MESSAGE.to_string(),
        };
        match greeting.to_frame() {
            Ok(frame) => {
                self.connections.send(session_id, &frame).await;
            }
            Err(e) => tracing::error!("failed to encode connect response: {}", e),
        }

        tracing::info!(session_id = %session_id, verified, "session connected");
        session_id
    }

    /// Drops the connection from every room and from the directory.
    ///
    /// When this was the user's last session, the user is marked offline.
    pub async fn disconnect(&self, session_id: SessionId) -> Option<Departure> {
        let departure = self.connections.remove_session(session_id).await?;
        tracing::info!(
            session_id = %session_id,
            user_id = departure.user_id.as_deref().unwrap_or(""),
            rooms = departure.rooms.len(),
            "session disconnected"
        );

        if self.settings.offline_on_last_disconnect && departure.remaining_user_sessions == 0 {
            if let Some(user_id) = &departure.user_id {
                self.mark_offline_unless_reconnected(user_id).await;
            }
        }
        Some(departure)
    }

    /// Marks the user offline if no session is bound to them.
    ///
    /// Holds the user's lock, so a session binding the same user either
    /// lands first and cancels this, or waits until the offline status has
    /// been stored and announced.
    async fn mark_offline_unless_reconnected(&self, user_id: &str) {
        let _guard = self.lock_user(user_id).await;
        if !self.connections.sessions_of_user(user_id).await.is_empty() {
            tracing::debug!(user_id = %user_id, "user reconnected, keeping status");
            return;
        }
        if let Err(e) = self.presence.set_status(user_id, UserStatus::Offline).await {
            tracing::warn!(user_id = %user_id, "failed to mark user offline: {}", e);
        }
    }

    async fn lock_user(&self, user_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.user_locks
            .acquire(&Room::User(user_id.to_string()).to_string())
            .await
    }

    /// Parses and handles one text frame.
    pub async fn handle_frame(&self, session_id: SessionId, text: &str) -> Result<usize, EventError> {
        let event = IncomingEvent::from_frame(text).map_err(EventError::Malformed)?;
        self.handle(session_id, event).await
    }

    /// Handles one event. Returns how many sessions received a frame.
    pub async fn handle(&self, session_id: SessionId, event: IncomingEvent) -> Result<usize, EventError> {
        tracing::trace!(session_id = %session_id, event = event.name(), "handling event");
        match event {
            IncomingEvent::JoinChannel(ChannelRef { channel_id }) => {
                require("channel_id", &channel_id)?;
                let room = Room::Channel(channel_id.clone());
                self.connections.join(room.clone(), session_id).await?;
                self.channel_status(&room, channel_id, JOINED_MESSAGE).await
            }
            IncomingEvent::LeaveChannel(ChannelRef { channel_id }) => {
                require("channel_id", &channel_id)?;
                let room = Room::Channel(channel_id.clone());
                self.connections.leave(&room, session_id).await;
                self.channel_status(&room, channel_id, LEFT_MESSAGE).await
            }
            IncomingEvent::JoinUserRoom(UserRef { user_id }) => {
                let user_id = self.acting_user(session_id, user_id).await?;
                require("user_id", &user_id)?;
                let _guard = self.lock_user(&user_id).await;
                self.connections.bind_user(session_id, &user_id).await?;
                Ok(0)
            }
            IncomingEvent::JoinServer(ServerRef { server_id }) => {
                require("server_id", &server_id)?;
                self.connections
                    .join(Room::Server(server_id), session_id)
                    .await?;
                Ok(0)
            }
            IncomingEvent::SendMessage(SendMessage {
                channel_id,
                content,
                user_id,
            }) => {
                let user_id = self.acting_user(session_id, user_id).await?;
                let delivered = self
                    .fanout
                    .send_channel_message(&channel_id, &user_id, &content)
                    .await?;
                Ok(delivered.recipients)
            }
            IncomingEvent::SendDm(SendDirectMessage {
                sender_id,
                receiver_id,
                content,
            }) => {
                let sender_id = self.acting_user(session_id, sender_id).await?;
                let delivered = self
                    .fanout
                    .send_direct_message(&sender_id, &receiver_id, &content)
                    .await?;
                Ok(delivered.recipients)
            }
            IncomingEvent::Typing(typing) => self.typing(session_id, typing).await,
            IncomingEvent::UserStatusChange(StatusChange { user_id, status }) => {
                require("status", &status)?;
                let status: UserStatus = status.parse().map_err(PresenceError::from)?;
                let user_id = self.acting_user(session_id, user_id).await?;
                Ok(self.presence.set_status(&user_id, status).await?)
            }
            IncomingEvent::VoiceChannelJoin(mut membership) => {
                membership.user_id = self.acting_user(session_id, membership.user_id).await?;
                Ok(self.signaling.join_voice(session_id, membership).await?)
            }
            IncomingEvent::VoiceChannelLeave(mut membership) => {
                membership.user_id = self.acting_user(session_id, membership.user_id).await?;
                Ok(self.signaling.leave_voice(session_id, membership).await?)
            }
            IncomingEvent::WebrtcOffer(mut envelope) => {
                envelope.sender_user_id =
                    self.acting_user(session_id, envelope.sender_user_id).await?;
                Ok(self.signaling.relay(SignalKind::Offer, envelope).await?)
            }
            IncomingEvent::WebrtcAnswer(mut envelope) => {
                envelope.sender_user_id =
                    self.acting_user(session_id, envelope.sender_user_id).await?;
                Ok(self.signaling.relay(SignalKind::Answer, envelope).await?)
            }
            IncomingEvent::WebrtcIceCandidate(mut envelope) => {
                envelope.sender_user_id =
                    self.acting_user(session_id, envelope.sender_user_id).await?;
                Ok(self.signaling.relay(SignalKind::IceCandidate, envelope).await?)
            }
            IncomingEvent::VoiceMuteChanged(mut state) => {
                state.user_id = self.acting_user(session_id, state.user_id).await?;
                Ok(self
                    .signaling
                    .voice_state(session_id, VoiceStateKind::Mute, state)
                    .await?)
            }
            IncomingEvent::VoiceDeafenChanged(mut state) => {
                state.user_id = self.acting_user(session_id, state.user_id).await?;
                Ok(self
                    .signaling
                    .voice_state(session_id, VoiceStateKind::Deafen, state)
                    .await?)
            }
            IncomingEvent::VoiceStreamingStarted(mut state) => {
                state.user_id = self.acting_user(session_id, state.user_id).await?;
                Ok(self
                    .signaling
                    .voice_state(session_id, VoiceStateKind::StreamingStarted, state)
                    .await?)
            }
            IncomingEvent::VoiceStreamingStopped(mut state) => {
                state.user_id = self.acting_user(session_id, state.user_id).await?;
                Ok(self
                    .signaling
                    .voice_state(session_id, VoiceStateKind::StreamingStopped, state)
                    .await?)
            }
        }
    }

    /// Resolves the user an event acts for.
    ///
    /// An omitted id falls back to the session's bound user; an explicit one
    /// must match a verified binding. With neither, the id stays empty and
    /// the operation reports the missing field.
    async fn acting_user(&self, session_id: SessionId, claimed: String) -> Result<String, EventError> {
        if claimed.is_empty() {
            return Ok(self.connections.user_of(session_id).await.unwrap_or_default());
        }
        self.connections.check_claim(session_id, &claimed).await?;
        Ok(claimed)
    }

    async fn channel_status(
        &self,
        room: &Room,
        channel_id: String,
        message: &str,
    ) -> Result<usize, EventError> {
        let frame = OutgoingEvent::Status {
            message: message.to_string(),
            channel_id,
        }
        .to_frame()
        .map_err(EventError::Encode)?;
        Ok(self.connections.broadcast(room, &frame).await)
    }

    async fn typing(&self, session_id: SessionId, typing: Typing) -> Result<usize, EventError> {
        require("channel_id", &typing.channel_id)?;
        let username = typing
            .username
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let room = Room::Channel(typing.channel_id.clone());
        let frame = OutgoingEvent::UserTyping {
            username,
            channel_id: typing.channel_id,
        }
        .to_frame()
        .map_err(EventError::Encode)?;
        Ok(self
            .connections
            .broadcast_except(&room, &frame, session_id)
            .await)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), EventError> {
    if value.is_empty() {
        return Err(EventError::MissingField(field));
    }
    Ok(())
}
