//! WebRTC negotiation relay and voice room notifications.
//!
//! Nothing here is persisted and payloads are never inspected.

use crate::connections::ConnectionManager;
use crate::error::SignalError;
use crate::event::{
    OutgoingEvent, RelayedSignal, SignalEnvelope, VoiceMembership, VoiceState, VoiceStateUpdate,
};
use likoo_types::{Room, SessionId};

/// Point-to-point negotiation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    fn into_event(self, signal: RelayedSignal) -> OutgoingEvent {
        match self {
            Self::Offer => OutgoingEvent::WebrtcOffer(signal),
            Self::Answer => OutgoingEvent::WebrtcAnswer(signal),
            Self::IceCandidate => OutgoingEvent::WebrtcIceCandidate(signal),
        }
    }
}

/// Participant state changes echoed to the rest of a voice room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStateKind {
    Mute,
    Deafen,
    StreamingStarted,
    StreamingStopped,
}

impl VoiceStateKind {
    /// Mute and deafen carry the new value; stream start/stop is the value.
    fn requires_state(self) -> bool {
        matches!(self, Self::Mute | Self::Deafen)
    }

    fn into_event(self, update: VoiceStateUpdate) -> OutgoingEvent {
        match self {
            Self::Mute => OutgoingEvent::VoiceMuteChanged(update),
            Self::Deafen => OutgoingEvent::VoiceDeafenChanged(update),
            Self::StreamingStarted => OutgoingEvent::VoiceStreamingStarted(update),
            Self::StreamingStopped => OutgoingEvent::VoiceStreamingStopped(update),
        }
    }
}

/// Stateless relay over the connection manager.
#[derive(Clone)]
pub struct SignalingRelay {
    connections: ConnectionManager,
}

impl SignalingRelay {
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    /// Delivers an offer, answer or ICE candidate to every session of the
    /// target user, tagged with the sender's id.
    pub async fn relay(&self, kind: SignalKind, envelope: SignalEnvelope) -> Result<usize, SignalError> {
        require("target_user_id", &envelope.target_user_id)?;
        require("sender_user_id", &envelope.sender_user_id)?;
        require("channel_id", &envelope.channel_id)?;
        if envelope.payload.is_null() {
            return Err(SignalError::MissingField("payload"));
        }

        let frame = kind
            .into_event(RelayedSignal {
                from: envelope.sender_user_id,
                channel_id: envelope.channel_id,
                payload: envelope.payload,
            })
            .to_frame()?;

        let delivered = self
            .connections
            .send_to_user(&envelope.target_user_id, &frame)
            .await;
        if delivered == 0 {
            return Err(SignalError::TargetNotConnected(envelope.target_user_id));
        }
        Ok(delivered)
    }

    /// Joins `voice:<channel_id>` and announces the participant to the whole
    /// room, the joiner included.
    pub async fn join_voice(
        &self,
        origin: SessionId,
        membership: VoiceMembership,
    ) -> Result<usize, SignalError> {
        require("user_id", &membership.user_id)?;
        require("channel_id", &membership.channel_id)?;

        let room = Room::Voice(membership.channel_id.clone());
        self.connections.join(room.clone(), origin).await?;

        let frame = OutgoingEvent::VoiceUserJoined {
            user_id: membership.user_id,
            channel_id: membership.channel_id,
        }
        .to_frame()?;
        Ok(self.connections.broadcast(&room, &frame).await)
    }

    /// Announces the departure to the whole room, the leaver included, then
    /// leaves `voice:<channel_id>`.
    pub async fn leave_voice(
        &self,
        origin: SessionId,
        membership: VoiceMembership,
    ) -> Result<usize, SignalError> {
        require("user_id", &membership.user_id)?;
        require("channel_id", &membership.channel_id)?;

        let room = Room::Voice(membership.channel_id.clone());
        let frame = OutgoingEvent::VoiceUserLeft {
            user_id: membership.user_id,
            channel_id: membership.channel_id,
        }
        .to_frame()?;
        let delivered = self.connections.broadcast(&room, &frame).await;
        self.connections.leave(&room, origin).await;
        Ok(delivered)
    }

    /// Echoes a participant state change to the voice room, minus the
    /// originating session.
    pub async fn voice_state(
        &self,
        origin: SessionId,
        kind: VoiceStateKind,
        state: VoiceState,
    ) -> Result<usize, SignalError> {
        require("user_id", &state.user_id)?;
        require("channel_id", &state.channel_id)?;
        if kind.requires_state() && state.state.is_none() {
            return Err(SignalError::MissingField("state"));
        }

        let room = Room::Voice(state.channel_id.clone());
        let frame = kind
            .into_event(VoiceStateUpdate {
                user_id: state.user_id,
                channel_id: state.channel_id,
                state: state.state,
            })
            .to_frame()?;
        Ok(self.connections.broadcast_except(&room, &frame, origin).await)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), SignalError> {
    if value.is_empty() {
        return Err(SignalError::MissingField(field));
    }
    Ok(())
}
