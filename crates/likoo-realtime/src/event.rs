//! Wire events exchanged with clients.
//!
//! Both directions use the envelope `{"event": <name>, "data": {...}}`.
//! Payload fields default to empty so that a missing field surfaces as a
//! validation error from the handling operation rather than a parse failure.

use likoo_store::{ChannelMessage, DirectMessage};
use likoo_types::UserStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum IncomingEvent {
    JoinChannel(ChannelRef),
    LeaveChannel(ChannelRef),
    JoinUserRoom(UserRef),
    JoinServer(ServerRef),
    SendMessage(SendMessage),
    SendDm(SendDirectMessage),
    Typing(Typing),
    UserStatusChange(StatusChange),
    VoiceChannelJoin(VoiceMembership),
    VoiceChannelLeave(VoiceMembership),
    WebrtcOffer(SignalEnvelope),
    WebrtcAnswer(SignalEnvelope),
    WebrtcIceCandidate(SignalEnvelope),
    VoiceMuteChanged(VoiceState),
    VoiceDeafenChanged(VoiceState),
    VoiceStreamingStarted(VoiceState),
    VoiceStreamingStopped(VoiceState),
}

impl IncomingEvent {
    /// Parses one text frame.
    pub fn from_frame(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChannel(_) => "join_channel",
            Self::LeaveChannel(_) => "leave_channel",
            Self::JoinUserRoom(_) => "join_user_room",
            Self::JoinServer(_) => "join_server",
            Self::SendMessage(_) => "send_message",
            Self::SendDm(_) => "send_dm",
            Self::Typing(_) => "typing",
            Self::UserStatusChange(_) => "user_status_change",
            Self::VoiceChannelJoin(_) => "voice_channel_join",
            Self::VoiceChannelLeave(_) => "voice_channel_leave",
            Self::WebrtcOffer(_) => "webrtc_offer",
            Self::WebrtcAnswer(_) => "webrtc_answer",
            Self::WebrtcIceCandidate(_) => "webrtc_ice_candidate",
            Self::VoiceMuteChanged(_) => "voice_mute_changed",
            Self::VoiceDeafenChanged(_) => "voice_deafen_changed",
            Self::VoiceStreamingStarted(_) => "voice_streaming_started",
            Self::VoiceStreamingStopped(_) => "voice_streaming_stopped",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelRef {
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRef {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRef {
    pub server_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMessage {
    pub channel_id: String,
    pub content: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendDirectMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Typing {
    pub channel_id: String,
    pub username: Option<String>,
}

/// `status` stays a string here; it is validated by the presence broadcaster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusChange {
    pub user_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceMembership {
    pub user_id: String,
    pub channel_id: String,
}

/// Offer, answer or ICE candidate addressed to one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalEnvelope {
    pub target_user_id: String,
    pub sender_user_id: String,
    pub channel_id: String,
    /// Opaque SDP or candidate body, relayed untouched.
    pub payload: Value,
}

/// Mute, deafen or stream state of one voice participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceState {
    pub user_id: String,
    pub channel_id: String,
    pub state: Option<Value>,
}

/// Every event the server may push to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutgoingEvent {
    ConnectResponse {
        message: String,
    },
    Status {
        message: String,
        channel_id: String,
    },
    NewMessage(ChannelMessage),
    NewDm(DirectMessage),
    UserTyping {
        username: String,
        channel_id: String,
    },
    UserStatusChanged {
        user_id: String,
        status: UserStatus,
    },
    UserAvatarChanged {
        user_id: String,
        avatar: String,
    },
    ServerIconChanged {
        server_id: String,
        icon_image: String,
    },
    VoiceUserJoined {
        user_id: String,
        channel_id: String,
    },
    VoiceUserLeft {
        user_id: String,
        channel_id: String,
    },
    WebrtcOffer(RelayedSignal),
    WebrtcAnswer(RelayedSignal),
    WebrtcIceCandidate(RelayedSignal),
    VoiceMuteChanged(VoiceStateUpdate),
    VoiceDeafenChanged(VoiceStateUpdate),
    VoiceStreamingStarted(VoiceStateUpdate),
    VoiceStreamingStopped(VoiceStateUpdate),
}

impl OutgoingEvent {
    /// Serializes the event into one text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A signaling payload as delivered to its target, tagged with the sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedSignal {
    pub from: String,
    pub channel_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceStateUpdate {
    pub user_id: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_enveloped_event() {
        let event = IncomingEvent::from_frame(
            r#"{"event":"send_message","data":{"channel_id":"c1","content":"hi","user_id":"u1"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            IncomingEvent::SendMessage(SendMessage {
                channel_id: "c1".into(),
                content: "hi".into(),
                user_id: "u1".into(),
            })
        );
        assert_eq!(event.name(), "send_message");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let event =
            IncomingEvent::from_frame(r#"{"event":"join_channel","data":{}}"#).unwrap();
        assert_eq!(event, IncomingEvent::JoinChannel(ChannelRef::default()));

        let event = IncomingEvent::from_frame(
            r#"{"event":"webrtc_offer","data":{"target_user_id":"u2"}}"#,
        )
        .unwrap();
        match event {
            IncomingEvent::WebrtcOffer(envelope) => assert!(envelope.payload.is_null()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(IncomingEvent::from_frame(r#"{"event":"drop_tables","data":{}}"#).is_err());
        assert!(IncomingEvent::from_frame("not json").is_err());
    }

    #[test]
    fn outgoing_uses_same_envelope() {
        let frame = OutgoingEvent::UserStatusChanged {
            user_id: "u1".into(),
            status: UserStatus::Dnd,
        }
        .to_frame()
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({"event": "user_status_changed", "data": {"user_id": "u1", "status": "dnd"}})
        );
    }

    #[test]
    fn relayed_signal_carries_sender() {
        let frame = OutgoingEvent::WebrtcIceCandidate(RelayedSignal {
            from: "u1".into(),
            channel_id: "v1".into(),
            payload: json!({"candidate": "a=1"}),
        })
        .to_frame()
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "webrtc_ice_candidate");
        assert_eq!(value["data"]["from"], "u1");
        assert_eq!(value["data"]["payload"]["candidate"], "a=1");
    }

    #[test]
    fn absent_voice_state_is_omitted() {
        let frame = OutgoingEvent::VoiceStreamingStarted(VoiceStateUpdate {
            user_id: "u1".into(),
            channel_id: "v1".into(),
            state: None,
        })
        .to_frame()
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert!(value["data"].get("state").is_none());
    }
}
