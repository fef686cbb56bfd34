//! JSON wire format for the Conversational AI realtime endpoint.
//!
//! Client events are only ever serialized and server events only ever
//! deserialized, so each direction derives just what it needs.

use serde::{Deserialize, Serialize};

/// Any message the client can send to the conversation endpoint.
///
/// Audio chunks are untagged on the wire (`{"user_audio_chunk": ...}`), so
/// the enum is untagged and defers tagging to the control variant.
#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum ClientEvent {
    Control(ControlEvent),
    Audio(UserAudioChunk),
}

/// Type-tagged control messages sent to the agent.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// Opens the conversation. Must be the first message on the socket.
    ConversationInitiationClientData,
    /// Declares the audio format the agent must emit. Must directly follow
    /// the initiation event; the service falls back to its default encoding
    /// if this is omitted or reordered.
    AgentOutputAudioFormat { audio_format: AudioFormat },
    /// Keepalive reply. Echoes the `event_id` of the ping it answers.
    Pong { event_id: u64 },
}

/// A caller audio chunk, base64 encoded.
#[derive(Serialize, Debug)]
pub struct UserAudioChunk {
    pub user_audio_chunk: String,
}

#[derive(Serialize, Debug)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
}

impl AudioFormat {
    /// Telephony-grade mu-law at 8000 Hz.
    pub fn mulaw_8khz() -> Self {
        Self {
            encoding: AudioEncoding::Mulaw,
            sample_rate: 8000,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Mulaw,
}

/// Any structurally valid message received from the agent.
///
/// Variant order encodes classification precedence: a `type: "ping"` tag
/// wins, then a bare `audio` field, and everything else lands in `Other`
/// to be observed by the caller rather than rejected.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ServerEvent {
    Tagged(TaggedServerEvent),
    Audio(AudioPayload),
    Other(serde_json::Value),
}

/// Type-tagged server messages the client reacts to.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaggedServerEvent {
    Ping { event_id: u64 },
}

/// Agent speech, base64 encoded in the negotiated output format.
#[derive(Deserialize, Debug)]
pub struct AudioPayload {
    pub audio: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initiation_event_serializes_with_type_tag_only() {
        let event = ClientEvent::Control(ControlEvent::ConversationInitiationClientData);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "conversation_initiation_client_data"})
        );
    }

    #[test]
    fn audio_format_event_declares_mulaw_8khz() {
        let event = ClientEvent::Control(ControlEvent::AgentOutputAudioFormat {
            audio_format: AudioFormat::mulaw_8khz(),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "agent_output_audio_format",
                "audio_format": {"encoding": "mulaw", "sample_rate": 8000}
            })
        );
    }

    #[test]
    fn pong_echoes_event_id() {
        let event = ClientEvent::Control(ControlEvent::Pong { event_id: 42 });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "pong", "event_id": 42})
        );
    }

    #[test]
    fn user_audio_chunk_serializes_untagged() {
        let event = ClientEvent::Audio(UserAudioChunk {
            user_audio_chunk: "AAEC".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"user_audio_chunk": "AAEC"})
        );
    }

    #[test]
    fn ping_deserializes_from_tagged_message() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"ping","event_id":42}"#).unwrap();
        match event {
            ServerEvent::Tagged(TaggedServerEvent::Ping { event_id }) => {
                assert_eq!(event_id, 42)
            }
            other => panic!("expected ping, got {other:?}"),
        }
    }

    #[test]
    fn bare_audio_field_deserializes_as_audio() {
        let event: ServerEvent = serde_json::from_str(r#"{"audio":"AAEC"}"#).unwrap();
        match event {
            ServerEvent::Audio(AudioPayload { audio }) => assert_eq!(audio, "AAEC"),
            other => panic!("expected audio, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tagged_message_falls_through_to_other() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"interruption","event_id":7}"#).unwrap();
        assert!(matches!(event, ServerEvent::Other(_)));
    }

    #[test]
    fn audio_field_wins_over_unrecognized_type_tag() {
        // Mirrors the upstream precedence: a message that is not a ping but
        // carries audio is still audio.
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"agent_response","audio":"AAEC"}"#).unwrap();
        assert!(matches!(event, ServerEvent::Audio(_)));
    }

    #[test]
    fn non_integer_ping_id_is_observed_not_answered() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"ping","event_id":"not-a-number"}"#).unwrap();
        assert!(matches!(event, ServerEvent::Other(_)));
    }
}
