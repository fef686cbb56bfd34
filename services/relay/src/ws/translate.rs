//! Pure translation rules between the two sides of a bridge session.
//!
//! Nothing here touches a socket: the session loop feeds frames in and acts
//! on the returned disposition.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use convai_realtime::protocol::{
    AudioPayload, ClientEvent, ServerEvent, TaggedServerEvent, UserAudioChunk,
};

/// What the bridge should do with one agent message.
#[derive(Debug)]
pub enum AgentSignal {
    /// Answer the keepalive on the agent socket; nothing reaches telephony.
    Pong { event_id: u64 },
    /// Forward decoded audio to the telephony socket, if it is writable.
    Audio(Vec<u8>),
    /// Structurally valid but unrecognized; log it, forward nothing.
    Observe(serde_json::Value),
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("malformed agent message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("agent audio payload is not valid base64: {0}")]
    InvalidAudio(#[from] base64::DecodeError),
}

/// Wraps one binary telephony frame as a structured agent event.
///
/// Frames are forwarded one-to-one and in order: no batching, no size
/// limit, no buffering.
pub fn wrap_telephony_frame(frame: &[u8]) -> ClientEvent {
    ClientEvent::Audio(UserAudioChunk {
        user_audio_chunk: BASE64.encode(frame),
    })
}

/// Classifies one text message from the agent socket.
///
/// A message that does not parse as JSON, or whose audio payload does not
/// decode, is a translation failure: the caller drops that single message
/// and the session continues.
pub fn classify_agent_message(raw: &str) -> Result<AgentSignal, TranslateError> {
    let event: ServerEvent = serde_json::from_str(raw)?;
    match event {
        ServerEvent::Tagged(TaggedServerEvent::Ping { event_id }) => {
            Ok(AgentSignal::Pong { event_id })
        }
        ServerEvent::Audio(AudioPayload { audio }) => {
            Ok(AgentSignal::Audio(BASE64.decode(audio)?))
        }
        ServerEvent::Other(value) => Ok(AgentSignal::Observe(value)),
    }
}
