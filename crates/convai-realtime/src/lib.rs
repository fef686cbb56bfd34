//! Client for the ElevenLabs Conversational AI realtime WebSocket API.
//!
//! The crate is split into two modules:
//!
//! - `protocol`: the JSON wire format exchanged with the conversation
//!   endpoint (client events are serialize-only, server events are
//!   deserialize-only).
//! - `client`: connection establishment, authentication, and the initiation
//!   handshake.

pub mod client;
pub mod protocol;

pub use client::{AgentStream, connect};
