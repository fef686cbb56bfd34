//! WebSocket Bridge Logic
//!
//! This module contains the per-call bridge between a telephony media
//! stream and the conversational agent. It is structured into submodules:
//!
//! - `translate`: pure translation rules between the telephony side's
//!   binary framing and the agent side's structured messages.
//! - `session`: the bridge itself — connection lifecycle, the coupling
//!   policy, and the relay loop.

mod translate;

pub mod session;

pub use session::ws_handler;
