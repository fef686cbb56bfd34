//! Callbridge Relay Library Crate
//!
//! This library contains all the core logic for the telephony-to-agent
//! relay service: configuration, port selection, the HTTP/WebSocket router,
//! and the per-call bridge. The `relay` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod net;
pub mod router;
pub mod state;
pub mod ws;
