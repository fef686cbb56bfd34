//! Shared Application State
//!
//! The relay's shared state is deliberately small: the configuration is
//! loaded once at startup and injected here, and each bridge session owns
//! everything else about itself.

use crate::config::Config;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}
