//! Startup port selection.
//!
//! The relay is often deployed next to other instances of itself, so the
//! configured port is a starting point, not a requirement: the binder walks
//! upward from it and serves on the first port that is actually free.

use std::net::IpAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Every port in `start..=end` was already in use (or the port space
    /// ran out).
    #[error("no free port found in {start}..={end}")]
    Exhausted { start: u16, end: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Binds the first free port at or above `start_port`, trying at most
/// `max_attempts` consecutive ports.
///
/// Only `AddrInUse` advances to the next port; any other I/O error is
/// reported immediately. The listener that confirmed availability is the
/// one returned, so the selected port cannot be lost to another process
/// between a probe and the real bind.
pub async fn bind_available_port(
    host: IpAddr,
    start_port: u16,
    max_attempts: u16,
) -> Result<TcpListener, BindError> {
    let mut last_tried = start_port;
    for offset in 0..max_attempts {
        let Some(port) = start_port.checked_add(offset) else {
            break;
        };
        last_tried = port;
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if offset > 0 {
                    info!(port, start_port, "Selected fallback port.");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                warn!(port, "Port in use. Trying {}...", port.saturating_add(1));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(BindError::Exhausted {
        start: start_port,
        end: last_tried,
    })
}
