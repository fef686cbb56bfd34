//! The per-call Session Bridge.
//!
//! Each accepted telephony connection gets one task that owns both sockets:
//! the inbound telephony WebSocket and the outbound agent WebSocket. The
//! task multiplexes the two streams with `select!`, pushes every frame
//! through the translation rules, and applies the lifecycle-coupling policy
//! when either peer ends. No state is shared between sessions.

use super::translate::{self, AgentSignal};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use convai_realtime::{
    AgentStream,
    protocol::{ClientEvent, ControlEvent},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

type TelephonySink = SplitSink<WebSocket, Message>;
type AgentSink = SplitSink<AgentStream, WsMessage>;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Initializing,
    Active,
    Terminating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Peer {
    Telephony,
    Agent,
}

/// Why a peer stopped: a close frame (or end of stream), or a socket error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Closed,
    Errored,
}

/// The lifecycle-coupling policy: which terminal events on one peer tear
/// down the other. A close always propagates; an error only when
/// configured.
#[derive(Debug, Clone, Copy)]
struct CouplingPolicy {
    propagate_errors: bool,
}

impl CouplingPolicy {
    fn propagates(&self, reason: EndReason) -> bool {
        match reason {
            EndReason::Closed => true,
            EndReason::Errored => self.propagate_errors,
        }
    }
}

/// Explicit session lifecycle, owned by one bridge task and consulted
/// before every send. Each peer also carries a writability flag: once a
/// socket has closed or errored, nothing more is sent on it.
#[derive(Debug)]
struct SessionLifecycle {
    state: SessionState,
    telephony_open: bool,
    agent_open: bool,
    policy: CouplingPolicy,
}

impl SessionLifecycle {
    fn new(policy: CouplingPolicy) -> Self {
        Self {
            state: SessionState::Initializing,
            telephony_open: true,
            agent_open: false,
            policy,
        }
    }

    /// The agent handshake went out; the relay loop may start.
    fn agent_connected(&mut self) {
        self.agent_open = true;
        self.state = SessionState::Active;
    }

    /// Folds a peer's terminal event into the session state. The coupling
    /// policy decides whether the other peer comes down with it.
    fn peer_ended(&mut self, peer: Peer, reason: EndReason) {
        match peer {
            Peer::Telephony => self.telephony_open = false,
            Peer::Agent => self.agent_open = false,
        }
        if self.policy.propagates(reason) && self.state != SessionState::Terminated {
            self.state = SessionState::Terminating;
        }
    }

    fn peer_open(&self, peer: Peer) -> bool {
        match peer {
            Peer::Telephony => self.telephony_open,
            Peer::Agent => self.agent_open,
        }
    }

    fn may_send(&self, peer: Peer) -> bool {
        self.state == SessionState::Active && self.peer_open(peer)
    }

    fn is_terminating(&self) -> bool {
        self.state == SessionState::Terminating
    }

    /// Both sockets are confirmed closed.
    fn finished(&mut self) {
        self.telephony_open = false;
        self.agent_open = false;
        self.state = SessionState::Terminated;
    }
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for one telephony connection.
///
/// Validates that the agent credentials are configured, dials the agent,
/// and hands both sockets to the relay loop. A missing credential pair
/// closes the telephony socket before anything is sent on it, and no agent
/// socket is ever opened.
#[instrument(name = "bridge_session", skip_all, fields(session_id))]
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("Telephony peer connected.");

    let Some(credentials) = state.config.agent_credentials() else {
        error!("Agent credentials missing; closing telephony socket.");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let agent = match convai_realtime::connect(
        &state.config.convai_url,
        credentials.agent_id,
        credentials.api_key,
    )
    .await
    {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = ?e, "Agent connection failed; closing telephony socket.");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let policy = CouplingPolicy {
        propagate_errors: state.config.propagate_peer_errors,
    };
    run_bridge(socket, agent, policy).await;
    info!("Bridge session finished.");
}

/// The steady-state relay loop.
///
/// Within one direction, frames go out in the order they came in: every
/// send is awaited inline before the next frame is read.
async fn run_bridge(socket: WebSocket, agent: AgentStream, policy: CouplingPolicy) {
    let mut lifecycle = SessionLifecycle::new(policy);
    lifecycle.agent_connected();

    let (mut telephony_tx, mut telephony_rx) = socket.split();
    let (mut agent_tx, mut agent_rx) = agent.split();

    loop {
        tokio::select! {
            msg = telephony_rx.next(), if lifecycle.peer_open(Peer::Telephony) => match msg {
                Some(Ok(Message::Binary(frame))) => {
                    let event = translate::wrap_telephony_frame(&frame);
                    send_agent_event(&mut lifecycle, &mut agent_tx, &event).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Telephony peer disconnected.");
                    lifecycle.peer_ended(Peer::Telephony, EndReason::Closed);
                }
                // Text and control frames carry no caller audio.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Telephony socket error.");
                    lifecycle.peer_ended(Peer::Telephony, EndReason::Errored);
                }
            },
            msg = agent_rx.next(), if lifecycle.peer_open(Peer::Agent) => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_agent_message(&mut lifecycle, &mut telephony_tx, &mut agent_tx, &text)
                        .await;
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Agent peer disconnected.");
                    lifecycle.peer_ended(Peer::Agent, EndReason::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Agent socket error.");
                    lifecycle.peer_ended(Peer::Agent, EndReason::Errored);
                }
            },
            else => break,
        }
        if lifecycle.is_terminating() {
            break;
        }
    }

    if lifecycle.peer_open(Peer::Telephony) {
        let _ = telephony_tx.close().await;
    }
    if lifecycle.peer_open(Peer::Agent) {
        let _ = agent_tx.close().await;
    }
    lifecycle.finished();
    debug!("Both sockets closed.");
}

/// Applies the translation table to one structured message from the agent.
async fn handle_agent_message(
    lifecycle: &mut SessionLifecycle,
    telephony_tx: &mut TelephonySink,
    agent_tx: &mut AgentSink,
    raw: &str,
) {
    match translate::classify_agent_message(raw) {
        Ok(AgentSignal::Pong { event_id }) => {
            let pong = ClientEvent::Control(ControlEvent::Pong { event_id });
            send_agent_event(lifecycle, agent_tx, &pong).await;
        }
        Ok(AgentSignal::Audio(audio)) => {
            send_telephony_audio(lifecycle, telephony_tx, audio).await;
        }
        Ok(AgentSignal::Observe(value)) => {
            info!(message = %value, "Agent message observed.");
        }
        Err(e) => {
            warn!(error = %e, "Dropping untranslatable agent message.");
        }
    }
}

async fn send_agent_event(
    lifecycle: &mut SessionLifecycle,
    agent_tx: &mut AgentSink,
    event: &ClientEvent,
) {
    if !lifecycle.may_send(Peer::Agent) {
        debug!("Agent socket not writable; dropping event.");
        return;
    }
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Failed to encode agent event; dropping.");
            return;
        }
    };
    if let Err(e) = agent_tx.send(WsMessage::Text(payload.into())).await {
        warn!(error = %e, "Agent socket send failed.");
        lifecycle.peer_ended(Peer::Agent, EndReason::Errored);
    }
}

async fn send_telephony_audio(
    lifecycle: &mut SessionLifecycle,
    telephony_tx: &mut TelephonySink,
    audio: Vec<u8>,
) {
    if !lifecycle.may_send(Peer::Telephony) {
        debug!(bytes = audio.len(), "Telephony socket not writable; dropping agent audio.");
        return;
    }
    if let Err(e) = telephony_tx.send(Message::Binary(audio.into())).await {
        warn!(error = %e, "Telephony socket send failed.");
        lifecycle.peer_ended(Peer::Telephony, EndReason::Errored);
    }
}
