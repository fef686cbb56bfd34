//! Outbound connection to the conversation endpoint.

use crate::protocol::{AudioFormat, ClientEvent, ControlEvent};
use anyhow::{Context, Result};
use futures_util::SinkExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, handshake::client::Request, protocol::Message},
};
use tracing::info;

/// Production conversation endpoint. The `agent_id` query parameter is
/// appended by [`connect`].
pub const DEFAULT_ENDPOINT: &str = "wss://api.elevenlabs.io/v1/convai/conversation";

/// A connected agent socket.
pub type AgentStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn build_request(endpoint: &str, agent_id: &str, api_key: &SecretString) -> Result<Request> {
    let mut request = format!("{endpoint}?agent_id={agent_id}").into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", api_key.expose_secret()).parse()?,
    );
    Ok(request)
}

/// Opens an authenticated socket to the conversation endpoint and performs
/// the initiation handshake.
///
/// The two setup events go out in a fixed order: initiation first, then the
/// output audio format. The service only honors a format declaration that
/// directly follows the initiation event; otherwise it falls back to its
/// default encoding.
///
/// Connection and handshake failures surface as errors to the caller; this
/// function does not retry.
pub async fn connect(
    endpoint: &str,
    agent_id: &str,
    api_key: &SecretString,
) -> Result<AgentStream> {
    let request = build_request(endpoint, agent_id, api_key)?;
    let (mut stream, _) = connect_async(request)
        .await
        .context("Failed to connect to the conversation endpoint")?;
    info!(agent_id, "Connected to the conversation endpoint.");

    send_event(
        &mut stream,
        &ClientEvent::Control(ControlEvent::ConversationInitiationClientData),
    )
    .await?;
    send_event(
        &mut stream,
        &ClientEvent::Control(ControlEvent::AgentOutputAudioFormat {
            audio_format: AudioFormat::mulaw_8khz(),
        }),
    )
    .await?;
    info!("Requested mu-law 8000 Hz agent output audio.");

    Ok(stream)
}

async fn send_event(stream: &mut AgentStream, event: &ClientEvent) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    stream.send(Message::Text(payload.into())).await?;
    Ok(())
}
