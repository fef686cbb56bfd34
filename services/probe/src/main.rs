//! Manual test client for the relay.
//!
//! Connects to the relay's WebSocket endpoint the way a telephony media
//! stream would: streams a raw mu-law audio file as paced binary frames and
//! appends whatever audio comes back to an output file. Text messages are
//! logged as-is. This is an operator tool, not part of the relay itself.

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "probe", about = "Stream a mu-law audio file through the relay")]
struct Args {
    /// WebSocket endpoint of the relay.
    #[arg(long, default_value = "ws://localhost:3020/ws")]
    url: String,

    /// Raw mu-law 8000 Hz audio file to stream.
    #[arg(long, default_value = "test_audio.ulaw")]
    audio: PathBuf,

    /// File that received agent audio is appended to.
    #[arg(long, default_value = "output_response.ulaw")]
    output: PathBuf,

    /// Bytes per binary frame. 160 bytes is 20 ms of 8 kHz mu-law.
    #[arg(long, default_value_t = 160)]
    frame_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    let args = Args::parse();

    let audio = tokio::fs::read(&args.audio)
        .await
        .with_context(|| format!("Failed to read {}", args.audio.display()))?;
    info!(url = %args.url, bytes = audio.len(), "Connecting to relay...");

    let (stream, _) = connect_async(args.url.as_str())
        .await
        .context("Failed to connect to the relay")?;
    info!("Connected.");
    let (mut tx, mut rx) = stream.split();

    let output = args.output.clone();
    let reader = tokio::spawn(async move {
        let mut out = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&output)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Failed to open {}", output.display());
                return;
            }
        };
        while let Some(msg) = rx.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    info!(bytes = data.len(), "Received agent audio.");
                    if let Err(e) = out.write_all(&data).await {
                        warn!(error = %e, "Failed to append agent audio.");
                        return;
                    }
                }
                Ok(Message::Text(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(json) => info!(message = %json, "Received JSON message."),
                    Err(_) => info!(message = %text, "Received text message."),
                },
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Relay closed the connection.");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Socket error.");
                    return;
                }
            }
        }
    });

    // Pace frames at real time: frame_bytes of 8 kHz mu-law is
    // frame_bytes / 8 milliseconds of audio.
    let frame_interval = Duration::from_millis((args.frame_bytes as u64) / 8);
    for chunk in audio.chunks(args.frame_bytes.max(1)) {
        tx.send(Message::Binary(chunk.to_vec().into())).await?;
        tokio::time::sleep(frame_interval).await;
    }
    info!("Finished streaming. Waiting for agent audio (Ctrl+C to stop)...");

    tokio::select! {
        _ = reader => info!("Connection finished."),
        _ = tokio::signal::ctrl_c() => info!("Interrupted."),
    }
    Ok(())
}
