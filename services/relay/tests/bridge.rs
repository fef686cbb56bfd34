//! End-to-end bridge tests.
//!
//! Each test wires up the real relay (on an ephemeral port) between a stub
//! telephony client and a stub agent WebSocket server, then drives frames
//! through it in both directions.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use callbridge_relay::{config::Config, router::create_router, state::AppState};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async, connect_async, tungstenite::Message};
use tracing::Level;

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerWs = WebSocketStream<TcpStream>;

fn test_config(convai_url: String, with_credentials: bool) -> Config {
    Config {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        port_retry_limit: 1,
        agent_id: with_credentials.then(|| "test-agent".to_string()),
        api_key: with_credentials.then(|| SecretString::from("test-key".to_string())),
        convai_url,
        propagate_peer_errors: false,
        log_level: Level::INFO,
    }
}

async fn spawn_relay(config: Config) -> SocketAddr {
    let state = Arc::new(AppState {
        config: Arc::new(config),
    });
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a relay message")
            .expect("relay closed the agent socket early")
            .expect("agent socket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame from relay: {other:?}"),
        }
    }
}

/// The relay must open every conversation with the initiation event
/// followed directly by the mu-law 8000 Hz format declaration.
async fn expect_handshake(ws: &mut ServerWs) {
    assert_eq!(
        recv_json(ws).await,
        json!({"type": "conversation_initiation_client_data"})
    );
    assert_eq!(
        recv_json(ws).await,
        json!({
            "type": "agent_output_audio_format",
            "audio_format": {"encoding": "mulaw", "sample_rate": 8000}
        })
    );
}

#[tokio::test]
async fn telephony_audio_reaches_the_agent_as_user_chunks() {
    let agent_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent_listener.local_addr().unwrap();
    let agent_task = tokio::spawn(async move {
        let (stream, _) = agent_listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;
        recv_json(&mut ws).await
    });

    let relay_addr = spawn_relay(test_config(format!("ws://{agent_addr}/convai"), true)).await;
    let (mut client, _) = connect_async(format!("ws://{relay_addr}/ws")).await.unwrap();

    // One 20 ms frame of 8 kHz mu-law.
    let frame: Vec<u8> = (0..160u32).map(|i| (i * 7 % 256) as u8).collect();
    client
        .send(Message::Binary(frame.clone().into()))
        .await
        .unwrap();

    let chunk = timeout(TIMEOUT, agent_task).await.unwrap().unwrap();
    let encoded = chunk["user_audio_chunk"].as_str().expect("untagged chunk");
    assert_eq!(BASE64.decode(encoded).unwrap(), frame);
}

#[tokio::test]
async fn agent_pings_are_answered_and_audio_is_unwrapped() {
    const AGENT_AUDIO: &[u8] = &[0x7f, 0x00, 0xff, 0x10, 0x20, 0x30];

    let agent_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent_listener.local_addr().unwrap();
    let agent_task = tokio::spawn(async move {
        let (stream, _) = agent_listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;

        ws.send(Message::Text(r#"{"type":"ping","event_id":42}"#.into()))
            .await
            .unwrap();
        let pong = recv_json(&mut ws).await;

        ws.send(Message::Text(
            json!({"audio": BASE64.encode(AGENT_AUDIO)}).to_string().into(),
        ))
        .await
        .unwrap();
        pong
    });

    let relay_addr = spawn_relay(test_config(format!("ws://{agent_addr}/convai"), true)).await;
    let (mut client, _) = connect_async(format!("ws://{relay_addr}/ws")).await.unwrap();

    let pong = timeout(TIMEOUT, agent_task).await.unwrap().unwrap();
    assert_eq!(pong, json!({"type": "pong", "event_id": 42}));

    // The ping itself never reaches telephony: the first frame the caller
    // sees is the decoded agent audio.
    let msg = timeout(TIMEOUT, client.next())
        .await
        .expect("timed out waiting for agent audio")
        .expect("telephony socket closed early")
        .unwrap();
    match msg {
        Message::Binary(bytes) => assert_eq!(bytes.as_ref(), AGENT_AUDIO),
        other => panic!("expected binary audio, got {other:?}"),
    }
}

#[tokio::test]
async fn agent_close_tears_down_the_telephony_socket() {
    let agent_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent_listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = agent_listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;
        ws.close(None).await.unwrap();
    });

    let relay_addr = spawn_relay(test_config(format!("ws://{agent_addr}/convai"), true)).await;
    let (mut client, _) = connect_async(format!("ws://{relay_addr}/ws")).await.unwrap();

    let msg = timeout(TIMEOUT, client.next())
        .await
        .expect("timed out waiting for the cascade close");
    match msg {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected the telephony socket to close, got {other:?}"),
    }
}

#[tokio::test]
async fn telephony_close_tears_down_the_agent_socket() {
    let agent_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent_listener.local_addr().unwrap();
    let agent_task = tokio::spawn(async move {
        let (stream, _) = agent_listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("agent socket error instead of close: {e}"),
            }
        }
    });

    let relay_addr = spawn_relay(test_config(format!("ws://{agent_addr}/convai"), true)).await;
    let (mut client, _) = connect_async(format!("ws://{relay_addr}/ws")).await.unwrap();

    // Give the relay a moment to finish the agent handshake, then hang up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close(None).await.unwrap();

    timeout(TIMEOUT, agent_task)
        .await
        .expect("timed out waiting for the cascade close")
        .unwrap();
}

#[tokio::test]
async fn missing_credentials_reject_the_call_without_dialing_the_agent() {
    let agent_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent_listener.local_addr().unwrap();
    let dialed = Arc::new(AtomicBool::new(false));
    let dialed_flag = dialed.clone();
    tokio::spawn(async move {
        if agent_listener.accept().await.is_ok() {
            dialed_flag.store(true, Ordering::SeqCst);
        }
    });

    let relay_addr = spawn_relay(test_config(format!("ws://{agent_addr}/convai"), false)).await;
    let (mut client, _) = connect_async(format!("ws://{relay_addr}/ws")).await.unwrap();

    // The socket closes with no message ever sent on it.
    let msg = timeout(TIMEOUT, client.next())
        .await
        .expect("timed out waiting for the rejection");
    match msg {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected an immediate close with no message, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!dialed.load(Ordering::SeqCst), "agent must never be dialed");
}
