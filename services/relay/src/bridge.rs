//! Bridges a realtime websocket connection to the event interpreter.
//!
//! Inbound text frames go to [`EventInterpreter::handle_text`]; outbound events
//! produced by tool calls arrive on a channel and are written back to the socket.
//! When a handoff changes the acting agent, the remote session is reconfigured
//! with the new agent's instructions and tools.

use crate::config::Config;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use switchboard_core::{ClientEvent, EventInterpreter};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{error, info, warn};

/// Serializes an outbound event into a websocket text frame.
pub fn encode(event: &ClientEvent) -> Result<WsMessage> {
    Ok(WsMessage::Text(serde_json::to_string(event)?.into()))
}

/// Runs one realtime session until either side closes the connection.
///
/// `outbound_rx` must be the receiving half of the channel the interpreter's
/// sink writes to.
pub async fn run(
    config: &Config,
    interpreter: Arc<EventInterpreter>,
    mut outbound_rx: mpsc::Receiver<ClientEvent>,
) -> Result<()> {
    let session = interpreter.session().clone();
    let api_key = config.require_api_key()?;

    let mut request = config.connect_url().into_client_request()?;
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {}", api_key).parse()?);
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse()?);

    session.mark_connecting();
    let (ws_stream, _) = connect_async(request)
        .await
        .context("Failed to connect to the realtime websocket")?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    info!(url = %config.realtime_url, "Connected to realtime API.");

    // Configure the remote session for the starting agent.
    let mut agent_rx = session.subscribe_agent();
    if let Some(update) = session.session_update() {
        ws_tx.send(encode(&update)?).await?;
    }

    let result: Result<()> = async {
        loop {
            tokio::select! {
                // Tool call answers produced by the coordinator.
                Some(event) = outbound_rx.recv() => {
                    ws_tx.send(encode(&event)?).await?;
                },
                // A handoff switched agents: push the new instructions and tools.
                Ok(()) = agent_rx.changed() => {
                    let agent = agent_rx.borrow_and_update().clone();
                    info!(%agent, "Reconfiguring realtime session for new agent");
                    if let Some(update) = session.session_update() {
                        ws_tx.send(encode(&update)?).await?;
                    }
                },
                // Server events.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => interpreter.handle_text(&text).await,
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(?frame, "Realtime API closed the connection.");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = ?e, "Error receiving from realtime websocket");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Realtime websocket stream ended.");
                            break;
                        }
                    }
                },
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    session.teardown();
    result
}
