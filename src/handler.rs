//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, explicit
//! envelope parsing, and bidirectional communication with the
//! RelayServer actor. Parse rejections are answered directly to the
//! originating client; they are never broadcast.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::envelope::Envelope;
use crate::error::{Reject, RelayError};
use crate::server::ServerCommand;
use crate::types::ClientId;

/// Outbound frame queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers with the RelayServer, and
/// runs the read/write task pair until either side ends. The disconnect
/// command is sent exactly once on the way out, from any state.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), RelayError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = ClientId::new();
    info!("Connection {} accepted from {}", client_id, peer_addr);

    // Channel for server -> client frames (already serialized)
    let (msg_tx, mut msg_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    // Register with the RelayServer; no announcement happens until the
    // client completes SET_NAME.
    if cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            sender: msg_tx.clone(),
        })
        .await
        .is_err()
    {
        error!("Failed to register connection {} - server closed", client_id);
        return Err(RelayError::ChannelSend);
    }

    // Clones for the read task
    let cmd_tx_read = cmd_tx.clone();
    let reply_tx = msg_tx;

    // Read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    // Blank payloads never reach the parser
                    if text.trim().is_empty() {
                        warn!("Blank payload from {}", client_id);
                        send_reject(&reply_tx, Reject::InvalidMessage);
                        continue;
                    }

                    match Envelope::parse(&text) {
                        Ok(envelope) => {
                            let cmd = ServerCommand::Envelope {
                                client_id,
                                envelope,
                            };
                            if cmd_tx_read.send(cmd).await.is_err() {
                                debug!("Server closed, ending read task for {}", client_id);
                                break;
                            }
                        }
                        Err(reject) => {
                            warn!("Rejected payload from {}: {}", client_id, reject);
                            send_reject(&reply_tx, reject);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong is handled automatically by tungstenite
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    // Transport fault: log it and fall through to the
                    // close path below.
                    error!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Write task (serialized frames -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(frame) = msg_rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                debug!("WebSocket send failed, ending write task");
                break;
            }
        }
        debug!("Write task ended for {}", client_id);

        // Send close frame when done; closing twice is harmless
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", client_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", client_id);
        }
    }

    // Close path: registry cleanup and departure announcement (if named)
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;

    info!("Connection {} closed", client_id);

    Ok(())
}

/// Queue an ERROR envelope for the originating client only
fn send_reject(reply_tx: &mpsc::Sender<String>, reject: Reject) {
    match serde_json::to_string(&reject.to_envelope()) {
        Ok(frame) => {
            if reply_tx.try_send(frame).is_err() {
                debug!("Could not queue error reply; connection going away");
            }
        }
        Err(e) => error!("Failed to serialize error reply: {}", e),
    }
}
