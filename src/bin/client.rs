//! Minimal terminal chat client
//!
//! Locates the server (explicit URL, then UDP discovery, then default),
//! registers a display name, relays stdin lines as chat messages, and
//! prints incoming traffic through the `Presenter` seam.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::config::DEFAULT_DISCOVERY_PORT;
use chat_relay::envelope::{clip_content, MAX_CONTENT_LEN};
use chat_relay::ui::present_envelope;
use chat_relay::{locate_server, Envelope, Kind, Presenter};

/// LAN chat terminal client
#[derive(Debug, Parser)]
#[command(name = "chat-relay-client", version, about)]
struct ClientArgs {
    /// Display name to register
    #[arg(long)]
    name: String,

    /// Server WebSocket URL; skips discovery when set
    #[arg(long, env = "CHAT_SERVER_URL")]
    url: Option<String>,

    /// UDP port to send discovery probes to
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,
}

/// Plain line-oriented presenter
#[derive(Debug, Default)]
struct TerminalUi;

impl Presenter for TerminalUi {
    fn append_message(&mut self, user: &str, time: &str, content: &str) {
        println!("[{}] {}: {}", time, user, content);
    }

    fn append_system_message(&mut self, text: &str) {
        println!("* {}", text);
    }

    fn update_user_list(&mut self, names: &[String]) {
        println!("* online: {}", names.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=warn")),
        )
        .init();

    let args = ClientArgs::parse();
    let url = locate_server(args.url.as_deref(), args.discovery_port).await;

    let mut ui = TerminalUi;
    ui.append_system_message(&format!("Connecting to {}", url));

    let (ws_stream, _) = connect_async(&url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Register the display name before anything else
    let set_name = Envelope::new(args.name.clone(), "", Kind::SetName);
    ws_sender
        .send(Message::Text(serde_json::to_string(&set_name)?.into()))
        .await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(envelope) => present_envelope(&mut ui, &envelope),
                            Err(e) => warn!("Unreadable envelope from server: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        ui.append_system_message("Disconnected from server");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong/binary - nothing to show
                    }
                    Some(Err(e)) => {
                        ui.append_system_message(&format!("Connection error: {}", e));
                        break;
                    }
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed, leaving");
                    break;
                };
                if line.trim().is_empty() {
                    ui.append_system_message("Error: empty message");
                    continue;
                }

                // Client-side truncation is flagged to the user
                let mut content = line;
                if content.chars().count() > MAX_CONTENT_LEN {
                    content = clip_content(content);
                    ui.append_system_message(&format!(
                        "Warning: message truncated to {} characters",
                        MAX_CONTENT_LEN
                    ));
                }

                let envelope = Envelope::new(args.name.clone(), content, Kind::Message);
                ws_sender
                    .send(Message::Text(serde_json::to_string(&envelope)?.into()))
                    .await?;
            }
        }
    }

    let _ = ws_sender.close().await;
    Ok(())
}
