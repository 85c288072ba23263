//! Process configuration
//!
//! Command-line arguments for the relay server. Defaults match the
//! well-known ports clients expect: 8025 for chat, 9090 for discovery.

use clap::Parser;

/// Default chat (WebSocket) port
pub const DEFAULT_CHAT_PORT: u16 = 8025;

/// Default UDP discovery port
pub const DEFAULT_DISCOVERY_PORT: u16 = 9090;

/// LAN chat relay server
#[derive(Debug, Parser)]
#[command(name = "chat-relay-server", version, about)]
pub struct ServerArgs {
    /// Bind host for the chat endpoint
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port for the chat endpoint
    #[arg(long, default_value_t = DEFAULT_CHAT_PORT)]
    pub port: u16,

    /// UDP port the discovery responder listens on
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    pub discovery_port: u16,

    /// Host to advertise in discovery replies (defaults to the detected
    /// LAN address when binding all interfaces)
    #[arg(long)]
    pub advertise_host: Option<String>,
}
