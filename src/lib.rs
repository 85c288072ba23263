//! LAN Chat Relay Library
//!
//! A chat relay server built with tokio-tungstenite using the Actor
//! pattern for state management, plus a UDP discovery responder so
//! clients can find the server on the local network without
//! configuration.
//!
//! # Features
//! - WebSocket connection handling
//! - Name registration with roster announcements
//! - Full-fanout message broadcasting with partial-failure isolation
//! - Rename and disconnect notifications
//! - UDP probe/response server discovery
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RelayServer` is the central actor owning the session registry and
//!   the broadcast engine
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//! - The discovery responder runs independently; its failure never
//!   touches the chat path
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_relay::{handle_connection, RelayServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("0.0.0.0:8025").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(RelayServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod locator;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;
pub mod ui;

// Re-export main types for convenience
pub use broadcast::BroadcastEngine;
pub use config::ServerArgs;
pub use discovery::{DiscoveryResponder, DISCOVERY_PREFIX, DISCOVERY_PROBE};
pub use envelope::{Envelope, IncomingEnvelope, Kind, MAX_CONTENT_LEN};
pub use error::{Reject, RelayError, SendError};
pub use handler::handle_connection;
pub use locator::locate_server;
pub use registry::SessionRegistry;
pub use server::{RelayServer, ServerCommand};
pub use session::Session;
pub use types::ClientId;
pub use ui::Presenter;
