//! RelayServer actor: protocol handling and state ownership
//!
//! The central actor owning the session registry and broadcast engine.
//! Connection handlers talk to it through `ServerCommand`s over an mpsc
//! channel; all shared state lives behind this actor, so no locks are
//! needed.
//!
//! Per-connection protocol states: Open (registered, unnamed) → Named →
//! Closed. The state is carried by the registry entry itself: an entry
//! with no name is Open, an entry with a name is Named, a removed entry
//! is Closed.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcast::BroadcastEngine;
use crate::envelope::{clip_content, Envelope, IncomingEnvelope, Kind};
use crate::error::Reject;
use crate::registry::SessionRegistry;
use crate::types::ClientId;

/// Commands sent from connection handlers to the RelayServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection opened
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<String>,
    },
    /// A parsed envelope arrived from a connection
    Envelope {
        client_id: ClientId,
        envelope: IncomingEnvelope,
    },
    /// Connection closed (clean close or transport error)
    Disconnect { client_id: ClientId },
    /// Close every connection and stop the actor
    Shutdown,
}

/// The relay server actor
///
/// Processes commands from connection handlers in arrival order, which
/// gives broadcasts issued by one logical sequence a stable causal order.
pub struct RelayServer {
    registry: SessionRegistry,
    engine: BroadcastEngine,
    receiver: mpsc::Receiver<ServerCommand>,
}

impl RelayServer {
    /// Create a new server with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            engine: BroadcastEngine::new(),
            receiver,
        }
    }

    /// Run the server event loop
    ///
    /// Processes commands until `Shutdown` arrives or all senders drop.
    pub async fn run(mut self) {
        info!("RelayServer started");

        while let Some(cmd) = self.receiver.recv().await {
            if matches!(cmd, ServerCommand::Shutdown) {
                break;
            }
            self.handle_command(cmd);
        }

        self.shutdown();
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::Envelope {
                client_id,
                envelope,
            } => {
                self.handle_envelope(client_id, envelope);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Shutdown => self.shutdown(),
        }
    }

    /// Handle a newly opened connection
    ///
    /// Registers the entry unnamed; nothing is broadcast until SET_NAME
    /// completes, so other clients never see a placeholder identity.
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<String>) {
        info!("Connection {} opened", client_id);
        self.registry.register(client_id, sender);
        debug!("Registered connections: {}", self.registry.len());
    }

    /// Handle a connection close from any state
    ///
    /// Only connections that completed SET_NAME get a departure
    /// broadcast; an unnamed disconnect has nothing to announce.
    fn handle_disconnect(&mut self, client_id: ClientId) {
        match self.registry.remove(client_id) {
            Some(name) => {
                info!("User '{}' disconnected ({})", name, client_id);
                self.engine.broadcast(
                    &self.registry,
                    &Envelope::new(name, "has disconnected", Kind::Disconnect),
                );
            }
            None => {
                info!("Connection {} closed before registering a name", client_id);
            }
        }
        debug!("Registered connections: {}", self.registry.len());
    }

    /// Dispatch a parsed envelope through the state machine
    fn handle_envelope(&mut self, client_id: ClientId, envelope: IncomingEnvelope) {
        // Connection may have raced a disconnect
        if self.registry.get(client_id).is_none() {
            debug!("Envelope from unknown connection {}", client_id);
            return;
        }

        match envelope.kind {
            Kind::SetName => self.handle_set_name(client_id, envelope),
            _ if !self.registry.is_named(client_id) => {
                // Premature content from an Open connection is rejected so
                // no chat is ever attributed to an unnamed identity.
                warn!("Connection {} sent {:?} before SET_NAME", client_id, envelope.kind);
                self.reply_reject(client_id, Reject::NameRequired);
            }
            _ => self.handle_chat(client_id, envelope),
        }
    }

    /// Handle SET_NAME: first registration or rename
    ///
    /// Announces the updated roster and a CONNECT for the (new) name; a
    /// rename additionally gets an "is now" notice. Errors go back to the
    /// originator only.
    fn handle_set_name(&mut self, client_id: ClientId, envelope: IncomingEnvelope) {
        let name = envelope.sender.as_deref().unwrap_or("").trim().to_string();

        let previous = match self.registry.set_name(client_id, &name) {
            Ok(previous) => previous,
            Err(reject) => {
                warn!("Connection {} sent an invalid name", client_id);
                self.reply_reject(client_id, reject);
                return;
            }
        };

        info!("User '{}' registered ({})", name, client_id);

        let roster = format!("Connected users: {}", self.registry.snapshot_names().join(", "));
        self.engine
            .broadcast(&self.registry, &Envelope::system(roster, Kind::Info));
        self.engine.broadcast(
            &self.registry,
            &Envelope::new(name.clone(), "has connected", Kind::Connect),
        );

        if let Some(previous) = previous {
            if previous != name {
                self.engine.broadcast(
                    &self.registry,
                    &Envelope::system(format!("{} is now {}", previous, name), Kind::Info),
                );
            }
        }
    }

    /// Handle chat content from a Named connection
    ///
    /// Validates field presence and non-blank content, clips to the
    /// 500-character cap, then broadcasts as MESSAGE attributed to the
    /// registered name.
    fn handle_chat(&mut self, client_id: ClientId, envelope: IncomingEnvelope) {
        let (Some(_claimed), Some(content)) = (envelope.sender, envelope.content) else {
            self.reply_reject(client_id, Reject::InvalidFormat);
            return;
        };

        if content.trim().is_empty() {
            self.reply_reject(client_id, Reject::InvalidMessage);
            return;
        }

        // The registry is authoritative for attribution
        let Some(name) = self.registry.get(client_id).and_then(|s| s.name.clone()) else {
            self.reply_reject(client_id, Reject::NameRequired);
            return;
        };

        let content = clip_content(content);
        self.engine
            .broadcast(&self.registry, &Envelope::new(name, content, Kind::Message));
    }

    /// Send an ERROR envelope to the originating client only
    fn reply_reject(&self, client_id: ClientId, reject: Reject) {
        let Some(session) = self.registry.get(client_id) else {
            return;
        };
        match serde_json::to_string(&reject.to_envelope()) {
            Ok(frame) => {
                if let Err(e) = session.send(frame) {
                    warn!("Error reply to {} failed: {}", client_id, e);
                }
            }
            Err(e) => warn!("Failed to serialize error reply: {}", e),
        }
    }

    /// Close every connection and clear the registry
    ///
    /// Dropping the outbound senders ends each write task, which sends
    /// the close frame; double closes downstream are harmless.
    fn shutdown(&mut self) {
        info!(
            "RelayServer shutting down, closing {} connections",
            self.registry.len()
        );
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::MAX_CONTENT_LEN;
    use tokio::sync::mpsc::Receiver;

    fn test_server() -> RelayServer {
        let (_tx, rx) = mpsc::channel(8);
        RelayServer::new(rx)
    }

    fn connect(server: &mut RelayServer) -> (ClientId, Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(64);
        server.handle_command(ServerCommand::Connect {
            client_id: id,
            sender: tx,
        });
        (id, rx)
    }

    fn incoming(sender: &str, content: &str, kind: Kind) -> IncomingEnvelope {
        IncomingEnvelope {
            sender: Some(sender.to_string()),
            content: Some(content.to_string()),
            kind,
        }
    }

    fn set_name(server: &mut RelayServer, id: ClientId, name: &str) {
        server.handle_command(ServerCommand::Envelope {
            client_id: id,
            envelope: incoming(name, "", Kind::SetName),
        });
    }

    fn next_envelope(rx: &mut Receiver<String>) -> Envelope {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).expect("frame is a valid envelope")
    }

    fn assert_no_frames(rx: &mut Receiver<String>) {
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_open_connection_gets_no_broadcast() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        // Drain alice's own join announcements
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        // A second connection opens but never registers: silence
        let (_b, mut rx_b) = connect(&mut server);
        assert_no_frames(&mut rx_a);
        assert_no_frames(&mut rx_b);
    }

    #[test]
    fn test_join_sequence_roster_then_connect() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        let (b, mut rx_b) = connect(&mut server);

        set_name(&mut server, a, "alice");
        let roster = next_envelope(&mut rx_a);
        assert_eq!(roster.kind, Kind::Info);
        assert_eq!(roster.content, "Connected users: alice");
        let joined = next_envelope(&mut rx_a);
        assert_eq!(joined.kind, Kind::Connect);
        assert_eq!(joined.sender, "alice");
        assert_eq!(joined.content, "has connected");

        // The unnamed connection B also receives the fan-out
        assert_eq!(next_envelope(&mut rx_b).content, "Connected users: alice");
        assert_eq!(next_envelope(&mut rx_b).sender, "alice");

        set_name(&mut server, b, "bob");
        assert_eq!(
            next_envelope(&mut rx_a).content,
            "Connected users: alice, bob"
        );
        assert_eq!(next_envelope(&mut rx_a).sender, "bob");

        // Chat goes to everyone with the registered name as sender
        server.handle_command(ServerCommand::Envelope {
            client_id: a,
            envelope: incoming("alice", "hi", Kind::Message),
        });
        next_envelope(&mut rx_b);
        next_envelope(&mut rx_b);
        let msg_a = next_envelope(&mut rx_a);
        let msg_b = next_envelope(&mut rx_b);
        for msg in [msg_a, msg_b] {
            assert_eq!(msg.kind, Kind::Message);
            assert_eq!(msg.sender, "alice");
            assert_eq!(msg.content, "hi");
        }
    }

    #[test]
    fn test_message_before_set_name_rejected_privately() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        let (b, mut rx_b) = connect(&mut server);
        server.handle_command(ServerCommand::Envelope {
            client_id: b,
            envelope: incoming("eve", "premature", Kind::Message),
        });

        let reply = next_envelope(&mut rx_b);
        assert_eq!(reply.kind, Kind::Error);
        // Nothing reached the named user
        assert_no_frames(&mut rx_a);
    }

    #[test]
    fn test_blank_name_rejected_privately() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "   ");

        let reply = next_envelope(&mut rx_a);
        assert_eq!(reply.kind, Kind::Error);
        assert_eq!(reply.content, "Invalid name");
        assert!(server.registry.snapshot_names().is_empty());
    }

    #[test]
    fn test_blank_message_rejected() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        server.handle_command(ServerCommand::Envelope {
            client_id: a,
            envelope: incoming("alice", "   ", Kind::Message),
        });
        let reply = next_envelope(&mut rx_a);
        assert_eq!(reply.kind, Kind::Error);
        assert_eq!(reply.content, "Invalid message");
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        server.handle_command(ServerCommand::Envelope {
            client_id: a,
            envelope: IncomingEnvelope {
                sender: None,
                content: Some("text".to_string()),
                kind: Kind::Message,
            },
        });
        let reply = next_envelope(&mut rx_a);
        assert_eq!(reply.kind, Kind::Error);
        assert_eq!(reply.content, "Invalid message format");
    }

    #[test]
    fn test_long_message_clipped() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        let long = "x".repeat(MAX_CONTENT_LEN + 1);
        server.handle_command(ServerCommand::Envelope {
            client_id: a,
            envelope: incoming("alice", &long, Kind::Message),
        });
        let msg = next_envelope(&mut rx_a);
        assert_eq!(msg.kind, Kind::Message);
        assert_eq!(msg.content.chars().count(), MAX_CONTENT_LEN);
    }

    #[test]
    fn test_rename_announces_roster_connect_and_notice() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        set_name(&mut server, a, "alicia");
        assert_eq!(next_envelope(&mut rx_a).content, "Connected users: alicia");
        let joined = next_envelope(&mut rx_a);
        assert_eq!(joined.kind, Kind::Connect);
        assert_eq!(joined.sender, "alicia");
        let notice = next_envelope(&mut rx_a);
        assert_eq!(notice.kind, Kind::Info);
        assert_eq!(notice.content, "alice is now alicia");
    }

    #[test]
    fn test_rename_to_same_name_skips_notice() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);
        assert_no_frames(&mut rx_a);
    }

    #[test]
    fn test_named_disconnect_broadcasts_once() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        let (b, mut rx_b) = connect(&mut server);
        set_name(&mut server, a, "alice");
        set_name(&mut server, b, "bob");
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        server.handle_command(ServerCommand::Disconnect { client_id: a });
        let left = next_envelope(&mut rx_b);
        assert_eq!(left.kind, Kind::Disconnect);
        assert_eq!(left.sender, "alice");
        assert_eq!(left.content, "has disconnected");
        assert_no_frames(&mut rx_b);
        assert_eq!(server.registry.snapshot_names(), vec!["bob".to_string()]);

        // Double close is idempotent and silent
        server.handle_command(ServerCommand::Disconnect { client_id: a });
        assert_no_frames(&mut rx_b);
    }

    #[test]
    fn test_unnamed_disconnect_is_silent() {
        let mut server = test_server();
        let (a, mut rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");
        next_envelope(&mut rx_a);
        next_envelope(&mut rx_a);

        let (b, _rx_b) = connect(&mut server);
        server.handle_command(ServerCommand::Disconnect { client_id: b });
        assert_no_frames(&mut rx_a);
    }

    #[test]
    fn test_shutdown_clears_registry() {
        let mut server = test_server();
        let (a, _rx_a) = connect(&mut server);
        set_name(&mut server, a, "alice");

        server.handle_command(ServerCommand::Shutdown);
        assert!(server.registry.is_empty());
    }
}
