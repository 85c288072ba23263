//! UDP discovery responder
//!
//! Lets clients find the chat server on the LAN without configuration: a
//! datagram containing the probe token gets a reply carrying the main
//! endpoint's host and port. The responder shares no state with the chat
//! path; its failure terminates only the discovery loop.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, error, info, trace, warn};

use crate::error::RelayError;

/// Discovery probe clients broadcast to locate the server
pub const DISCOVERY_PROBE: &str = "DISCOVER_CHAT_SERVER";

/// Prefix of the discovery response, followed by `host:port`
pub const DISCOVERY_PREFIX: &str = "CHAT_SERVER:";

/// Answers discovery probes with the main endpoint address
#[derive(Debug)]
pub struct DiscoveryResponder {
    socket: UdpSocket,
    response: String,
}

impl DiscoveryResponder {
    /// Bind the discovery socket and fix the advertised endpoint
    pub async fn bind(
        bind_addr: SocketAddr,
        chat_host: &str,
        chat_port: u16,
    ) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| RelayError::Discovery(format!("bind {}: {}", bind_addr, e)))?;
        let response = format!("{}{}:{}", DISCOVERY_PREFIX, chat_host, chat_port);
        info!(
            "Discovery responder listening on {} (advertising {}:{})",
            socket.local_addr().map_err(RelayError::Io)?,
            chat_host,
            chat_port
        );
        Ok(Self { socket, response })
    }

    /// Address the responder actually bound to (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.socket.local_addr().map_err(RelayError::Io)
    }

    /// Answer probes until the socket fails or the task is dropped
    ///
    /// Unknown payloads are ignored. Socket errors end this loop only;
    /// the chat path is unaffected.
    pub async fn run(self) {
        let mut buf = [0u8; 256];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) => {
                    let payload = String::from_utf8_lossy(&buf[..len]);
                    if payload.trim().eq_ignore_ascii_case(DISCOVERY_PROBE) {
                        debug!("Discovery probe from {}", peer);
                        if let Err(e) = self.socket.send_to(self.response.as_bytes(), peer).await {
                            warn!("Discovery reply to {} failed: {}", peer, e);
                        }
                    } else {
                        trace!("Ignoring datagram from {}", peer);
                    }
                }
                Err(e) => {
                    error!("Discovery socket error, stopping responder: {}", e);
                    break;
                }
            }
        }
    }
}

/// Pick the host to advertise in discovery replies
///
/// An explicit override wins; a concrete bind host is reused as-is; a
/// wildcard bind falls back to detecting the machine's LAN address.
pub fn advertised_host(bind_host: &str, override_host: Option<&str>) -> String {
    if let Some(host) = override_host {
        return host.to_string();
    }
    if bind_host != "0.0.0.0" && bind_host != "::" {
        return bind_host.to_string();
    }
    local_ip().unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Best-effort LAN address detection
///
/// Connecting a UDP socket sends no packets; it only asks the kernel
/// which local address would route to the target.
fn local_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}
