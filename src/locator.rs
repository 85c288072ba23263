//! Client-side server location
//!
//! Resolution order: `CHAT_SERVER_URL` environment variable, then a UDP
//! discovery probe on the LAN, then a hardcoded default.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::discovery::{DISCOVERY_PREFIX, DISCOVERY_PROBE};
use crate::error::RelayError;

/// Fallback endpoint when discovery finds nothing
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8025/chat";

/// How long to wait for a discovery reply
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolve the server WebSocket URL
pub async fn locate_server(override_url: Option<&str>, discovery_port: u16) -> String {
    if let Some(url) = override_url {
        let url = url.trim();
        if !url.is_empty() {
            info!("Using configured server URL: {}", url);
            return url.to_string();
        }
    }

    match probe(discovery_port).await {
        Ok(url) => {
            info!("Discovered server at {}", url);
            url
        }
        Err(e) => {
            debug!("Discovery failed ({}), using default endpoint", e);
            DEFAULT_SERVER_URL.to_string()
        }
    }
}

/// Broadcast a probe and wait for the first well-formed reply
async fn probe(discovery_port: u16) -> Result<String, RelayError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;
    socket
        .send_to(
            DISCOVERY_PROBE.as_bytes(),
            ("255.255.255.255", discovery_port),
        )
        .await?;

    let mut buf = [0u8; 256];
    let (len, _) = timeout(PROBE_TIMEOUT, socket.recv_from(&mut buf))
        .await
        .map_err(|_| RelayError::Discovery("probe timed out".to_string()))??;

    let reply = String::from_utf8_lossy(&buf[..len]);
    parse_discovery_reply(reply.trim())
        .ok_or_else(|| RelayError::Discovery(format!("malformed reply: {}", reply)))
}

/// Turn a `CHAT_SERVER:host:port` reply into a WebSocket URL
pub fn parse_discovery_reply(reply: &str) -> Option<String> {
    let rest = reply.strip_prefix(DISCOVERY_PREFIX)?;
    let (host, port) = rest.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("ws://{}:{}/chat", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_discovery_reply() {
        assert_eq!(
            parse_discovery_reply("CHAT_SERVER:192.168.1.7:8025"),
            Some("ws://192.168.1.7:8025/chat".to_string())
        );
        assert_eq!(parse_discovery_reply("CHAT_SERVER:host:notaport"), None);
        assert_eq!(parse_discovery_reply("CHAT_SERVER::8025"), None);
        assert_eq!(parse_discovery_reply("SOMETHING_ELSE:1:2"), None);
        assert_eq!(parse_discovery_reply("CHAT_SERVER:"), None);
    }

    #[tokio::test]
    async fn test_override_url_wins() {
        let url = locate_server(Some("ws://10.0.0.9:8025/chat"), 1).await;
        assert_eq!(url, "ws://10.0.0.9:8025/chat");
    }

    #[tokio::test]
    async fn test_blank_override_falls_through_to_default() {
        // Port 1 is unanswered; after the probe times out the default wins
        let url = locate_server(Some("   "), 1).await;
        assert_eq!(url, DEFAULT_SERVER_URL);
    }
}
