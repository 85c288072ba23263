//! Broadcast engine: envelope fan-out
//!
//! Serializes an envelope once and delivers it to every connection in a
//! registry snapshot. One dead socket must not block the others, and a
//! slow fan-out only produces an operational warning, never an abort.

use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::envelope::Envelope;
use crate::registry::SessionRegistry;

/// Fan-out time above which a warning is logged
const SLOW_FANOUT: Duration = Duration::from_millis(1000);

/// Delivers envelopes to every registered connection
#[derive(Debug)]
pub struct BroadcastEngine {
    warn_threshold: Duration,
}

impl Default for BroadcastEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEngine {
    pub fn new() -> Self {
        Self {
            warn_threshold: SLOW_FANOUT,
        }
    }

    #[cfg(test)]
    fn with_threshold(warn_threshold: Duration) -> Self {
        Self { warn_threshold }
    }

    /// Deliver an envelope to every connection in the registry
    ///
    /// The recipient set is a snapshot taken at the start of the call;
    /// per-recipient failures are logged and isolated. Returns the number
    /// of recipients the frame was queued for.
    pub fn broadcast(&self, registry: &SessionRegistry, envelope: &Envelope) -> usize {
        let frame = match serde_json::to_string(envelope) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize envelope for broadcast: {}", e);
                return 0;
            }
        };

        let start = Instant::now();
        let mut delivered = 0;

        for id in registry.all_connections() {
            let Some(session) = registry.get(id) else {
                continue;
            };
            match session.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Delivery to {} failed: {}", id, e),
            }
        }

        let elapsed = start.elapsed();
        if elapsed > self.warn_threshold {
            warn!(
                "Slow broadcast fan-out: {}ms across {} connections",
                elapsed.as_millis(),
                registry.len()
            );
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Kind;
    use crate::types::ClientId;
    use tokio::sync::mpsc;

    #[test]
    fn test_broadcast_reaches_all_connections() {
        let mut registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(32);
        let (tx_b, mut rx_b) = mpsc::channel(32);
        registry.register(ClientId::new(), tx_a);
        registry.register(ClientId::new(), tx_b);

        let engine = BroadcastEngine::new();
        let envelope = Envelope::system("hello", Kind::Info);
        assert_eq!(engine.broadcast(&registry, &envelope), 2);

        let frame_a = rx_a.try_recv().unwrap();
        let frame_b = rx_b.try_recv().unwrap();
        // Serialized once: every recipient gets the identical frame
        assert_eq!(frame_a, frame_b);
        let received: Envelope = serde_json::from_str(&frame_a).unwrap();
        assert_eq!(received.content, "hello");
        assert_eq!(received.kind, Kind::Info);
    }

    #[test]
    fn test_dead_recipient_does_not_block_others() {
        let mut registry = SessionRegistry::new();
        let (tx_dead, rx_dead) = mpsc::channel(32);
        let (tx_live, mut rx_live) = mpsc::channel(32);
        registry.register(ClientId::new(), tx_dead);
        registry.register(ClientId::new(), tx_live);
        drop(rx_dead);

        let engine = BroadcastEngine::new();
        let envelope = Envelope::system("still here", Kind::Info);
        assert_eq!(engine.broadcast(&registry, &envelope), 1);
        assert!(rx_live.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_to_empty_registry() {
        let registry = SessionRegistry::new();
        let engine = BroadcastEngine::with_threshold(Duration::from_millis(0));
        let envelope = Envelope::system("nobody home", Kind::Info);
        assert_eq!(engine.broadcast(&registry, &envelope), 0);
    }
}
