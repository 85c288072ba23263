//! Session struct definition
//!
//! Represents a live connection: its optional display name and the
//! outbound channel to its write task.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::ClientId;

/// A registered connection
///
/// The name stays `None` until `SET_NAME` is processed; an unnamed
/// session never appears in the roster or in join/leave announcements.
/// The channel carries pre-serialized JSON frames so a broadcast
/// serializes its envelope exactly once.
#[derive(Debug)]
pub struct Session {
    /// Opaque session identifier
    pub id: ClientId,
    /// Display name (None until SET_NAME)
    pub name: Option<String>,
    /// Server → connection frame channel
    sender: mpsc::Sender<String>,
}

impl Session {
    /// Create a new session with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            name: None,
            sender,
        }
    }

    /// Queue a frame for this connection's write task
    ///
    /// Never blocks: a full queue (slow consumer) or a closed channel
    /// (connection gone) is reported as an error and the frame dropped.
    /// Delivery is best-effort.
    pub fn send(&self, frame: String) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Check if this session has completed name registration
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Set the display name, returning the previous one if any
    pub fn set_name(&mut self, name: String) -> Option<String> {
        self.name.replace(name)
    }
}
