//! Message envelope: the wire data model
//!
//! Every exchange between server and clients is a JSON envelope with
//! `sender`, `content`, `timestamp` (ISO-8601 local date-time) and `kind`
//! fields. Inbound payloads go through an explicit parse step that
//! distinguishes unparseable JSON, unknown kinds, and missing fields.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Reject;

/// Sender name used for server-originated system envelopes
pub const SYSTEM_SENDER: &str = "System";

/// Hard cap on chat content length, in characters
pub const MAX_CONTENT_LEN: usize = 500;

/// Envelope kind
///
/// Determines how receivers interpret `sender`/`content` and whether the
/// server treats the envelope as a control operation rather than chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// Ordinary chat content
    Message,
    /// A named user joined
    Connect,
    /// A named user left
    Disconnect,
    /// System notification (roster, rename notices)
    Info,
    /// Rejection addressed to a single client
    Error,
    /// Name registration request
    SetName,
}

impl Kind {
    /// Parse a wire literal, case-insensitively
    ///
    /// Returns None for unknown kinds; those are rejected, never forwarded.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MESSAGE" => Some(Kind::Message),
            "CONNECT" => Some(Kind::Connect),
            "DISCONNECT" => Some(Kind::Disconnect),
            "INFO" => Some(Kind::Info),
            "ERROR" => Some(Kind::Error),
            "SET_NAME" => Some(Kind::SetName),
            _ => None,
        }
    }
}

/// A complete outbound envelope
///
/// Every envelope that leaves the server has a non-empty sender, content,
/// and timestamp; the timestamp is assigned at construction and immutable
/// afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: String,
    pub content: String,
    pub timestamp: NaiveDateTime,
    pub kind: Kind,
}

impl Envelope {
    /// Create an envelope stamped with the current local time
    pub fn new(sender: impl Into<String>, content: impl Into<String>, kind: Kind) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp: Local::now().naive_local(),
            kind,
        }
    }

    /// Create a system-originated envelope
    pub fn system(content: impl Into<String>, kind: Kind) -> Self {
        Self::new(SYSTEM_SENDER, content, kind)
    }

    /// Parse an inbound payload
    ///
    /// Unparseable JSON and unknown/missing kinds are `InvalidPayload`.
    /// Missing sender/content are preserved as `None` so the protocol
    /// handler can decide per state what they mean.
    pub fn parse(text: &str) -> Result<IncomingEnvelope, Reject> {
        let wire: WireEnvelope =
            serde_json::from_str(text).map_err(|_| Reject::InvalidPayload)?;
        let kind = wire
            .kind
            .as_deref()
            .and_then(Kind::from_wire)
            .ok_or(Reject::InvalidPayload)?;
        Ok(IncomingEnvelope {
            sender: wire.sender,
            content: wire.content,
            kind,
        })
    }
}

/// An inbound envelope after parsing, before state-dependent validation
///
/// `sender` and `content` stay optional here: whether their absence is an
/// error depends on the connection's protocol state.
#[derive(Debug, Clone)]
pub struct IncomingEnvelope {
    pub sender: Option<String>,
    pub content: Option<String>,
    pub kind: Kind,
}

impl Reject {
    /// Build the `ERROR` envelope sent back to the originating client
    pub fn to_envelope(self) -> Envelope {
        Envelope::system(self.to_string(), Kind::Error)
    }
}

/// Lenient wire representation used only for parsing
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    sender: Option<String>,
    content: Option<String>,
    #[serde(rename = "timestamp")]
    _timestamp: Option<NaiveDateTime>,
    kind: Option<String>,
}

/// Clip content to `MAX_CONTENT_LEN` characters
///
/// Character-based, not byte-based, so multi-byte text is never split
/// mid-codepoint.
pub fn clip_content(mut content: String) -> String {
    if let Some((idx, _)) = content.char_indices().nth(MAX_CONTENT_LEN) {
        content.truncate(idx);
    }
    content
}
