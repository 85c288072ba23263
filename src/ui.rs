//! Presentation seam
//!
//! The core never renders anything itself; it surfaces events through
//! the `Presenter` trait. The terminal client implements it with plain
//! line output; a graphical frontend would be another implementation.

use crate::envelope::{Envelope, Kind};

/// Roster prefix inside INFO envelopes
const ROSTER_PREFIX: &str = "Connected users:";

/// Consumer of user-visible chat events
pub trait Presenter {
    /// A chat message from a user
    fn append_message(&mut self, user: &str, time: &str, content: &str);

    /// A system notice (joins, departures, errors)
    fn append_system_message(&mut self, text: &str);

    /// The roster changed
    fn update_user_list(&mut self, names: &[String]);
}

/// Route a received envelope to the presenter
///
/// INFO envelopes carrying a roster additionally refresh the user list;
/// end users only ever see ERROR envelopes addressed to them.
pub fn present_envelope(presenter: &mut dyn Presenter, envelope: &Envelope) {
    let time = envelope.timestamp.format("%H:%M").to_string();
    match envelope.kind {
        Kind::Info => {
            if let Some(rest) = envelope.content.strip_prefix(ROSTER_PREFIX) {
                let names: Vec<String> = rest
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect();
                presenter.update_user_list(&names);
            }
            presenter.append_system_message(&format!("[{}] {}", time, envelope.content));
        }
        Kind::Connect | Kind::Disconnect => {
            presenter.append_system_message(&format!(
                "[{}] {} {}",
                time, envelope.sender, envelope.content
            ));
        }
        Kind::Error => {
            presenter.append_system_message(&format!("[{}] ERROR: {}", time, envelope.content));
        }
        Kind::Message | Kind::SetName => {
            presenter.append_message(&envelope.sender, &time, &envelope.content);
        }
    }
}
