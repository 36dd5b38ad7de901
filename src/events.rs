//! Wire protocol types and the event sink seam.
//!
//! The session core only talks to the transport through [`EventSink`] and the
//! three inbound [`ClientMessage`] variants, so the WebSocket layer can be
//! swapped without touching the multiplexer.

use serde::{Deserialize, Serialize};

/// Messages from a browser client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Request a new terminal into the named container.
    #[serde(rename = "container")]
    Container { container: String },

    /// Keystrokes, written verbatim to the pty master.
    #[serde(rename = "pty-input")]
    PtyInput { input: String },

    /// New terminal geometry.
    #[serde(rename = "resize")]
    Resize { rows: u16, cols: u16 },
}

/// Events emitted to a browser client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A chunk of pty output, lossily decoded as UTF-8.
    #[serde(rename = "pty-output")]
    PtyOutput { output: String },
}

/// Terminal notice delivered as a final `pty-output` event when a session's
/// child exits or its pty errors out.
pub const CLOSED_NOTICE: &str = "\r\n[connection closed]\r\n";

/// Delivery primitive the session core uses to reach clients.
///
/// Emitting to a session id with no connected client must be a silent no-op;
/// the pump relies on that when a client vanishes mid-sweep.
pub trait EventSink: Send + Sync {
    fn emit(&self, session_id: &str, event: ServerEvent);
}
