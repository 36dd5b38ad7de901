//! Session error taxonomy.

use thiserror::Error;

/// Errors surfaced by the session service on a connect attempt.
///
/// Input and resize events for unknown session ids are not errors; they are
/// dropped silently because the remote session is simply stale.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session table is at capacity; no session was created.
    #[error("session limit reached ({limit} live sessions)")]
    CapacityExceeded { limit: usize },

    /// The session id already has a live pty; treated as a no-op connect.
    #[error("session is already connected")]
    AlreadyConnected,

    /// Pty allocation or child spawn failed. Fatal to this one connect
    /// attempt only, never to other sessions.
    #[error("failed to launch pty child: {0:#}")]
    Launch(anyhow::Error),
}
