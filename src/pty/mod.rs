//! Pty session multiplexing.
//!
//! `launcher` spawns children on fresh ptys, `table` owns the id -> session
//! mapping, and `pump` is the single loop that moves pty output to clients.

mod launcher;
mod pump;
mod session;
mod table;

pub use launcher::{LaunchedPty, PtyLauncher};
pub use pump::OutputPump;
pub use session::Session;
pub use table::SessionTable;
