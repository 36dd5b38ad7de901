//! dockterm: a web terminal bridge for container exec sessions.
//!
//! Serves an xterm.js page and a WebSocket endpoint. Each connected client
//! gets its own pseudoterminal running an exec-style command against the
//! container it asked for (`docker exec -it <name> bash` by default). A
//! single polling loop multiplexes output from every live pty back to the
//! owning client.

pub mod config;
pub mod error;
pub mod events;
pub mod pty;
pub mod server;
pub mod service;
