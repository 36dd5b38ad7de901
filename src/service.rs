//! Session service: the event-facing surface of the multiplexer.
//!
//! Routes connect, input, resize, and disconnect events from the transport
//! to the right pty, and starts the output pump exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SessionError;
use crate::events::EventSink;
use crate::pty::{OutputPump, PtyLauncher, Session, SessionTable};

pub struct SessionService {
    table: Arc<SessionTable>,
    launcher: PtyLauncher,
    sink: Arc<dyn EventSink>,
    config: Config,
    pump_started: AtomicBool,
}

impl SessionService {
    pub fn new(config: &Config, sink: Arc<dyn EventSink>) -> Arc<Self> {
        let launcher = PtyLauncher::new(
            config.exec_command.clone(),
            config.shell.clone(),
            config.initial_rows,
            config.initial_cols,
        );
        Arc::new(Self {
            table: Arc::new(SessionTable::new(config.max_sessions)),
            launcher,
            sink,
            config: config.clone(),
            pump_started: AtomicBool::new(false),
        })
    }

    pub fn session_count(&self) -> usize {
        self.table.len()
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.table.lookup(id)
    }

    /// Handle a connect request: launch a child on a fresh pty for `target`
    /// and register it under `id`.
    ///
    /// Connecting an id that is already live is a no-op (no second pty or
    /// child). A capacity rejection creates nothing. Launch and registration
    /// form one critical section per id; losing the insert race tears the
    /// freshly spawned child down instead of leaking it.
    pub fn on_connect(self: &Arc<Self>, id: &str, target: &str) -> Result<(), SessionError> {
        if self.table.lookup(id).is_some() {
            debug!("[pty:{}] already connected, ignoring", id);
            return Err(SessionError::AlreadyConnected);
        }
        let limit = self.table.max_sessions();
        if self.table.len() >= limit {
            warn!("[pty:{}] connect rejected: {} sessions live", id, limit);
            return Err(SessionError::CapacityExceeded { limit });
        }

        let launched = self.launcher.launch(target).map_err(SessionError::Launch)?;
        info!(
            "[pty:{}] child {} spawned for target {}",
            id, launched.pid, target
        );

        let session = Arc::new(Session::new(id.to_string(), target.to_string(), launched));
        if !self.table.try_insert(session.clone()) {
            warn!("[pty:{}] lost registration race, reclaiming child", id);
            session.kill();
            return Err(SessionError::CapacityExceeded { limit });
        }

        self.ensure_pump();
        Ok(())
    }

    /// Write client keystrokes to the session's pty. Unknown ids are stale
    /// references and are dropped silently.
    pub fn on_input(&self, id: &str, input: &str) {
        match self.table.lookup(id) {
            Some(session) => {
                debug!("[pty:{}] input: {} bytes", id, input.len());
                if let Err(e) = session.write_input(input.as_bytes()) {
                    warn!("[pty:{}] input write failed: {}", id, e);
                }
            }
            None => debug!("[pty:{}] input for unknown session dropped", id),
        }
    }

    /// Apply new terminal geometry. Unknown ids are dropped silently.
    pub fn on_resize(&self, id: &str, rows: u16, cols: u16) {
        match self.table.lookup(id) {
            Some(session) => {
                debug!("[pty:{}] resize to {}x{}", id, rows, cols);
                if let Err(e) = session.resize(rows, cols) {
                    warn!("[pty:{}] resize failed: {:#}", id, e);
                }
            }
            None => debug!("[pty:{}] resize for unknown session dropped", id),
        }
    }

    /// Explicit teardown when the owning connection goes away. The pump
    /// handles child exits on its own; this covers clients that leave first.
    pub fn on_disconnect(&self, id: &str) {
        if let Some(session) = self.table.remove(id) {
            session.kill();
            info!("[pty:{}] session torn down on disconnect", id);
        }
    }

    /// Start the output pump at most once for the life of the service.
    fn ensure_pump(self: &Arc<Self>) {
        if self
            .pump_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let pump = OutputPump::new(
                self.table.clone(),
                self.sink.clone(),
                self.config.poll_interval(),
                self.config.read_chunk_size,
            );
            tokio::spawn(pump.run());
        }
    }
}
