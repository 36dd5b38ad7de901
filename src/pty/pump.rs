//! The output pump: one cooperative loop multiplexing every live pty.

use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags};
use tracing::{debug, info, warn};

use super::session::Session;
use super::table::SessionTable;
use crate::events::{EventSink, ServerEvent, CLOSED_NOTICE};

/// What one sweep decided about a session.
enum SweepOutcome {
    /// Nothing to read this cycle.
    Idle,
    /// One chunk was emitted.
    Output,
    /// End-of-stream; the closed notice was emitted and the session must go.
    Closed,
}

/// Polls every live pty each cycle and forwards output to the owning client.
///
/// Deliberately a single loop rather than a task per session: the fixed
/// sleep quantum is the only scheduling primitive and caps CPU usage, and a
/// zero-timeout readiness check keeps every fd touch non-blocking. At most
/// one read per session per cycle, so a bursty session spreads its backlog
/// across cycles instead of starving its neighbours.
pub struct OutputPump {
    table: Arc<SessionTable>,
    sink: Arc<dyn EventSink>,
    poll_interval: Duration,
    chunk_size: usize,
}

impl OutputPump {
    pub fn new(
        table: Arc<SessionTable>,
        sink: Arc<dyn EventSink>,
        poll_interval: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            table,
            sink,
            poll_interval,
            chunk_size,
        }
    }

    pub async fn run(self) {
        info!(
            "output pump started (quantum {:?}, chunk {} bytes)",
            self.poll_interval, self.chunk_size
        );
        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            tick.tick().await;
            self.sweep(&mut buf);
        }
    }

    /// One pass over a snapshot of the table. Sessions that hit
    /// end-of-stream are removed and reclaimed after the sweep, never
    /// mid-iteration.
    fn sweep(&self, buf: &mut [u8]) {
        let mut defunct: Vec<String> = Vec::new();
        for session in self.table.snapshot() {
            match self.pump_one(&session, buf) {
                SweepOutcome::Idle | SweepOutcome::Output => {}
                SweepOutcome::Closed => defunct.push(session.id.clone()),
            }
        }
        for id in defunct {
            if let Some(session) = self.table.remove(&id) {
                session.kill();
                info!(
                    "[pty:{}] session closed (target {}, pid {})",
                    id, session.target, session.pid
                );
            }
        }
    }

    /// Service a single session: readiness check, then at most one read.
    /// Failures here are isolated to this session.
    fn pump_one(&self, session: &Session, buf: &mut [u8]) -> SweepOutcome {
        match poll_readable(session.raw_fd()) {
            Ok(false) => return SweepOutcome::Idle,
            Ok(true) => {}
            Err(e) => {
                debug!("[pty:{}] poll failed: {}", session.id, e);
                self.emit_closed(session);
                return SweepOutcome::Closed;
            }
        }

        match session.read_chunk(buf) {
            Ok(0) => {
                self.emit_closed(session);
                SweepOutcome::Closed
            }
            Ok(n) => {
                let output = String::from_utf8_lossy(&buf[..n]).into_owned();
                self.sink
                    .emit(&session.id, ServerEvent::PtyOutput { output });
                SweepOutcome::Output
            }
            Err(e) => {
                debug!("[pty:{}] read failed: {}", session.id, e);
                self.emit_closed(session);
                SweepOutcome::Closed
            }
        }
    }

    fn emit_closed(&self, session: &Session) {
        self.sink.emit(
            &session.id,
            ServerEvent::PtyOutput {
                output: CLOSED_NOTICE.to_string(),
            },
        );
    }
}

/// Zero-timeout readiness check on a pty master fd.
///
/// POLLHUP and POLLERR count as readable so the subsequent read observes the
/// end-of-stream instead of the session idling forever.
fn poll_readable(fd: RawFd) -> io::Result<bool> {
    // The fd stays open as long as the session's master handle lives, and
    // the caller holds an Arc to the session for the duration of the check.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(&borrowed, PollFlags::POLLIN)];
    let n = poll(&mut fds, 0).map_err(io::Error::from)?;
    if n == 0 {
        return Ok(false);
    }
    let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
    if revents.contains(PollFlags::POLLNVAL) {
        return Err(io::Error::new(io::ErrorKind::NotFound, "pty fd is gone"));
    }
    if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR) {
        Ok(true)
    } else {
        if !revents.is_empty() {
            warn!("unexpected poll revents on fd {}: {:?}", fd, revents);
        }
        Ok(false)
    }
}
