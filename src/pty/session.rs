//! A single pty-backed terminal session.

use std::io::{self, Read, Write};
use std::os::fd::RawFd;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use portable_pty::{Child, MasterPty, PtySize};
use tracing::warn;

use super::launcher::LaunchedPty;

/// One client's association with a live pty and child process.
///
/// The session owns every handle to its pty. The raw fd is only valid while
/// the master is alive, which the owning `Arc` guarantees for anyone holding
/// a table snapshot.
pub struct Session {
    pub id: String,
    pub target: String,
    /// Child pid, kept for diagnostics and logging.
    pub pid: u32,
    raw_fd: RawFd,
    master: Mutex<Box<dyn MasterPty + Send>>,
    reader: Mutex<Box<dyn Read + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send>>,
}

impl Session {
    pub fn new(id: String, target: String, launched: LaunchedPty) -> Self {
        Self {
            id,
            target,
            pid: launched.pid,
            raw_fd: launched.raw_fd,
            master: Mutex::new(launched.master),
            reader: Mutex::new(launched.reader),
            writer: Mutex::new(launched.writer),
            child: Mutex::new(launched.child),
        }
    }

    /// Master fd for readiness polling.
    pub fn raw_fd(&self) -> RawFd {
        self.raw_fd
    }

    /// Write client keystrokes verbatim to the pty master.
    pub fn write_input(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(data)?;
        writer.flush()
    }

    /// Read whatever the pty has available, up to `buf.len()` bytes.
    ///
    /// Only call after a readiness check; the underlying reader blocks.
    pub fn read_chunk(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.lock().read(buf)
    }

    /// Apply new terminal geometry; the child sees the standard
    /// window-size-changed notification.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        self.master
            .lock()
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to resize pty")
    }

    pub fn is_alive(&self) -> bool {
        self.child.lock().try_wait().ok().flatten().is_none()
    }

    /// Best-effort kill and reap of the child. Called on every removal path
    /// so torn-down sessions do not leave processes behind.
    pub fn kill(&self) {
        if !self.is_alive() {
            return;
        }
        let mut child = self.child.lock();
        if let Err(e) = child.kill() {
            warn!("[pty:{}] failed to kill child {}: {}", self.id, self.pid, e);
        }
        let _ = child.wait();
    }
}
