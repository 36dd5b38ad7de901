//! Runtime configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Web terminal bridge for container exec sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "dockterm", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "DOCKTERM_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Maximum number of concurrent terminal sessions
    #[arg(long, env = "DOCKTERM_MAX_SESSIONS", default_value_t = 6)]
    pub max_sessions: usize,

    /// Output pump poll quantum in milliseconds
    #[arg(long, env = "DOCKTERM_POLL_INTERVAL_MS", default_value_t = 10)]
    pub poll_interval_ms: u64,

    /// Maximum bytes read from a pty per poll cycle
    #[arg(long, env = "DOCKTERM_READ_CHUNK_SIZE", default_value_t = 20480)]
    pub read_chunk_size: usize,

    /// Initial pty rows
    #[arg(long, env = "DOCKTERM_INITIAL_ROWS", default_value_t = 50)]
    pub initial_rows: u16,

    /// Initial pty columns
    #[arg(long, env = "DOCKTERM_INITIAL_COLS", default_value_t = 50)]
    pub initial_cols: u16,

    /// Base command the target name and shell are appended to
    #[arg(
        long,
        env = "DOCKTERM_EXEC_COMMAND",
        value_delimiter = ' ',
        default_values_t = ["docker".to_string(), "exec".to_string(), "-it".to_string()]
    )]
    pub exec_command: Vec<String>,

    /// Sub-command run inside the target (the interactive shell)
    #[arg(long, env = "DOCKTERM_SHELL", default_value = "bash")]
    pub shell: String,

    /// Serve the terminal page from this directory instead of the embedded one
    #[arg(long, env = "DOCKTERM_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".parse().expect("valid default bind"),
            max_sessions: 6,
            poll_interval_ms: 10,
            read_chunk_size: 20480,
            initial_rows: 50,
            initial_cols: 50,
            exec_command: vec!["docker".into(), "exec".into(), "-it".into()],
            shell: "bash".into(),
            static_dir: None,
        }
    }
}
