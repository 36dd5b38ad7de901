//! Pty allocation and child process launch.

use std::io::{Read, Write};
use std::os::fd::RawFd;

use anyhow::Context;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

/// Everything a successful launch hands over: the master side of the pty,
/// its cloned reader / taken writer, the raw fd for readiness polling, and
/// the child handle. Ownership of all of it moves into the session entry.
pub struct LaunchedPty {
    pub master: Box<dyn MasterPty + Send>,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub child: Box<dyn Child + Send>,
    pub raw_fd: RawFd,
    pub pid: u32,
}

/// Spawns children attached to fresh ptys from an immutable command template.
///
/// The argv for each launch is `template + [target, shell]`, built into a
/// fresh vector every time; the template itself is never mutated, so
/// concurrent launches cannot corrupt each other's argument lists.
pub struct PtyLauncher {
    template: Vec<String>,
    shell: String,
    rows: u16,
    cols: u16,
}

impl PtyLauncher {
    pub fn new(template: Vec<String>, shell: String, rows: u16, cols: u16) -> Self {
        Self {
            template,
            shell,
            rows,
            cols,
        }
    }

    /// Argv for a single launch against `target`.
    fn build_argv(&self, target: &str) -> Vec<String> {
        let mut argv = self.template.clone();
        argv.push(target.to_string());
        argv.push(self.shell.clone());
        argv
    }

    /// Allocate a pty pair and spawn the exec command for `target` on its
    /// slave side, with the initial window size applied.
    ///
    /// An exec failure inside the child is not observable here; the child
    /// exits and the output pump sees an immediate end-of-stream.
    pub fn launch(&self, target: &str) -> anyhow::Result<LaunchedPty> {
        let argv = self.build_argv(target);
        let (program, args) = argv.split_first().context("empty exec command template")?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open pty")?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env(
            "TERM",
            std::env::var("TERM").unwrap_or_else(|_| "xterm-256color".to_string()),
        );

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("failed to spawn `{}`", argv.join(" ")))?;
        let pid = child.process_id().unwrap_or(0);

        let raw_fd = pair
            .master
            .as_raw_fd()
            .context("pty master has no raw fd")?;
        let reader = pair
            .master
            .try_clone_reader()
            .context("failed to clone pty reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("failed to take pty writer")?;

        Ok(LaunchedPty {
            master: pair.master,
            reader,
            writer,
            child,
            raw_fd,
            pid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_appends_target_and_shell() {
        let launcher = PtyLauncher::new(
            vec!["docker".into(), "exec".into(), "-it".into()],
            "bash".into(),
            50,
            50,
        );
        assert_eq!(
            launcher.build_argv("web-1"),
            vec!["docker", "exec", "-it", "web-1", "bash"]
        );
    }

    #[test]
    fn template_is_not_mutated_across_launch_attempts() {
        let launcher = PtyLauncher::new(vec!["docker".into(), "exec".into()], "sh".into(), 24, 80);
        let first = launcher.build_argv("a");
        let second = launcher.build_argv("b");
        assert_eq!(first, vec!["docker", "exec", "a", "sh"]);
        assert_eq!(second, vec!["docker", "exec", "b", "sh"]);
        assert_eq!(launcher.template, vec!["docker", "exec"]);
    }

    #[test]
    fn launch_spawns_a_child() {
        // `/bin/sh -c <target> sh` runs the target string as a script.
        let launcher = PtyLauncher::new(vec!["/bin/sh".into(), "-c".into()], "sh".into(), 24, 80);
        let launched = launcher.launch("exit 0").unwrap();
        assert!(launched.pid > 0);
        assert!(launched.raw_fd >= 0);
    }

}
