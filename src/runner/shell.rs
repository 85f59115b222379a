//! `su -c` / `sh -c` backed runner.

use anyhow::{anyhow, bail, Context};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{CommandOutput, CommandRunner};

/// Default su binary looked up on PATH.
pub const DEFAULT_SU_BINARY: &str = "su";

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

const WAIT_STEP: Duration = Duration::from_millis(5);

/// Runs commands through the system shell, escalating with `su -c` when
/// configured as privileged and the process is not already root.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    privileged: bool,
    su_binary: String,
    timeout: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            privileged: true,
            su_binary: DEFAULT_SU_BINARY.to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl ShellRunner {
    pub fn new(privileged: bool, su_binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            privileged,
            su_binary: su_binary.into(),
            timeout,
        }
    }

    /// Plain `sh -c` runner, no escalation.
    pub fn unprivileged(timeout: Duration) -> Self {
        Self::new(false, DEFAULT_SU_BINARY, timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True when commands will be wrapped in `su -c`.
    pub fn escalates(&self) -> bool {
        self.privileged && !running_as_root()
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = if self.escalates() {
            Command::new(&self.su_binary)
        } else {
            Command::new("sh")
        };
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }

    fn execute(&self, command: &str) -> anyhow::Result<Vec<String>> {
        let mut child = self
            .build_command(command)
            .spawn()
            .with_context(|| format!("failed to spawn `{command}`"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout of `{command}` was not captured"))?;

        // Drain stdout concurrently so a chatty command cannot fill the pipe
        // while we wait for it to exit.
        let reader = thread::spawn(move || -> std::io::Result<Vec<String>> {
            BufReader::new(stdout).lines().collect()
        });

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{command}`"))?
            {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "`{}` timed out after {}ms",
                    command,
                    self.timeout.as_millis()
                );
            }
            thread::sleep(WAIT_STEP);
        };

        let lines = reader
            .join()
            .map_err(|_| anyhow!("stdout reader for `{command}` panicked"))?
            .with_context(|| format!("failed to read stdout of `{command}`"))?;

        if !status.success() {
            bail!("`{}` exited with {}", command, status);
        }

        Ok(lines)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> CommandOutput {
        let start = Instant::now();
        match self.execute(command) {
            Ok(lines) => {
                debug!(
                    "`{}` returned {} lines in {:.2}ms",
                    command,
                    lines.len(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                CommandOutput::ok(lines)
            }
            Err(e) => {
                warn!("Command failed: {:#}", e);
                CommandOutput::failed()
            }
        }
    }
}

/// Effective uid is root.
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> ShellRunner {
        ShellRunner::unprivileged(Duration::from_secs(5))
    }

    #[test]
    fn test_captures_lines_in_order() {
        let out = runner().run("printf 'a\\nb b\\nc\\n'");
        assert!(out.success);
        assert_eq!(out.lines, vec!["a", "b b", "c"]);
    }

    #[test]
    fn test_non_zero_exit_is_failure() {
        let out = runner().run("echo partial; exit 3");
        assert!(!out.success);
        assert!(out.lines.is_empty());
    }

    #[test]
    fn test_missing_file_is_failure() {
        let out = runner().run("cat /nonexistent/herakles/gpu_busy");
        assert!(!out.success);
    }

    #[test]
    fn test_timeout_is_failure() {
        let runner = ShellRunner::unprivileged(Duration::from_millis(100));
        let start = Instant::now();
        let out = runner.run("sleep 5");
        assert!(!out.success);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_unprivileged_never_escalates() {
        assert!(!runner().escalates());
    }
}
