//! Command execution boundary.
//!
//! The sampler never touches the filesystem directly: every counter it reads
//! comes back as stdout lines of a shell command executed by a
//! [`CommandRunner`]. On locked-down Android builds the sysfs nodes are only
//! readable through `su`, see [`ShellRunner`].

pub mod fake;
pub mod shell;

pub use fake::ScriptedRunner;
pub use shell::ShellRunner;

/// Result of one shell invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Captured stdout, one entry per line, in emission order.
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn ok<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            success: true,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    /// Successful and produced at least one line.
    pub fn has_output(&self) -> bool {
        self.success && !self.lines.is_empty()
    }

    /// First line, trimmed, when the command produced usable output.
    pub fn first_line(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.lines.first().map(|l| l.trim())
    }
}

/// Executes a shell command with elevated privilege.
///
/// Implementations must not panic and must not block forever: any failure,
/// including a timeout, is reported as `success == false`.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str) -> CommandOutput;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &str) -> CommandOutput {
        (**self).run(command)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Box<T> {
    fn run(&self, command: &str) -> CommandOutput {
        (**self).run(command)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    fn run(&self, command: &str) -> CommandOutput {
        (**self).run(command)
    }
}
