use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{CommandOutput, CommandRunner};

/// Scripted runner for tests and dry runs.
///
/// Each command has its own queue of responses. The last queued response is
/// sticky and repeats once the queue drains; commands with no script fail.
#[derive(Default)]
pub struct ScriptedRunner {
    script: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `command`.
    pub fn respond(&self, command: &str, output: CommandOutput) -> &Self {
        lock(&self.script)
            .entry(command.to_string())
            .or_default()
            .push_back(output);
        self
    }

    /// Queue a successful response with the given stdout lines.
    pub fn respond_lines<I, S>(&self, command: &str, lines: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.respond(command, CommandOutput::ok(lines))
    }

    /// Queue a failed response.
    pub fn fail(&self, command: &str) -> &Self {
        self.respond(command, CommandOutput::failed())
    }

    /// Commands executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> CommandOutput {
        lock(&self.calls).push(command.to_string());

        let mut script = lock(&self.script);
        match script.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => CommandOutput::failed(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_response_is_sticky() {
        let runner = ScriptedRunner::new();
        runner.respond_lines("cat x", ["1"]).respond_lines("cat x", ["2"]);

        assert_eq!(runner.run("cat x").lines, vec!["1"]);
        assert_eq!(runner.run("cat x").lines, vec!["2"]);
        assert_eq!(runner.run("cat x").lines, vec!["2"]);
    }

    #[test]
    fn test_unscripted_command_fails_and_is_recorded() {
        let runner = ScriptedRunner::new();
        assert!(!runner.run("cat /proc/stat").success);
        assert_eq!(runner.calls(), vec!["cat /proc/stat"]);
    }
}
