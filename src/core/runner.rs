//! Running external commands
//!
//! The menu generator and the installer are external shell commands. They
//! go through the `CommandRunner` trait so load and save stay testable
//! with canned output instead of a live system.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};

use crate::core::error::{Error, Result};

/// Result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub output: String,
}

/// A running command whose stdout is consumed line by line.
pub struct StreamedChild {
    pub lines: Box<dyn Iterator<Item = String> + Send>,
    waiter: Box<dyn FnOnce() -> Result<CommandOutput> + Send>,
}

impl StreamedChild {
    /// Takes ownership of the stdout lines, leaving an empty iterator.
    pub fn take_lines(&mut self) -> Box<dyn Iterator<Item = String> + Send> {
        std::mem::replace(&mut self.lines, Box::new(std::iter::empty()))
    }

    /// Consumes the handle, waits for exit and returns status plus
    /// whatever the command wrote to stderr.
    pub fn finish(self) -> Result<CommandOutput> {
        (self.waiter)()
    }
}

pub trait CommandRunner: Send + Sync {
    /// Starts `command` via the shell, streaming stdout.
    fn spawn_streamed(&self, command: &str) -> Result<StreamedChild>;

    /// Runs `command` via the shell, capturing combined output.
    fn run_captured(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn spawn_streamed(&self, command: &str) -> Result<StreamedChild> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io("sh", e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or(Error::Invariant("child stdout missing".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or(Error::Invariant("child stderr missing".into()))?;

        let lines = BufReader::new(stdout).lines().map_while(|l| l.ok());
        let waiter = move || {
            let mut err = String::new();
            stderr
                .read_to_string(&mut err)
                .map_err(|e| Error::io("stderr", e))?;
            let status = child.wait().map_err(|e| Error::io("child", e))?;
            Ok(CommandOutput {
                success: status.success(),
                output: err,
            })
        };

        Ok(StreamedChild {
            lines: Box::new(lines),
            waiter: Box::new(waiter),
        })
    }

    fn run_captured(&self, command: &str) -> Result<CommandOutput> {
        let out = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::io("sh", e))?;
        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(CommandOutput {
            success: out.status.success(),
            output,
        })
    }
}

/// Test double replaying fixed stdout and a fixed exit status.
pub struct FixedRunner {
    pub stdout: String,
    pub success: bool,
}

impl CommandRunner for FixedRunner {
    fn spawn_streamed(&self, _command: &str) -> Result<StreamedChild> {
        let lines: Vec<String> = self.stdout.lines().map(str::to_string).collect();
        let success = self.success;
        Ok(StreamedChild {
            lines: Box::new(lines.into_iter()),
            waiter: Box::new(move || {
                Ok(CommandOutput {
                    success,
                    output: String::new(),
                })
            }),
        })
    }

    fn run_captured(&self, _command: &str) -> Result<CommandOutput> {
        Ok(CommandOutput {
            success: self.success,
            output: self.stdout.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_runner_streams_and_reports_exit() {
        let runner = SystemRunner;
        let mut child = runner
            .spawn_streamed("printf 'a\\nb\\n'; echo oops >&2; exit 3")
            .unwrap();
        let lines: Vec<String> = (&mut child.lines).collect();
        assert_eq!(lines, vec!["a", "b"]);
        let out = child.finish().unwrap();
        assert!(!out.success);
        assert!(out.output.contains("oops"));
    }

    #[test]
    fn captured_run_merges_streams() {
        let runner = SystemRunner;
        let out = runner.run_captured("echo ok; echo err >&2").unwrap();
        assert!(out.success);
        assert!(out.output.contains("ok"));
        assert!(out.output.contains("err"));
    }
}
