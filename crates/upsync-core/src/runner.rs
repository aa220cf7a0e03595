//! External command invocation capability
//!
//! Backends never spawn processes directly; they go through a
//! [`CommandRunner`] injected at construction. Production code uses
//! [`SystemRunner`]; tests use [`ScriptedRunner`], which replays canned
//! outputs and records every invocation.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::process::Command;
use std::sync::Mutex;

use crate::{Error, Result};

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status zero
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful invocation with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed invocation with the given stderr.
    pub fn fail(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Capability for running blocking external commands.
///
/// Implementations must not retry: each call is attempt-once and the
/// caller decides what a failure means.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    ///
    /// # Errors
    ///
    /// [`Error::Command`] only if the process could not be spawned; a
    /// nonzero exit status is reported through [`CommandOutput::success`].
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands via `std::process::Command`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, "running external command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::Command {
                program: program.to_string(),
                cause: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Replays scripted outputs for known command lines and records every
/// invocation. Unknown command lines succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `output` as the next response for the exact command line
    /// `"program arg1 arg2 ..."`. Multiple calls queue in order.
    pub fn script(&self, command_line: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .entry(command_line.to_string())
            .or_default()
            .push_back(output);
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let response = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&line)
            .and_then(VecDeque::pop_front);
        Ok(response.unwrap_or_else(|| CommandOutput::ok("")))
    }
}
