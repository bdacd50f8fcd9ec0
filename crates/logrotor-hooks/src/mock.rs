//! Fake runner for testing

use logrotor_core::constants::ENV_HOOK;
use logrotor_core::{Error, HookStage, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::traits::{CommandRunner, CommandSpec, CommandStatus};

/// A runner that records every command instead of spawning it.
///
/// Commands with both stdin and stdout redirected behave like `cat`, which is
/// enough to stand in for a compressor. Commands matching a failure pattern
/// exit with status 1 and write nothing.
#[derive(Default)]
pub struct RecordingRunner {
    /// Commands that have been run
    calls: Mutex<Vec<CommandSpec>>,
    /// Number of run calls
    call_count: AtomicUsize,
    /// Substrings of program or args that make a command fail
    fail_patterns: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command whose program or arguments contain `pattern`
    pub fn failing_on<S: Into<String>>(mut self, pattern: S) -> Self {
        self.fail_patterns.push(pattern.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All recorded commands in call order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Recorded hook invocations for a stage
    pub fn hook_calls(&self, stage: HookStage) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.env_value(ENV_HOOK) == Some(stage.as_str()))
            .collect()
    }

    /// Hook stages in the order they ran
    pub fn stages(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.env_value(ENV_HOOK).map(str::to_string))
            .collect()
    }

    /// Recorded commands with redirected input, i.e. compressions
    pub fn compressions(&self) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.stdin.is_some())
            .collect()
    }

    fn should_fail(&self, spec: &CommandSpec) -> bool {
        self.fail_patterns.iter().any(|p| {
            spec.program.contains(p.as_str()) || spec.args.iter().any(|a| a.contains(p.as_str()))
        })
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        if self.should_fail(spec) {
            return Ok(CommandStatus {
                code: Some(1),
                stderr: "mock failure".to_string(),
            });
        }

        if let (Some(input), Some(output)) = (&spec.stdin, &spec.stdout) {
            std::fs::copy(input, output).map_err(Error::fs("copy", input))?;
        }
        Ok(CommandStatus::exited(0))
    }
}
