//! Runner trait and common types

use logrotor_core::Result;
use std::path::PathBuf;

/// A command to execute, with optional file redirections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Read standard input from this file
    pub stdin: Option<PathBuf>,
    /// Write standard output to this file (created or truncated)
    pub stdout: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_from(mut self, path: PathBuf) -> Self {
        self.stdin = Some(path);
        self
    }

    pub fn stdout_to(mut self, path: PathBuf) -> Self {
        self.stdout = Some(path);
        self
    }

    /// Look up an environment value set on this command
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Command line for logs
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Outcome of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured standard error, trimmed
    pub stderr: String,
}

impl CommandStatus {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human description of a failure
    pub fn describe(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        if self.stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, self.stderr)
        }
    }
}

/// Trait for anything that can run external commands.
///
/// Implementations block until the command exits. `Err` means the command
/// could not be started at all; a non-zero exit is reported through
/// [`CommandStatus`].
pub trait CommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandStatus>;
}
