//! Runner backed by real processes

use logrotor_core::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

use crate::traits::{CommandRunner, CommandSpec, CommandStatus};

/// Runs commands with `std::process::Command`, blocking until they exit
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    /// Locate a program on PATH, or accept it if it is an existing path
    pub fn locate(program: &str) -> Option<PathBuf> {
        match which::which(program) {
            Ok(path) => Some(path),
            Err(_) if Path::new(program).exists() => Some(PathBuf::from(program)),
            Err(_) => None,
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        debug!("Running: {}", spec.display());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stderr(Stdio::piped());

        match &spec.stdin {
            Some(path) => {
                let file = File::open(path).map_err(Error::fs("open", path))?;
                cmd.stdin(file);
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }
        match &spec.stdout {
            Some(path) => {
                let file = File::create(path).map_err(Error::fs("create", path))?;
                cmd.stdout(file);
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        let output = cmd.output().map_err(|e| {
            Error::CommandStartFailed(format!("Failed to start '{}': {}", spec.program, e))
        })?;

        if !output.stdout.is_empty() {
            trace!(
                "{} stdout: {}",
                spec.program,
                String::from_utf8_lossy(&output.stdout).trim_end()
            );
        }

        Ok(CommandStatus {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate() {
        assert!(ShellRunner::locate("sh").is_some());
        assert!(ShellRunner::locate("nonexistent_command_12345").is_none());
    }

    #[test]
    fn test_exit_codes_and_stderr() {
        let runner = ShellRunner::new();

        let ok = runner
            .run(&CommandSpec::new("sh").args(["-c", "exit 0"]))
            .unwrap();
        assert!(ok.success());

        let failed = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(failed.code, Some(3));
        assert_eq!(failed.stderr, "oops");
    }

    #[test]
    fn test_env_is_passed() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$GREETING\""])
            .env("GREETING", "hello")
            .stdout_to(out.clone());
        assert!(ShellRunner::new().run(&spec).unwrap().success());
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello");
    }

    #[test]
    fn test_stdin_and_stdout_redirection() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::write(&input, "line one\nline two\n").unwrap();

        let spec = CommandSpec::new("cat")
            .stdin_from(input)
            .stdout_to(output.clone());
        assert!(ShellRunner::new().run(&spec).unwrap().success());
        assert_eq!(fs::read_to_string(&output).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn test_missing_program_is_start_failure() {
        let result = ShellRunner::new().run(&CommandSpec::new("nonexistent_command_12345"));
        assert!(matches!(result, Err(Error::CommandStartFailed(_))));
    }
}
