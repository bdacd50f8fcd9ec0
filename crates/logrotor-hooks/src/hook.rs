//! Hook script invocation

use logrotor_core::constants::{
    ENV_FILE, ENV_FILES, ENV_GROUP, ENV_HOOK, HOOK_ARG0, HOOK_SHELL,
};
use logrotor_core::{Error, HookStage, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::traits::{CommandRunner, CommandSpec};

/// Build the command for a hook script.
///
/// The script runs as `sh -c <script> logrotor <paths...>`, so `$1` is the
/// first rotated file and `$@` all of them.
pub fn hook_command(stage: HookStage, script: &str, group: &str, files: &[PathBuf]) -> CommandSpec {
    let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();

    CommandSpec::new(HOOK_SHELL)
        .args(["-c", script, HOOK_ARG0])
        .args(paths.iter().cloned())
        .env(ENV_HOOK, stage.as_str())
        .env(ENV_GROUP, group)
        .env(ENV_FILE, paths.first().cloned().unwrap_or_default())
        .env(ENV_FILES, paths.join("\n"))
}

/// Run a hook script and turn a failed exit into `HookFailed`
pub fn run_hook(
    runner: &dyn CommandRunner,
    stage: HookStage,
    script: &str,
    group: &str,
    files: &[PathBuf],
) -> Result<()> {
    info!("Running {} hook for group {}", stage, group);
    debug!("{} script: {}", stage, script);

    let command = hook_command(stage, script, group, files);
    let status = runner
        .run(&command)
        .map_err(|e| Error::hook(stage.as_str(), group, e.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::hook(stage.as_str(), group, status.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordingRunner, ShellRunner};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_hook_command_layout() {
        let files = vec![PathBuf::from("/var/log/a.log"), PathBuf::from("/var/log/b.log")];
        let cmd = hook_command(HookStage::PostRotate, "kill -HUP 1", "web", &files);

        assert_eq!(cmd.program, "sh");
        assert_eq!(
            cmd.args,
            vec!["-c", "kill -HUP 1", "logrotor", "/var/log/a.log", "/var/log/b.log"]
        );
        assert_eq!(cmd.env_value(ENV_HOOK), Some("postrotate"));
        assert_eq!(cmd.env_value(ENV_GROUP), Some("web"));
        assert_eq!(cmd.env_value(ENV_FILE), Some("/var/log/a.log"));
        assert_eq!(
            cmd.env_value(ENV_FILES),
            Some("/var/log/a.log\n/var/log/b.log")
        );
    }

    #[test]
    fn test_hook_sees_positional_args_and_env() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("seen");
        let script = format!(
            "echo \"$1 $LOGROTOR_HOOK $LOGROTOR_GROUP\" > {}",
            out.display()
        );

        run_hook(
            &ShellRunner::new(),
            HookStage::PreRotate,
            &script,
            "app",
            &[PathBuf::from("/tmp/app.log")],
        )
        .unwrap();

        assert_eq!(
            fs::read_to_string(&out).unwrap().trim(),
            "/tmp/app.log prerotate app"
        );
    }

    #[test]
    fn test_failed_hook_is_reported() {
        let err = run_hook(
            &ShellRunner::new(),
            HookStage::LastAction,
            "exit 7",
            "app",
            &[],
        )
        .unwrap_err();

        match err {
            Error::HookFailed { stage, group, message } => {
                assert_eq!(stage, "lastaction");
                assert_eq!(group, "app");
                assert!(message.contains("exit status 7"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_run_hook_through_recording_runner() {
        let runner = RecordingRunner::new();
        run_hook(&runner, HookStage::FirstAction, "true", "g", &[]).unwrap();

        let calls = runner.hook_calls(HookStage::FirstAction);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].env_value(ENV_FILE), Some(""));
    }
}
