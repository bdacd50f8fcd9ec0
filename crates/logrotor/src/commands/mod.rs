//! Command implementations

pub mod check;
pub mod run;
pub mod status;

use anyhow::{anyhow, Context, Result};
use logrotor_core::{
    user_state_path, ConfigFile, LogGroup, CONFIG_FILES, DEFAULT_STATE_FILE, SYSTEM_CONFIG_DIR,
};
use logrotor_hooks::ShellRunner;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config resolved into groups, plus the state file the run should use
pub struct Setup {
    pub groups: Vec<LogGroup>,
    pub state_path: PathBuf,
}

impl Setup {
    pub fn load(config: Option<&Path>, state: Option<PathBuf>) -> Result<Self> {
        let (mut file, config_path) = load_config(config)?;
        let base_dir = base_dir(&config_path);
        let state_path = state_path(state, file.state_file.take(), &base_dir);

        let groups = file
            .into_groups(&base_dir)
            .with_context(|| format!("Invalid config {}", config_path.display()))?;
        debug!(
            "Loaded {} group(s) from {}, state {}",
            groups.len(),
            config_path.display(),
            state_path.display()
        );

        Ok(Self { groups, state_path })
    }
}

/// Load the given config, or the first one found in the current directory
/// and then the system config directory
pub fn load_config(path: Option<&Path>) -> Result<(ConfigFile, PathBuf)> {
    if let Some(path) = path {
        let config = ConfigFile::load(path)?;
        return Ok((config, path.to_path_buf()));
    }

    let cwd = std::env::current_dir().context("Cannot read current directory")?;
    for dir in [cwd.as_path(), Path::new(SYSTEM_CONFIG_DIR)] {
        if let Some(found) = ConfigFile::find_and_load(dir)? {
            return Ok(found);
        }
    }

    Err(anyhow!(
        "No config file found in {} or {}. Expected one of: {:?}",
        cwd.display(),
        SYSTEM_CONFIG_DIR,
        CONFIG_FILES
    ))
}

/// Groups that compress with a program that cannot be found
pub fn missing_compressors(groups: &[LogGroup]) -> Vec<String> {
    groups
        .iter()
        .filter(|g| g.directives.compression.enabled)
        .filter(|g| ShellRunner::locate(&g.directives.compression.command).is_none())
        .map(|g| {
            format!(
                "Group '{}': compressor '{}' not found",
                g.name, g.directives.compression.command
            )
        })
        .collect()
}

/// Relative paths in a config are taken relative to the config itself
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Command line first, then the config, then the per-user or system default
pub fn state_path(flag: Option<PathBuf>, configured: Option<PathBuf>, base_dir: &Path) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Some(path) = configured {
        return base_dir.join(path);
    }
    default_state_path()
}

pub fn default_state_path() -> PathBuf {
    if nix::unistd::geteuid().is_root() {
        PathBuf::from(DEFAULT_STATE_FILE)
    } else {
        user_state_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_state_path_precedence() {
        let base = Path::new("/etc/logrotor");
        assert_eq!(
            state_path(Some(PathBuf::from("/tmp/s")), Some(PathBuf::from("x")), base),
            PathBuf::from("/tmp/s")
        );
        assert_eq!(
            state_path(None, Some(PathBuf::from("state/logrotor.status")), base),
            PathBuf::from("/etc/logrotor/state/logrotor.status")
        );
        assert_eq!(
            state_path(None, Some(PathBuf::from("/var/lib/x.status")), base),
            PathBuf::from("/var/lib/x.status")
        );
        assert_eq!(state_path(None, None, base), default_state_path());
    }

    #[test]
    fn test_base_dir() {
        assert_eq!(base_dir(Path::new("logrotor.toml")), PathBuf::from("."));
        assert_eq!(
            base_dir(Path::new("/etc/logrotor/logrotor.toml")),
            PathBuf::from("/etc/logrotor")
        );
    }

    #[test]
    fn test_setup_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("logrotor.toml");
        fs::write(
            &config,
            r#"
state_file = "rotor.status"

[[groups]]
name = "app"
paths = ["app.log"]
"#,
        )
        .unwrap();

        let setup = Setup::load(Some(&config), None).unwrap();
        assert_eq!(setup.state_path, dir.path().join("rotor.status"));
        assert_eq!(setup.groups.len(), 1);
        assert_eq!(setup.groups[0].name, "app");
    }

    #[test]
    fn test_missing_compressors() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("logrotor.toml");
        fs::write(
            &config,
            r#"
[[groups]]
name = "plain"
paths = ["a.log"]

[[groups]]
name = "shell"
paths = ["b.log"]
compress = true
compress_cmd = "sh"

[[groups]]
name = "broken"
paths = ["c.log"]
compress = true
compress_cmd = "/nonexistent/logrotor-gzip"
"#,
        )
        .unwrap();

        let setup = Setup::load(Some(&config), None).unwrap();
        assert_eq!(
            missing_compressors(&setup.groups),
            vec!["Group 'broken': compressor '/nonexistent/logrotor-gzip' not found"]
        );
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        let err = Setup::load(Some(&dir.path().join("nope.toml")), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("nope.toml"));
    }
}
