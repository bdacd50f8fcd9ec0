//! Ownership and security labels for recreated files

use logrotor_core::{CreateMode, Error, Result};
use logrotor_hooks::{CommandRunner, CommandSpec};
use nix::unistd::{chown, Gid, Group, Uid, User};
use std::io;
use std::path::Path;
use tracing::debug;

use crate::policy::FileStat;

/// Resolve a user name or numeric id
pub fn resolve_owner(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(Error::config(format!("Unknown user '{}'", name))),
        Err(e) => Err(Error::config(format!("Cannot look up user '{}': {}", name, e))),
    }
}

/// Resolve a group name or numeric id
pub fn resolve_group(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(Error::config(format!("Unknown group '{}'", name))),
        Err(e) => Err(Error::config(format!("Cannot look up group '{}': {}", name, e))),
    }
}

/// Give `path` the configured owner and group, falling back to the ones of
/// the file it replaces. Nothing is changed when the file already matches.
pub fn apply_ownership(path: &Path, create: &CreateMode, inherited: &FileStat) -> Result<()> {
    let uid = match &create.owner {
        Some(owner) => resolve_owner(owner)?,
        None => inherited.uid,
    };
    let gid = match &create.group {
        Some(group) => resolve_group(group)?,
        None => inherited.gid,
    };

    let current = FileStat::read(path)
        .map_err(Error::fs("stat", path))?
        .ok_or_else(|| Error::MissingFile(path.to_path_buf()))?;
    if current.uid == uid && current.gid == gid {
        return Ok(());
    }

    debug!("chown {}:{} {}", uid, gid, path.display());
    chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        .map_err(|errno| Error::fs("chown", path)(io::Error::from(errno)))
}

/// Apply an explicit security label with `chcon`. `None` means inherit: no
/// command runs and the file keeps the default label of its directory.
pub fn apply_security_context(
    runner: &dyn CommandRunner,
    path: &Path,
    context: Option<&str>,
) -> Result<()> {
    let Some(context) = context else {
        return Ok(());
    };

    let command = CommandSpec::new("chcon")
        .arg(context)
        .arg(path.display().to_string());
    let status = runner.run(&command)?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::fs("relabel", path)(io::Error::new(
            io::ErrorKind::Other,
            status.describe(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logrotor_hooks::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_numeric_and_named() {
        assert_eq!(resolve_owner("1234").unwrap(), 1234);
        assert_eq!(resolve_group("99").unwrap(), 99);
        assert_eq!(resolve_owner("root").unwrap(), 0);
        assert!(resolve_owner("no-such-user-logrotor").is_err());
        assert!(resolve_group("no-such-group-logrotor").is_err());
    }

    #[test]
    fn test_inherited_ownership_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "").unwrap();
        let stat = FileStat::read(&path).unwrap().unwrap();

        apply_ownership(&path, &CreateMode::default(), &stat).unwrap();
    }

    #[test]
    fn test_security_context() {
        let runner = RecordingRunner::new();
        let path = Path::new("/var/log/app.log");

        apply_security_context(&runner, path, None).unwrap();
        assert_eq!(runner.call_count(), 0);

        apply_security_context(&runner, path, Some("system_u:object_r:var_log_t:s0")).unwrap();
        let calls = runner.calls();
        assert_eq!(calls[0].program, "chcon");
        assert_eq!(
            calls[0].args,
            vec!["system_u:object_r:var_log_t:s0", "/var/log/app.log"]
        );

        let failing = RecordingRunner::new().failing_on("chcon");
        assert!(apply_security_context(&failing, path, Some("x")).is_err());
    }
}
