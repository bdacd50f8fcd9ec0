//! Advisory lock that keeps two runs off the same state file

use anyhow::{anyhow, Context, Result};
use logrotor_core::lock_path;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

/// Held for the duration of a run; released on drop
pub struct RunLock {
    _guard: Flock<File>,
}

impl RunLock {
    /// Take an exclusive `flock` on `<state>.lock` without waiting
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let path = lock_path(state_path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Cannot open lock file {}", path.display()))?;

        let guard = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                anyhow!("Another run holds {}", path.display())
            } else {
                anyhow!("Cannot lock {}: {}", path.display(), errno)
            }
        })?;

        debug!("Locked {}", path.display());
        Ok(Self { _guard: guard })
    }
}
