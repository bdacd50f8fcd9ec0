//! Per-file rotation steps
//!
//! A rotation is a fixed sequence: make room in the history, retire the live
//! file, recreate it, compress old copies, fix up metadata. Each step is
//! safe to repeat, so a run killed halfway is finished by the next one.

use chrono::{DateTime, Utc};
use logrotor_core::{CreateMode, Directives, Error, Result, RetireStrategy};
use logrotor_hooks::CommandRunner;
use logrotor_state::StateRecord;
use nix::errno::Errno;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::compress;
use crate::history::History;
use crate::metadata;
use crate::policy::FileStat;
use crate::report::RunReport;

/// Runs the steps for the files of one group
pub(crate) struct Executor<'a> {
    runner: &'a dyn CommandRunner,
    directives: &'a Directives,
    now: DateTime<Utc>,
}

impl<'a> Executor<'a> {
    pub fn new(runner: &'a dyn CommandRunner, directives: &'a Directives, now: DateTime<Utc>) -> Self {
        Self {
            runner,
            directives,
            now,
        }
    }

    /// Rotate a live file. Returns the timestamp to record.
    ///
    /// An `Err` means the rotation did not complete and no state should be
    /// recorded; the next run picks up from whatever was left on disk.
    pub fn rotate(&self, path: &Path, stat: &FileStat, report: &mut RunReport) -> Result<DateTime<Utc>> {
        let d = self.directives;
        let history = History::for_log(path, d);
        self.ensure_history_dir(&history)?;

        if let Some(days) = d.max_age_days {
            history.prune_expired(days, self.now)?;
        }
        history.make_room()?;
        let dest = history.next_path(self.now)?;

        verify_identity(path, stat)?;
        retire(path, &dest, d.strategy)?;
        info!("Retired {} -> {}", path.display(), dest.display());

        if d.rotate == 0 {
            debug!("No copies retained, removing {}", dest.display());
            fs::remove_file(&dest).map_err(Error::fs("remove", &dest))?;
        }

        if d.strategy == RetireStrategy::Rename {
            recreate(path, stat, &d.create)?;
            self.apply_metadata(path, stat, report);
        }

        self.compress(&history, report);
        Ok(self.stamp(&history))
    }

    /// Finish a rotation that stopped after the live file was retired
    pub fn recover(&self, path: &Path, report: &mut RunReport) -> Result<DateTime<Utc>> {
        let history = History::for_log(path, self.directives);
        let newest = history
            .newest()?
            .ok_or_else(|| Error::MissingFile(path.to_path_buf()))?;
        let template = FileStat::read(&newest.path)
            .map_err(Error::fs("stat", &newest.path))?
            .ok_or_else(|| Error::MissingFile(newest.path.clone()))?;

        warn!(
            "{} missing after an interrupted rotation, recreating",
            path.display()
        );
        recreate(path, &template, &self.directives.create)?;
        self.apply_metadata(path, &template, report);
        self.compress(&history, report);
        Ok(self.stamp(&history))
    }

    fn ensure_history_dir(&self, history: &History) -> Result<()> {
        let dir = history.dir();
        if dir.is_dir() {
            return Ok(());
        }
        if self.directives.create_olddir {
            info!("Creating history directory {}", dir.display());
            fs::create_dir_all(dir).map_err(Error::fs("create", dir))
        } else {
            Err(Error::fs("access", dir)(io::Error::new(
                io::ErrorKind::NotFound,
                "history directory does not exist",
            )))
        }
    }

    /// Compression problems never undo a completed rotation
    fn compress(&self, history: &History, report: &mut RunReport) {
        match compress::enforce_window(self.runner, &self.directives.compression, history) {
            Ok(failures) => failures.into_iter().for_each(|e| report.error(e)),
            Err(e) => {
                warn!("Cannot scan history of {}: {}", history.dir().display(), e);
                report.error(e);
            }
        }
    }

    /// Ownership and security label problems are warnings, the file is usable
    fn apply_metadata(&self, path: &Path, inherited: &FileStat, report: &mut RunReport) {
        if let Err(e) = metadata::apply_ownership(path, &self.directives.create, inherited) {
            warn!("{}", e);
            report.warn(e.to_string());
        }
        if let Err(e) = metadata::apply_security_context(
            self.runner,
            path,
            self.directives.security_context.as_deref(),
        ) {
            warn!("{}", e);
            report.warn(e.to_string());
        }
    }

    /// Rotation time to record: `now`, or the change time of the newest copy
    /// if that is later, so a finished rotation never looks interrupted.
    fn stamp(&self, history: &History) -> DateTime<Utc> {
        history
            .newest()
            .ok()
            .flatten()
            .and_then(|copy| DateTime::from_timestamp(copy.changed, 0))
            .map_or(self.now, |changed| changed.max(self.now))
    }
}

/// A missing live file needs recreation when the newest copy changed after
/// the last recorded rotation, i.e. a rename happened but the run that did
/// it never finished.
pub(crate) fn needs_recovery(
    path: &Path,
    directives: &Directives,
    record: Option<&StateRecord>,
) -> Result<bool> {
    if directives.strategy != RetireStrategy::Rename {
        return Ok(false);
    }
    let Some(newest) = History::for_log(path, directives).newest()? else {
        return Ok(false);
    };
    Ok(record.map_or(true, |r| newest.changed > r.last_rotated.timestamp()))
}

/// Fail if the file at `path` is no longer the one that was evaluated
fn verify_identity(path: &Path, expected: &FileStat) -> Result<()> {
    match FileStat::read(path).map_err(Error::fs("stat", path))? {
        Some(current) if current.same_file(expected) => Ok(()),
        _ => Err(Error::FileChanged(path.to_path_buf())),
    }
}

/// Move the live file's content to `dest`
fn retire(path: &Path, dest: &Path, strategy: RetireStrategy) -> Result<()> {
    match strategy {
        RetireStrategy::Rename => settle_rename(fs::rename(path, dest), path, dest),
        RetireStrategy::CopyTruncate => {
            copy_out(path, dest)?;
            OpenOptions::new()
                .write(true)
                .open(path)
                .and_then(|file| file.set_len(0))
                .map_err(Error::fs("truncate", path))
        }
        RetireStrategy::Copy => copy_out(path, dest),
    }
}

/// Fall back to copy and delete when a rename crossed devices
fn settle_rename(renamed: io::Result<()>, path: &Path, dest: &Path) -> Result<()> {
    match renamed {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(Errno::EXDEV as i32) => {
            debug!("{} is on another device, copying", dest.display());
            copy_out(path, dest)?;
            fs::remove_file(path).map_err(Error::fs("remove", path))
        }
        Err(e) => Err(Error::fs("rename", path)(e)),
    }
}

fn copy_out(path: &Path, dest: &Path) -> Result<()> {
    let result = fs::copy(path, dest).and_then(|_| {
        fs::OpenOptions::new()
            .write(true)
            .open(dest)
            .and_then(|file| file.sync_all())
    });
    if let Err(e) = result {
        let _ = fs::remove_file(dest);
        return Err(Error::fs("copy", path)(e));
    }
    Ok(())
}

/// Create an empty live file. An existing file, e.g. one the application
/// already reopened, is left alone.
fn recreate(path: &Path, template: &FileStat, create: &CreateMode) -> Result<()> {
    let mode = create.mode.unwrap_or(template.mode);
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
    {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!("{} already recreated", path.display());
            return Ok(());
        }
        Err(e) => return Err(Error::fs("create", path)(e)),
    }
    // The umask applies to the open above
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(Error::fs("chmod", path))
}
