//! Compression of retired copies

use logrotor_core::{Compression, Error, Result};
use logrotor_hooks::{CommandRunner, CommandSpec};
use logrotor_state::atomic::temp_path;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::history::{History, HistoryCopy};

/// Compress `source` into `target` by piping it through the configured command.
///
/// Output goes to a temp file that is renamed into place only after the
/// command succeeds, so a compressed copy on disk is always complete. On
/// failure the uncompressed source is left untouched.
pub fn compress_file(
    runner: &dyn CommandRunner,
    compression: &Compression,
    source: &Path,
    target: &Path,
) -> Result<()> {
    let temp = temp_path(target);
    let command = CommandSpec::new(compression.command.as_str())
        .args(compression.options.iter().cloned())
        .stdin_from(source.to_path_buf())
        .stdout_to(temp.clone());

    debug!("Compressing {} -> {}", source.display(), target.display());
    let failure = match runner.run(&command) {
        Ok(status) if status.success() => None,
        Ok(status) => Some(status.describe()),
        Err(e) => Some(e.to_string()),
    };
    if let Some(message) = failure {
        let _ = fs::remove_file(&temp);
        return Err(Error::CompressionFailed {
            path: source.to_path_buf(),
            message,
        });
    }

    let finish = || -> Result<()> {
        let perms = fs::metadata(source)
            .map_err(Error::fs("stat", source))?
            .permissions();
        fs::set_permissions(&temp, perms).map_err(Error::fs("chmod", &temp))?;
        fs::rename(&temp, target).map_err(Error::fs("rename", &temp))?;
        Ok(())
    };
    if let Err(e) = finish() {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    fs::remove_file(source).map_err(Error::fs("remove", source))?;
    Ok(())
}

/// Compress every uncompressed copy outside the delay window.
/// Failures are collected so one bad copy does not stop the others.
pub fn enforce_window(
    runner: &dyn CommandRunner,
    compression: &Compression,
    history: &History,
) -> Result<Vec<Error>> {
    if !compression.enabled {
        return Ok(Vec::new());
    }

    let mut failures = Vec::new();
    for copy in pending(history.copies()?, compression.delay) {
        let target: PathBuf = history.compressed_path(&copy.path);
        match compress_file(runner, compression, &copy.path, &target) {
            Ok(()) => info!("Compressed {}", target.display()),
            Err(e) => {
                warn!("{}", e);
                failures.push(e);
            }
        }
    }
    Ok(failures)
}

fn pending(copies: Vec<HistoryCopy>, delay: u32) -> impl Iterator<Item = HistoryCopy> {
    copies
        .into_iter()
        .filter(move |c| !c.compressed && c.rank > delay)
}
