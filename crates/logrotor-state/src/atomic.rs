//! Atomic file replacement
//!
//! Content goes to a sibling temp file, is synced, then renamed over the
//! target. A crash leaves either the old file or the new one, never a
//! truncated mix.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temp path used while replacing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Atomically write content to a file
pub fn atomic_write(path: &Path, content: &str, mode: u32) -> io::Result<()> {
    let temp = temp_path(path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let result = (|| {
        let mut file = options.open(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
        return result;
    }

    // Make the rename itself durable
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");

        atomic_write(&path, "one\n", 0o644).unwrap();
        atomic_write(&path, "two\n", 0o644).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state");

        atomic_write(&path, "content", 0o644).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_failed_write_keeps_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        atomic_write(&path, "old", 0o644).unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir(temp_path(&path)).unwrap();
        assert!(atomic_write(&path, "new", 0o644).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/var/lib/logrotor.status")),
            PathBuf::from("/var/lib/logrotor.status.tmp")
        );
    }
}
