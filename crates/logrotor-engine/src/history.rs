//! Rotated copies of a log file
//!
//! Two naming schemes are supported. Numbered copies are `<name>.1` (newest)
//! through `<name>.<rotate>`; dated copies are `<name><dateformat>` with a
//! `-N` counter when two rotations land on the same name. Either kind may
//! carry the compression extension.

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::{DateTime, Duration, Local, Utc};
use logrotor_core::{Directives, Error, Result};
use std::collections::HashSet;
use std::fmt::Write;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// One rotated copy on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCopy {
    pub path: PathBuf,
    /// 1 for the newest copy. For numbered copies this is the number itself.
    pub rank: u32,
    pub compressed: bool,
    pub modified: SystemTime,
    /// Inode change time, whole seconds
    pub changed: i64,
}

#[derive(Debug, Clone)]
enum Naming {
    Numbered,
    Dated(String),
}

/// History of a single log file
#[derive(Debug, Clone)]
pub struct History {
    dir: PathBuf,
    base: String,
    extension: String,
    naming: Naming,
    rotate: u32,
}

impl History {
    pub fn for_log(log: &Path, directives: &Directives) -> Self {
        let base = log
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let naming = if directives.dateext {
            Naming::Dated(directives.date_format.clone())
        } else {
            Naming::Numbered
        };
        Self {
            dir: directives.history_dir(log),
            base,
            extension: directives.compression.extension.clone(),
            naming,
            rotate: directives.rotate,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All copies, newest first
    pub fn copies(&self) -> Result<Vec<HistoryCopy>> {
        let mut copies = self.scan()?;
        self.drop_twins(&mut copies, |_| {});
        self.rank(&mut copies);
        Ok(copies)
    }

    /// The most recent copy, if any
    pub fn newest(&self) -> Result<Option<HistoryCopy>> {
        Ok(self.copies()?.into_iter().next())
    }

    /// Delete copies last modified more than `days` days before `now`
    pub fn prune_expired(&self, days: u32, now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
        let cutoff: SystemTime = (now - Duration::days(i64::from(days))).into();
        let mut removed = Vec::new();
        for copy in self.scan()? {
            if copy.modified < cutoff {
                info!("Removing expired copy {}", copy.path.display());
                remove(&copy.path)?;
                removed.push(copy.path);
            }
        }
        Ok(removed)
    }

    /// Free the slot for a new copy and enforce retention, leaving room for
    /// exactly one more copy. Returns the paths that were deleted.
    pub fn make_room(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        let mut copies = self.scan()?;
        let mut twin_error = None;
        self.drop_twins(&mut copies, |path| {
            debug!("Removing uncompressed twin {}", path.display());
            match remove(path) {
                Ok(()) => removed.push(path.to_path_buf()),
                Err(e) => twin_error = Some(e),
            }
        });
        if let Some(e) = twin_error {
            return Err(e);
        }

        match self.naming {
            Naming::Numbered => self.shift_numbered(copies, &mut removed)?,
            Naming::Dated(_) => self.trim_dated(copies, &mut removed)?,
        }
        Ok(removed)
    }

    /// Path the next retired copy is written to
    pub fn next_path(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        match &self.naming {
            Naming::Numbered => Ok(self.numbered_path(1, false)),
            Naming::Dated(format) => {
                let mut stamp = String::new();
                write!(stamp, "{}", now.with_timezone(&Local).format(format))
                    .map_err(|_| Error::config(format!("Invalid dateformat '{}'", format)))?;
                let name = format!("{}{}", self.base, stamp);

                let mut candidate = name.clone();
                let mut counter = 0;
                while self.taken(&candidate) {
                    counter += 1;
                    candidate = format!("{}-{}", name, counter);
                }
                Ok(self.dir.join(candidate))
            }
        }
    }

    /// Path of a compressed copy of `path`
    pub fn compressed_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(&self.extension);
        PathBuf::from(name)
    }

    fn taken(&self, name: &str) -> bool {
        let plain = self.dir.join(name);
        plain.exists() || self.compressed_path(&plain).exists()
    }

    fn numbered_path(&self, index: u32, compressed: bool) -> PathBuf {
        let ext = if compressed { self.extension.as_str() } else { "" };
        self.dir.join(format!("{}.{}{}", self.base, index, ext))
    }

    /// Renumber so the copies become 2..=n+1 in age order, dropping any
    /// that would land past the retention count. Copies already sitting at
    /// their target number are left alone, so an interrupted shift is not
    /// applied twice.
    fn shift_numbered(&self, mut copies: Vec<HistoryCopy>, removed: &mut Vec<PathBuf>) -> Result<()> {
        copies.sort_by_key(|c| c.rank);

        let mut moves = Vec::new();
        for (position, copy) in copies.into_iter().enumerate() {
            let target = position as u32 + 2;
            if target > self.rotate {
                debug!("Removing {} past retention", copy.path.display());
                remove(&copy.path)?;
                removed.push(copy.path);
            } else if target != copy.rank {
                moves.push((copy, target));
            }
        }

        // Upward moves from the top down, then downward moves from the bottom up
        let (mut up, mut down): (Vec<_>, Vec<_>) =
            moves.into_iter().partition(|(copy, target)| *target > copy.rank);
        up.sort_by(|a, b| b.0.rank.cmp(&a.0.rank));
        down.sort_by_key(|(copy, _)| copy.rank);

        for (copy, target) in up.into_iter().chain(down) {
            let dest = self.numbered_path(target, copy.compressed);
            debug!("{} -> {}", copy.path.display(), dest.display());
            fs::rename(&copy.path, &dest).map_err(Error::fs("rename", &copy.path))?;
        }
        Ok(())
    }

    fn trim_dated(&self, mut copies: Vec<HistoryCopy>, removed: &mut Vec<PathBuf>) -> Result<()> {
        self.rank(&mut copies);
        let keep = self.rotate.saturating_sub(1) as usize;
        for copy in copies.into_iter().skip(keep) {
            debug!("Removing {} past retention", copy.path.display());
            remove(&copy.path)?;
            removed.push(copy.path);
        }
        Ok(())
    }

    /// When both `x` and `x<ext>` exist the compressed one is complete, since
    /// compression only renames its output into place after success. Drop
    /// the uncompressed twin from `copies`, handing each one to `on_twin`.
    fn drop_twins<F: FnMut(&Path)>(&self, copies: &mut Vec<HistoryCopy>, mut on_twin: F) {
        let compressed: HashSet<PathBuf> = copies
            .iter()
            .filter(|c| c.compressed)
            .map(|c| c.path.clone())
            .collect();
        copies.retain(|copy| {
            let twin = !copy.compressed && compressed.contains(&self.compressed_path(&copy.path));
            if twin {
                on_twin(&copy.path);
            }
            !twin
        });
    }

    /// Sort newest first and assign ranks
    fn rank(&self, copies: &mut [HistoryCopy]) {
        match self.naming {
            Naming::Numbered => copies.sort_by_key(|c| c.rank),
            Naming::Dated(_) => {
                copies.sort_by(|a, b| {
                    b.modified
                        .cmp(&a.modified)
                        .then_with(|| b.path.cmp(&a.path))
                });
                for (i, copy) in copies.iter_mut().enumerate() {
                    copy.rank = i as u32 + 1;
                }
            }
        }
    }

    fn scan(&self) -> Result<Vec<HistoryCopy>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::fs("read", &self.dir)(e)),
        };

        let mut copies = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::fs("read", &self.dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((rank, compressed)) = self.classify(&name) else {
                continue;
            };
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            copies.push(HistoryCopy {
                path: entry.path(),
                rank,
                compressed,
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                changed: meta.ctime(),
            });
        }
        Ok(copies)
    }

    /// Recognize a file name as one of our copies
    fn classify(&self, name: &str) -> Option<(u32, bool)> {
        let rest = name.strip_prefix(&self.base)?;
        let (rest, compressed) = match rest.strip_suffix(&self.extension) {
            Some(stripped) if !self.extension.is_empty() => (stripped, true),
            _ => (rest, false),
        };

        match &self.naming {
            Naming::Numbered => {
                let digits = rest.strip_prefix('.')?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let index: u32 = digits.parse().ok()?;
                (index > 0).then_some((index, compressed))
            }
            Naming::Dated(format) => {
                if matches_date(rest, format) {
                    return Some((0, compressed));
                }
                // Collision counter
                let (stamp, counter) = rest.rsplit_once('-')?;
                if !counter.is_empty()
                    && counter.bytes().all(|b| b.is_ascii_digit())
                    && matches_date(stamp, format)
                {
                    Some((0, compressed))
                } else {
                    None
                }
            }
        }
    }
}

fn matches_date(text: &str, format: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let mut parsed = Parsed::new();
    parse(&mut parsed, text, StrftimeItems::new(format)).is_ok()
}

fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::fs("remove", path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn setup(rotate: u32) -> (TempDir, PathBuf, Directives) {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("app.log");
        fs::write(&log, "live").unwrap();
        (dir, log, Directives::default().with_rotate(rotate))
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn write_aged(path: &Path, content: &str, age_secs: u64) {
        fs::write(path, content).unwrap();
        let when = SystemTime::now() - StdDuration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn test_shift_numbered() {
        let (dir, log, d) = setup(3);
        fs::write(dir.path().join("app.log.1"), "1").unwrap();
        fs::write(dir.path().join("app.log.2.gz"), "2").unwrap();
        fs::write(dir.path().join("app.log.3.gz"), "3").unwrap();

        let history = History::for_log(&log, &d);
        let removed = history.make_room().unwrap();

        assert_eq!(removed, vec![dir.path().join("app.log.3.gz")]);
        assert_eq!(names(dir.path()), vec!["app.log", "app.log.2", "app.log.3.gz"]);
        assert_eq!(fs::read_to_string(dir.path().join("app.log.2")).unwrap(), "1");
        assert_eq!(fs::read_to_string(dir.path().join("app.log.3.gz")).unwrap(), "2");
        assert_eq!(history.next_path(Utc::now()).unwrap(), dir.path().join("app.log.1"));
    }

    #[test]
    fn test_shift_is_gap_closing() {
        let (dir, log, d) = setup(4);
        // An earlier run shifted but never retired
        fs::write(dir.path().join("app.log.2"), "a").unwrap();
        fs::write(dir.path().join("app.log.3"), "b").unwrap();
        fs::write(dir.path().join("app.log.4"), "c").unwrap();

        History::for_log(&log, &d).make_room().unwrap();
        assert_eq!(
            names(dir.path()),
            vec!["app.log", "app.log.2", "app.log.3", "app.log.4"]
        );
        assert_eq!(fs::read_to_string(dir.path().join("app.log.2")).unwrap(), "a");

        // Holes are closed
        fs::remove_file(dir.path().join("app.log.3")).unwrap();
        fs::rename(dir.path().join("app.log.4"), dir.path().join("app.log.9")).unwrap();
        History::for_log(&log, &d).make_room().unwrap();
        assert_eq!(names(dir.path()), vec!["app.log", "app.log.2", "app.log.3"]);
        assert_eq!(fs::read_to_string(dir.path().join("app.log.3")).unwrap(), "c");
    }

    #[test]
    fn test_uncompressed_twin_removed() {
        let (dir, log, d) = setup(5);
        fs::write(dir.path().join("app.log.2"), "partial").unwrap();
        fs::write(dir.path().join("app.log.2.gz"), "done").unwrap();

        History::for_log(&log, &d).make_room().unwrap();
        assert_eq!(names(dir.path()), vec!["app.log", "app.log.2.gz"]);
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let (dir, log, d) = setup(1);
        fs::write(dir.path().join("app.log.old"), "").unwrap();
        fs::write(dir.path().join("app.log.1.gz.tmp"), "").unwrap();
        fs::write(dir.path().join("other.log.1"), "").unwrap();

        let history = History::for_log(&log, &d);
        assert!(history.copies().unwrap().is_empty());
        history.make_room().unwrap();
        assert_eq!(names(dir.path()).len(), 4);
    }

    #[test]
    fn test_rotate_zero_clears_history() {
        let (dir, log, d) = setup(0);
        fs::write(dir.path().join("app.log.1"), "").unwrap();
        History::for_log(&log, &d).make_room().unwrap();
        assert_eq!(names(dir.path()), vec!["app.log"]);
    }

    #[test]
    fn test_olddir_relative_to_log() {
        let (dir, log, mut d) = setup(2);
        d.olddir = Some(PathBuf::from("archive"));
        let history = History::for_log(&log, &d);
        assert_eq!(history.dir(), dir.path().join("archive"));
        // Missing directory reads as empty history
        assert!(history.copies().unwrap().is_empty());
        assert_eq!(
            history.next_path(Utc::now()).unwrap(),
            dir.path().join("archive").join("app.log.1")
        );
    }

    #[test]
    fn test_dated_names_and_collisions() {
        let (dir, log, d) = setup(5);
        let d = d.with_dateext("-%Y%m%d");
        let now = Local
            .with_ymd_and_hms(2026, 4, 7, 10, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        let history = History::for_log(&log, &d);

        let first = history.next_path(now).unwrap();
        assert_eq!(first, dir.path().join("app.log-20260407"));

        fs::write(dir.path().join("app.log-20260407.gz"), "").unwrap();
        assert_eq!(
            history.next_path(now).unwrap(),
            dir.path().join("app.log-20260407-1")
        );
        fs::write(dir.path().join("app.log-20260407-1"), "").unwrap();
        assert_eq!(
            history.next_path(now).unwrap(),
            dir.path().join("app.log-20260407-2")
        );

        let copies = history.copies().unwrap();
        assert_eq!(copies.len(), 2);
    }

    #[test]
    fn test_dated_retention_keeps_newest() {
        let (dir, log, d) = setup(3);
        let d = d.with_dateext("-%Y%m%d");
        write_aged(&dir.path().join("app.log-20260101.gz"), "", 4000);
        write_aged(&dir.path().join("app.log-20260102.gz"), "", 3000);
        write_aged(&dir.path().join("app.log-20260103"), "", 2000);
        write_aged(&dir.path().join("app.log-20260104"), "", 1000);

        let history = History::for_log(&log, &d);
        history.make_room().unwrap();

        // Two old copies kept, leaving room for the next one
        assert_eq!(
            names(dir.path()),
            vec!["app.log", "app.log-20260103", "app.log-20260104"]
        );
        let copies = history.copies().unwrap();
        assert_eq!(copies[0].path, dir.path().join("app.log-20260104"));
        assert_eq!(copies[0].rank, 1);
        assert_eq!(copies[1].rank, 2);
    }

    #[test]
    fn test_prune_expired() {
        let (dir, log, d) = setup(9);
        write_aged(&dir.path().join("app.log.1"), "", 60);
        write_aged(&dir.path().join("app.log.2.gz"), "", 3 * 86_400);

        let history = History::for_log(&log, &d);
        let removed = history.prune_expired(2, Utc::now()).unwrap();
        assert_eq!(removed, vec![dir.path().join("app.log.2.gz")]);
        assert_eq!(names(dir.path()), vec!["app.log", "app.log.1"]);
    }
}
