//! Rotation policy evaluation
//!
//! [`evaluate`] is a pure function of the file's stat, its state record, the
//! group directives and the current time. It never touches the filesystem.

use chrono::{DateTime, Datelike, Duration, Local, Timelike, Utc};
use logrotor_core::{Directives, Interval};
use logrotor_state::StateRecord;
use serde::Serialize;
use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// The parts of a file's metadata the engine cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Birth time, when the filesystem records one
    pub created: Option<DateTime<Utc>>,
    /// Inode change time, whole seconds
    pub changed: i64,
    /// Permission bits
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub dev: u64,
    pub ino: u64,
}

impl FileStat {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .ok()
            .or_else(|| DateTime::from_timestamp(meta.mtime(), 0))
            .unwrap_or_default();
        Self {
            size: meta.len(),
            modified,
            created: meta.created().ok().map(DateTime::<Utc>::from),
            changed: meta.ctime(),
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    /// Stat a path, `None` when it does not exist
    pub fn read(path: &Path) -> io::Result<Option<Self>> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// When the file started collecting its current contents: the earlier
    /// of birth time and mtime. A busy log has a fresh mtime but an old
    /// birth time; a copied-in file can carry an mtime older than its birth.
    pub fn age_reference(&self) -> DateTime<Utc> {
        match self.created {
            Some(created) => created.min(self.modified),
            None => self.modified,
        }
    }

    /// Same device and inode
    pub fn same_file(&self, other: &FileStat) -> bool {
        self.dev == other.dev && self.ino == other.ino
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Missing,
    Empty,
    Excluded,
    NotDue,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Missing => "missing",
            SkipReason::Empty => "empty",
            SkipReason::Excluded => "excluded",
            SkipReason::NotDue => "not due",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Age,
    Size,
    Forced,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Age => "age",
            Trigger::Size => "size",
            Trigger::Forced => "forced",
        }
    }
}

/// Outcome of evaluating one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Skip(SkipReason),
    RotateNow(Trigger),
}

impl Decision {
    pub fn is_due(&self) -> bool {
        matches!(self, Decision::RotateNow(_))
    }

    pub fn label(&self) -> String {
        match self {
            Decision::Skip(reason) => format!("skip ({})", reason.as_str()),
            Decision::RotateNow(trigger) => format!("rotate ({})", trigger.as_str()),
        }
    }
}

/// Decide whether `path` should be rotated now.
///
/// `stat` is `None` for a file that does not exist. The reference time for
/// age checks is the last recorded rotation, or [`FileStat::age_reference`]
/// when the file has never been rotated.
pub fn evaluate(
    path: &Path,
    stat: Option<&FileStat>,
    record: Option<&StateRecord>,
    directives: &Directives,
    now: DateTime<Utc>,
    force: bool,
) -> Decision {
    if directives.excludes(path) {
        return Decision::Skip(SkipReason::Excluded);
    }
    let stat = match stat {
        Some(stat) => stat,
        None => return Decision::Skip(SkipReason::Missing),
    };
    if stat.size == 0 && !directives.if_empty {
        return Decision::Skip(SkipReason::Empty);
    }

    let reference = record
        .map(|r| r.last_rotated)
        .unwrap_or_else(|| stat.age_reference());

    if let Some(interval) = directives.interval {
        if interval_elapsed(interval, reference, now) {
            return Decision::RotateNow(Trigger::Age);
        }
    }

    if let Some(threshold) = directives.size {
        let min_age = Duration::days(i64::from(directives.min_age_days));
        if stat.size >= threshold && now - reference >= min_age {
            return Decision::RotateNow(Trigger::Size);
        }
    }

    if force {
        return Decision::RotateNow(Trigger::Forced);
    }
    Decision::Skip(SkipReason::NotDue)
}

/// Calendar check: has `interval` passed between `reference` and `now`
pub fn interval_elapsed(interval: Interval, reference: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if now <= reference {
        return false;
    }
    let then = reference.with_timezone(&Local);
    let current = now.with_timezone(&Local);

    match interval {
        Interval::Hourly => {
            (then.date_naive(), then.hour()) != (current.date_naive(), current.hour())
        }
        Interval::Daily => then.date_naive() != current.date_naive(),
        Interval::Weekly => {
            then.iso_week() != current.iso_week() || now - reference >= Duration::days(7)
        }
        Interval::Monthly => (then.year(), then.month()) != (current.year(), current.month()),
        Interval::Yearly => then.year() != current.year(),
        Interval::Days(days) => now - reference >= Duration::days(i64::from(days)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn stat(size: u64, modified: DateTime<Utc>) -> FileStat {
        FileStat {
            size,
            modified,
            created: None,
            changed: modified.timestamp(),
            mode: 0o644,
            uid: 0,
            gid: 0,
            dev: 1,
            ino: 1,
        }
    }

    fn record(at: DateTime<Utc>) -> StateRecord {
        StateRecord::new(PathBuf::from("/var/log/app.log"), at, 1)
    }

    fn path() -> &'static Path {
        Path::new("/var/log/app.log")
    }

    #[test]
    fn test_missing_and_empty() {
        let now = local(2026, 5, 10, 12, 0);
        let d = Directives::default().with_size(1);

        assert_eq!(
            evaluate(path(), None, None, &d, now, true),
            Decision::Skip(SkipReason::Missing)
        );

        let mut no_empty = d.clone();
        no_empty.if_empty = false;
        let empty = stat(0, now);
        assert_eq!(
            evaluate(path(), Some(&empty), None, &no_empty, now, true),
            Decision::Skip(SkipReason::Empty)
        );
    }

    #[test]
    fn test_excluded_wins_over_force() {
        let now = local(2026, 5, 10, 12, 0);
        let mut d = Directives::default();
        d.exclude = vec!["app.*".to_string()];
        assert_eq!(
            evaluate(path(), Some(&stat(10, now)), None, &d, now, true),
            Decision::Skip(SkipReason::Excluded)
        );
    }

    #[test]
    fn test_nothing_configured_is_never_due() {
        let now = local(2026, 5, 10, 12, 0);
        let old = local(2020, 1, 1, 0, 0);
        let d = Directives::default();

        assert_eq!(
            evaluate(path(), Some(&stat(1 << 30, old)), Some(&record(old)), &d, now, false),
            Decision::Skip(SkipReason::NotDue)
        );
        assert_eq!(
            evaluate(path(), Some(&stat(1, old)), None, &d, now, true),
            Decision::RotateNow(Trigger::Forced)
        );
    }

    #[test]
    fn test_daily_uses_local_dates() {
        let d = Directives::default().with_interval(Interval::Daily);
        let last = local(2026, 5, 10, 23, 50);
        let s = stat(10, last);

        let same_day = local(2026, 5, 10, 23, 59);
        assert!(!evaluate(path(), Some(&s), Some(&record(last)), &d, same_day, false).is_due());

        let next_day = local(2026, 5, 11, 0, 5);
        assert_eq!(
            evaluate(path(), Some(&s), Some(&record(last)), &d, next_day, false),
            Decision::RotateNow(Trigger::Age)
        );
    }

    #[test]
    fn test_record_takes_precedence_over_mtime() {
        let d = Directives::default().with_interval(Interval::Daily);
        let now = local(2026, 5, 11, 9, 0);
        let written_yesterday = stat(10, local(2026, 5, 10, 9, 0));
        let rotated_today = record(local(2026, 5, 11, 1, 0));

        assert!(evaluate(path(), Some(&written_yesterday), None, &d, now, false).is_due());
        assert!(!evaluate(
            path(),
            Some(&written_yesterday),
            Some(&rotated_today),
            &d,
            now,
            false
        )
        .is_due());
    }

    #[test]
    fn test_unrecorded_busy_log_ages_from_birth() {
        let now = local(2026, 5, 11, 9, 0);
        let busy = FileStat {
            created: Some(local(2026, 5, 9, 8, 0)),
            ..stat(10, local(2026, 5, 11, 8, 59))
        };

        let daily = Directives::default().with_interval(Interval::Daily);
        assert_eq!(
            evaluate(path(), Some(&busy), None, &daily, now, false),
            Decision::RotateNow(Trigger::Age)
        );

        let sized = Directives::default().with_size(5).with_min_age(1);
        assert_eq!(
            evaluate(path(), Some(&busy), None, &sized, now, false),
            Decision::RotateNow(Trigger::Size)
        );

        // No birth time recorded: mtime is all there is
        let unknown = FileStat { created: None, ..busy };
        assert!(!evaluate(path(), Some(&unknown), None, &daily, now, false).is_due());
    }

    #[test]
    fn test_calendar_intervals() {
        let jan31 = local(2026, 1, 31, 12, 0);
        let feb1 = local(2026, 2, 1, 12, 0);
        assert!(interval_elapsed(Interval::Monthly, jan31, feb1));
        assert!(!interval_elapsed(Interval::Yearly, jan31, feb1));
        assert!(interval_elapsed(Interval::Yearly, local(2025, 12, 31, 23, 0), local(2026, 1, 1, 1, 0)));

        assert!(interval_elapsed(Interval::Hourly, local(2026, 3, 3, 10, 59), local(2026, 3, 3, 11, 0)));
        assert!(!interval_elapsed(Interval::Hourly, local(2026, 3, 3, 10, 0), local(2026, 3, 3, 10, 59)));

        // 2026-03-02 is a Monday
        let sunday = local(2026, 3, 1, 12, 0);
        let monday = local(2026, 3, 2, 12, 0);
        let tuesday = local(2026, 3, 3, 12, 0);
        assert!(interval_elapsed(Interval::Weekly, sunday, monday));
        assert!(!interval_elapsed(Interval::Weekly, monday, tuesday));

        assert!(!interval_elapsed(Interval::Days(3), monday, local(2026, 3, 5, 11, 0)));
        assert!(interval_elapsed(Interval::Days(3), monday, local(2026, 3, 5, 12, 0)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_due() {
        let later = local(2026, 6, 1, 0, 0);
        let earlier = local(2026, 5, 1, 0, 0);
        assert!(!interval_elapsed(Interval::Daily, later, earlier));
    }

    #[test]
    fn test_size_honors_min_age() {
        let d = Directives::default().with_size(100).with_min_age(2);
        let last = local(2026, 5, 10, 12, 0);
        let big = stat(500, last);
        let small = stat(50, last);

        let one_day_later = local(2026, 5, 11, 12, 0);
        assert!(!evaluate(path(), Some(&big), Some(&record(last)), &d, one_day_later, false).is_due());

        let two_days_later = local(2026, 5, 12, 12, 0);
        assert_eq!(
            evaluate(path(), Some(&big), Some(&record(last)), &d, two_days_later, false),
            Decision::RotateNow(Trigger::Size)
        );
        assert!(!evaluate(path(), Some(&small), Some(&record(last)), &d, two_days_later, false).is_due());
    }

    #[test]
    fn test_size_or_age() {
        // Weekly interval plus a size threshold guarded by a 1 day floor
        let d = Directives::default()
            .with_interval(Interval::Weekly)
            .with_size(100)
            .with_min_age(1);
        let last = local(2026, 3, 2, 12, 0);

        let same_week = local(2026, 3, 4, 12, 0);
        assert_eq!(
            evaluate(path(), Some(&stat(200, last)), Some(&record(last)), &d, same_week, false),
            Decision::RotateNow(Trigger::Size)
        );
        assert!(!evaluate(path(), Some(&stat(10, last)), Some(&record(last)), &d, same_week, false).is_due());

        // Big file, too soon for the size floor, but a new week
        let next_monday = local(2026, 3, 9, 0, 30);
        let late_sunday = local(2026, 3, 8, 23, 0);
        assert_eq!(
            evaluate(
                path(),
                Some(&stat(200, late_sunday)),
                Some(&record(late_sunday)),
                &d,
                next_monday,
                false
            ),
            Decision::RotateNow(Trigger::Age)
        );
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(Decision::Skip(SkipReason::NotDue).label(), "skip (not due)");
        assert_eq!(Decision::RotateNow(Trigger::Size).label(), "rotate (size)");
    }
}
