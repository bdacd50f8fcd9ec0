//! Core types for logrotor: log groups and their rotation directives

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Size values: plain bytes or a number with a k/M/G suffix (powers of 1024)
static SIZE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*([kKmMgG]?)[bB]?\s*$").expect("Invalid size regex")
});

/// Parse a human size like `100k`, `10M` or `1G` into bytes
pub fn parse_size(value: &str) -> Result<u64> {
    let caps = SIZE_REGEX
        .captures(value)
        .ok_or_else(|| Error::config(format!("Invalid size '{}'", value)))?;
    let number: u64 = caps[1]
        .parse()
        .map_err(|_| Error::config(format!("Size out of range '{}'", value)))?;
    let multiplier: u64 = match &caps[2] {
        "k" | "K" => 1024,
        "m" | "M" => 1024 * 1024,
        "g" | "G" => 1024 * 1024 * 1024,
        _ => 1,
    };
    number
        .checked_mul(multiplier)
        .ok_or_else(|| Error::config(format!("Size out of range '{}'", value)))
}

/// Parse an octal permission string like `0640`
pub fn parse_mode(value: &str) -> Result<u32> {
    let mode = u32::from_str_radix(value.trim(), 8)
        .map_err(|_| Error::config(format!("Invalid file mode '{}'", value)))?;
    if mode > 0o7777 {
        return Err(Error::config(format!("Invalid file mode '{}'", value)));
    }
    Ok(mode)
}

/// Calendar rotation interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Explicit number of days between rotations
    Days(u32),
}

impl Interval {
    pub fn as_str(&self) -> String {
        match self {
            Interval::Hourly => "hourly".to_string(),
            Interval::Daily => "daily".to_string(),
            Interval::Weekly => "weekly".to_string(),
            Interval::Monthly => "monthly".to_string(),
            Interval::Yearly => "yearly".to_string(),
            Interval::Days(n) => format!("{}d", n),
        }
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "hourly" => Ok(Interval::Hourly),
            "daily" => Ok(Interval::Daily),
            "weekly" => Ok(Interval::Weekly),
            "monthly" => Ok(Interval::Monthly),
            "yearly" | "annually" => Ok(Interval::Yearly),
            other => {
                let digits = other
                    .strip_suffix("days")
                    .or_else(|| other.strip_suffix('d'))
                    .unwrap_or(other)
                    .trim();
                match digits.parse::<u32>() {
                    Ok(0) => Err(Error::config("Interval of 0 days is not allowed")),
                    Ok(n) => Ok(Interval::Days(n)),
                    Err(_) => Err(Error::config(format!("Unknown interval '{}'", s))),
                }
            }
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the live file is retired into history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetireStrategy {
    /// Rename the live file away and create a fresh one
    #[default]
    Rename,
    /// Copy the content out and truncate the live file in place
    CopyTruncate,
    /// Copy the content out and leave the live file untouched
    Copy,
}

impl FromStr for RetireStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "rename" | "create" => Ok(RetireStrategy::Rename),
            "copytruncate" => Ok(RetireStrategy::CopyTruncate),
            "copy" => Ok(RetireStrategy::Copy),
            _ => Err(Error::config(format!("Unknown rotation strategy '{}'", s))),
        }
    }
}

/// What to do when a configured log file does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    #[default]
    Error,
    Ignore,
}

impl MissingPolicy {
    /// Turn a missing file into an error, or nothing when missing files are fine
    pub fn handle(&self, path: &Path) -> Option<Error> {
        match self {
            MissingPolicy::Error => Some(Error::MissingFile(path.to_path_buf())),
            MissingPolicy::Ignore => None,
        }
    }
}

impl FromStr for MissingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(MissingPolicy::Error),
            "ignore" | "ok" => Ok(MissingPolicy::Ignore),
            _ => Err(Error::config(format!("Unknown missing-file policy '{}'", s))),
        }
    }
}

/// Permissions and ownership for the recreated live file.
/// `None` fields are inherited from the file being rotated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateMode {
    pub mode: Option<u32>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

/// Compression settings for retired copies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    pub enabled: bool,
    pub command: String,
    pub options: Vec<String>,
    pub extension: String,
    /// Number of most recent copies left uncompressed
    pub delay: u32,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            enabled: false,
            command: DEFAULT_COMPRESS_COMMAND.to_string(),
            options: DEFAULT_COMPRESS_OPTIONS.iter().map(|s| s.to_string()).collect(),
            extension: DEFAULT_COMPRESS_EXT.to_string(),
            delay: 0,
        }
    }
}

/// Hook commands attached to a log group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    /// Runs once before the first rotated file of the group
    pub first_action: Option<String>,
    /// Runs before each file (or once for all files with shared hooks)
    pub pre_rotate: Option<String>,
    /// Runs after each file (or once for all files with shared hooks)
    pub post_rotate: Option<String>,
    /// Runs once after the last rotated file of the group
    pub last_action: Option<String>,
}

/// Points in the rotation sequence where hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    FirstAction,
    PreRotate,
    PostRotate,
    LastAction,
}

impl HookStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::FirstAction => "firstaction",
            HookStage::PreRotate => "prerotate",
            HookStage::PostRotate => "postrotate",
            HookStage::LastAction => "lastaction",
        }
    }
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved rotation directives for one log group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    /// Number of rotated copies to keep
    pub rotate: u32,
    /// Rotate once the file reaches this many bytes
    pub size: Option<u64>,
    /// Rotate on this calendar interval
    pub interval: Option<Interval>,
    /// Minimum days since the last rotation before a size trigger is honored
    pub min_age_days: u32,
    pub compression: Compression,
    pub strategy: RetireStrategy,
    pub missing: MissingPolicy,
    /// Rotate files that are empty
    pub if_empty: bool,
    pub create: CreateMode,
    /// Explicit security label for the recreated file
    pub security_context: Option<String>,
    /// Directory for rotated copies, relative to the log's directory
    pub olddir: Option<PathBuf>,
    pub create_olddir: bool,
    /// Name copies with a date suffix instead of a number
    pub dateext: bool,
    pub date_format: String,
    /// Run pre/post hooks once per group instead of once per file
    pub shared_hooks: bool,
    pub hooks: Hooks,
    /// Remove rotated copies older than this many days
    pub max_age_days: Option<u32>,
    /// Glob patterns for files this group never rotates
    pub exclude: Vec<String>,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            rotate: DEFAULT_ROTATE_COUNT,
            size: None,
            interval: None,
            min_age_days: 0,
            compression: Compression::default(),
            strategy: RetireStrategy::default(),
            missing: MissingPolicy::default(),
            if_empty: true,
            create: CreateMode::default(),
            security_context: None,
            olddir: None,
            create_olddir: false,
            dateext: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            shared_hooks: false,
            hooks: Hooks::default(),
            max_age_days: None,
            exclude: Vec::new(),
        }
    }
}

impl Directives {
    /// Directory that holds the rotated copies of `log`
    pub fn history_dir(&self, log: &Path) -> PathBuf {
        let parent = log.parent().unwrap_or_else(|| Path::new("/"));
        match &self.olddir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => parent.join(dir),
            None => parent.to_path_buf(),
        }
    }

    /// Check if a path is excluded by this group's patterns.
    /// Patterns are matched against the full path and the file name.
    pub fn excludes(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.exclude.iter().any(|p| match glob::Pattern::new(p) {
            Ok(pattern) => pattern.matches(&full) || pattern.matches(&name),
            Err(_) => false,
        })
    }

    pub fn with_rotate(mut self, rotate: u32) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size = Some(bytes);
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_min_age(mut self, days: u32) -> Self {
        self.min_age_days = days;
        self
    }

    pub fn with_strategy(mut self, strategy: RetireStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_compression(mut self, delay: u32) -> Self {
        self.compression.enabled = true;
        self.compression.delay = delay;
        self
    }

    pub fn with_missing(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks, shared: bool) -> Self {
        self.hooks = hooks;
        self.shared_hooks = shared;
        self
    }

    pub fn with_dateext(mut self, format: &str) -> Self {
        self.dateext = true;
        self.date_format = format.to_string();
        self
    }
}

/// A configuration unit: file patterns plus the directives that govern them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub name: String,
    pub patterns: Vec<String>,
    pub directives: Directives,
}

impl LogGroup {
    pub fn new<S: Into<String>>(name: S, patterns: Vec<String>, directives: Directives) -> Self {
        Self {
            name: name.into(),
            patterns,
            directives,
        }
    }
}
