//! State records and their one-line text encoding
//!
//! Each record is written as `"<path>" <timestamp> <count>`. The path is
//! quoted with `\` escapes so paths containing spaces survive. Readers ignore
//! any trailing fields they do not understand.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Last rotation metadata for one log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub path: PathBuf,
    pub last_rotated: DateTime<Utc>,
    /// Number of rotations performed, never decreases
    pub rotations: u64,
}

impl StateRecord {
    pub fn new(path: PathBuf, last_rotated: DateTime<Utc>, rotations: u64) -> Self {
        Self {
            path,
            last_rotated,
            rotations,
        }
    }

    /// Encode as a single state file line (without newline)
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}",
            quote_path(&self.path),
            self.last_rotated.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.rotations
        )
    }

    /// Decode a state file line
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let (path, rest) = split_path(line.trim())?;
        let mut fields = rest.split_whitespace();

        let stamp = fields
            .next()
            .ok_or_else(|| "missing timestamp".to_string())?;
        let last_rotated = parse_timestamp(stamp)?;

        let rotations = match fields.next() {
            Some(count) => count
                .parse::<u64>()
                .map_err(|_| format!("invalid rotation count '{}'", count))?,
            None => 0,
        };

        Ok(Self {
            path,
            last_rotated,
            rotations,
        })
    }
}

/// Parse RFC 3339, or the legacy logrotate `YYYY-M-D-h:m:s` local time
pub fn parse_timestamp(stamp: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d-%H:%M:%S")
        .or_else(|_| {
            // Date-only legacy entries
            NaiveDateTime::parse_from_str(&format!("{}-0:0:0", stamp), "%Y-%m-%d-%H:%M:%S")
        })
        .map_err(|_| format!("invalid timestamp '{}'", stamp))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("nonexistent local time '{}'", stamp))
}

fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Split the leading (optionally quoted) path from the rest of the line
fn split_path(line: &str) -> Result<(PathBuf, &str), String> {
    if let Some(body) = line.strip_prefix('"') {
        let mut path = String::new();
        let mut escaped = false;
        for (i, c) in body.char_indices() {
            if escaped {
                path.push(match c {
                    'n' => '\n',
                    'r' => '\r',
                    other => other,
                });
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Ok((PathBuf::from(path), &body[i + 1..]));
            } else {
                path.push(c);
            }
        }
        return Err("unterminated quoted path".to_string());
    }

    match line.split_once(char::is_whitespace) {
        Some((path, rest)) => Ok((PathBuf::from(path), rest)),
        None => Err("missing timestamp".to_string()),
    }
}
