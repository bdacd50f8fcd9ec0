//! Pattern expansion with first-claim-wins ownership
//!
//! Groups are expanded in config order. A file claimed by an earlier group is
//! invisible to every later group, so each file has exactly one owner.

use glob::MatchOptions;
use logrotor_core::LogGroup;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files owned by one group after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    /// Position of the group in the config
    pub index: usize,
    pub name: String,
    /// Sorted, deduplicated canonical paths. Patterns that matched nothing
    /// appear here as their literal path so the missing-file policy applies.
    pub files: Vec<PathBuf>,
    /// Matches dropped by the group's exclude patterns
    pub excluded: Vec<PathBuf>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Expand all groups, giving each file to the first group that matches it
pub fn resolve(groups: &[LogGroup]) -> Vec<ResolvedGroup> {
    let mut claimed: HashMap<PathBuf, usize> = HashMap::new();

    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let candidates: BTreeSet<PathBuf> = group
                .patterns
                .iter()
                .flat_map(|pattern| expand(pattern))
                .collect();

            let mut files = Vec::new();
            let mut excluded = Vec::new();

            for path in candidates {
                if let Some(owner) = claimed.get(&path) {
                    debug!(
                        "{} already claimed by group {}, skipping for group {}",
                        path.display(),
                        groups[*owner].name,
                        group.name
                    );
                    continue;
                }
                if group.directives.excludes(&path) {
                    debug!("{} excluded from group {}", path.display(), group.name);
                    excluded.push(path);
                    continue;
                }
                claimed.insert(path.clone(), index);
                files.push(path);
            }

            debug!("Group {} owns {} file(s)", group.name, files.len());
            ResolvedGroup {
                index,
                name: group.name.clone(),
                files,
                excluded,
            }
        })
        .collect()
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand one pattern into candidate files
fn expand(pattern: &str) -> Vec<PathBuf> {
    if !has_wildcards(pattern) {
        let path = canonical(Path::new(pattern));
        return match std::fs::symlink_metadata(&path) {
            Ok(meta) if !meta.file_type().is_file() => {
                warn!("{} is not a regular file, ignoring", path.display());
                Vec::new()
            }
            _ => vec![path],
        };
    }

    // No recursive matching: `**` behaves like `*`
    let flat = pattern.replace("**", "*");
    let entries = match glob::glob_with(&flat, MATCH_OPTIONS) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Invalid pattern '{}': {}", pattern, e);
            return vec![canonical(Path::new(pattern))];
        }
    };

    let mut matched = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => match std::fs::symlink_metadata(&path) {
                Ok(meta) if meta.file_type().is_file() => matched.push(canonical(&path)),
                Ok(_) => debug!("Skipping non-regular file {}", path.display()),
                Err(e) => warn!("Cannot stat {}: {}", path.display(), e),
            },
            Err(e) => warn!("Error while expanding '{}': {}", pattern, e),
        }
    }

    if matched.is_empty() {
        debug!("Pattern '{}' matched no files", pattern);
        matched.push(canonical(Path::new(pattern)));
    }
    matched
}

/// Canonicalize a path, or as much of it as exists
fn canonical(path: &Path) -> PathBuf {
    if let Ok(real) = std::fs::canonicalize(path) {
        return real;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}
