//! Configuration file parsing for logrotor
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)
//!
//! A file holds global `defaults` and an ordered list of `groups`. Each group
//! inherits the defaults and overrides whatever it sets itself.

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::*;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Size given either as raw bytes or as a suffixed string ("100k")
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    pub fn bytes(&self) -> Result<u64> {
        match self {
            SizeValue::Bytes(b) => Ok(*b),
            SizeValue::Text(s) => parse_size(s),
        }
    }
}

/// Interval given either as a day count or as a name ("daily")
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IntervalValue {
    Days(u32),
    Text(String),
}

impl IntervalValue {
    pub fn interval(&self) -> Result<Interval> {
        match self {
            IntervalValue::Days(0) => Err(Error::config("Interval of 0 days is not allowed")),
            IntervalValue::Days(n) => Ok(Interval::Days(*n)),
            IntervalValue::Text(s) => s.parse(),
        }
    }
}

/// Hook scripts from config file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HooksConfig {
    pub firstaction: Option<String>,
    pub prerotate: Option<String>,
    pub postrotate: Option<String>,
    pub lastaction: Option<String>,
}

impl HooksConfig {
    fn apply(&self, hooks: &mut Hooks) {
        if let Some(s) = &self.firstaction {
            hooks.first_action = Some(s.clone());
        }
        if let Some(s) = &self.prerotate {
            hooks.pre_rotate = Some(s.clone());
        }
        if let Some(s) = &self.postrotate {
            hooks.post_rotate = Some(s.clone());
        }
        if let Some(s) = &self.lastaction {
            hooks.last_action = Some(s.clone());
        }
    }
}

/// Permissions of the recreated file; unset fields are inherited
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CreateConfig {
    pub mode: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

/// Directive overrides; every field is optional so layers can be merged
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DirectivesConfig {
    pub rotate: Option<u32>,
    pub size: Option<SizeValue>,
    pub interval: Option<IntervalValue>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub compress: Option<bool>,
    pub compress_cmd: Option<String>,
    pub compress_options: Option<Vec<String>>,
    pub compress_ext: Option<String>,
    pub delay_compress: Option<u32>,
    pub strategy: Option<String>,
    pub missing: Option<String>,
    pub if_empty: Option<bool>,
    pub create: Option<CreateConfig>,
    pub security_context: Option<String>,
    pub olddir: Option<String>,
    pub create_olddir: Option<bool>,
    pub dateext: Option<bool>,
    pub dateformat: Option<String>,
    pub shared_hooks: Option<bool>,
    pub hooks: Option<HooksConfig>,
    pub exclude: Option<Vec<String>>,
}

impl DirectivesConfig {
    /// Overlay the values set in this layer onto `base`
    pub fn apply(&self, base: &mut Directives) -> Result<()> {
        if let Some(rotate) = self.rotate {
            base.rotate = rotate;
        }
        if let Some(size) = &self.size {
            base.size = Some(size.bytes()?);
        }
        if let Some(interval) = &self.interval {
            base.interval = Some(interval.interval()?);
        }
        if let Some(days) = self.min_age {
            base.min_age_days = days;
        }
        if let Some(days) = self.max_age {
            base.max_age_days = Some(days);
        }
        if let Some(enabled) = self.compress {
            base.compression.enabled = enabled;
        }
        if let Some(cmd) = &self.compress_cmd {
            base.compression.command = cmd.clone();
        }
        if let Some(opts) = &self.compress_options {
            base.compression.options = opts.clone();
        }
        if let Some(ext) = &self.compress_ext {
            base.compression.extension = ext.clone();
        }
        if let Some(delay) = self.delay_compress {
            base.compression.delay = delay;
        }
        if let Some(strategy) = &self.strategy {
            base.strategy = strategy.parse()?;
        }
        if let Some(missing) = &self.missing {
            base.missing = missing.parse()?;
        }
        if let Some(if_empty) = self.if_empty {
            base.if_empty = if_empty;
        }
        if let Some(create) = &self.create {
            if let Some(mode) = &create.mode {
                base.create.mode = Some(parse_mode(mode)?);
            }
            if let Some(owner) = &create.owner {
                base.create.owner = Some(owner.clone());
            }
            if let Some(group) = &create.group {
                base.create.group = Some(group.clone());
            }
        }
        if let Some(ctx) = &self.security_context {
            base.security_context = Some(ctx.clone());
        }
        if let Some(dir) = &self.olddir {
            base.olddir = Some(PathBuf::from(dir));
        }
        if let Some(create) = self.create_olddir {
            base.create_olddir = create;
        }
        if let Some(dateext) = self.dateext {
            base.dateext = dateext;
        }
        if let Some(format) = &self.dateformat {
            base.date_format = format.clone();
        }
        if let Some(shared) = self.shared_hooks {
            base.shared_hooks = shared;
        }
        if let Some(hooks) = &self.hooks {
            hooks.apply(&mut base.hooks);
        }
        if let Some(exclude) = &self.exclude {
            base.exclude = exclude.clone();
        }
        Ok(())
    }
}

/// One log group from the config file
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: Option<String>,
    pub paths: Vec<String>,
    #[serde(flatten)]
    pub directives: DirectivesConfig,
}

/// Configuration file structure (logrotor.toml/yaml/json)
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    /// Where the rotation state table lives
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub defaults: DirectivesConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl ConfigFile {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            ConfigFormat::Json => Ok(serde_json::from_str(content)?),
        }
    }

    /// Find and load the first known config file in a directory.
    /// `Ok(None)` when the directory holds none of them.
    pub fn find_and_load(dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok(Some((config, path)));
            }
        }
        Ok(None)
    }

    /// Resolve every group against the defaults.
    /// Relative path patterns are taken relative to `base_dir`.
    pub fn into_groups(self, base_dir: &Path) -> Result<Vec<LogGroup>> {
        let mut defaults = Directives::default();
        self.defaults.apply(&mut defaults)?;

        self.groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| group.into_group(index, &defaults, base_dir))
            .collect()
    }
}

impl GroupConfig {
    /// Convert to a validated LogGroup
    pub fn into_group(self, index: usize, defaults: &Directives, base_dir: &Path) -> Result<LogGroup> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("group-{}", index + 1));

        if self.paths.is_empty() {
            return Err(Error::config(format!("Group '{}' has no paths", name)));
        }

        let mut directives = defaults.clone();
        self.directives
            .apply(&mut directives)
            .map_err(|e| Error::config(format!("Group '{}': {}", name, e)))?;
        validate(&name, &directives)?;

        let patterns = self
            .paths
            .iter()
            .map(|p| {
                let path = Path::new(p);
                if path.is_absolute() {
                    p.clone()
                } else {
                    base_dir.join(path).to_string_lossy().into_owned()
                }
            })
            .collect();

        Ok(LogGroup::new(name, patterns, directives))
    }
}

fn validate(name: &str, directives: &Directives) -> Result<()> {
    let format = &directives.date_format;
    if format.contains('/') {
        return Err(Error::config(format!(
            "Group '{}': dateformat must not contain '/'",
            name
        )));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::config(format!(
            "Group '{}': invalid dateformat '{}'",
            name, format
        )));
    }

    for pattern in &directives.exclude {
        glob::Pattern::new(pattern).map_err(|e| {
            Error::config(format!(
                "Group '{}': invalid exclude pattern '{}': {}",
                name, pattern, e
            ))
        })?;
    }

    if directives.compression.enabled && directives.compression.extension.is_empty() {
        return Err(Error::config(format!(
            "Group '{}': compress_ext must not be empty",
            name
        )));
    }
    if directives.compression.command.trim().is_empty() {
        return Err(Error::config(format!(
            "Group '{}': compress_cmd must not be empty",
            name
        )));
    }
    Ok(())
}
