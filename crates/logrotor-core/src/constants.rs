//! Constants and default values for logrotor

use std::path::PathBuf;

/// Default state file location for system-wide runs
pub const DEFAULT_STATE_FILE: &str = "/var/lib/logrotor.status";

/// State file name used under the per-user state directory
pub const USER_STATE_FILE: &str = "logrotor.status";

/// Suffix of the advisory lock file placed next to the state file
pub const LOCK_SUFFIX: &str = ".lock";

/// Header written as the first line of the state file
pub const STATE_HEADER: &str = "logrotor state - version 1";

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "logrotor.toml",
    "logrotor.yaml",
    "logrotor.yml",
    "logrotor.json",
];

/// Default system config location
pub const SYSTEM_CONFIG_DIR: &str = "/etc/logrotor";

/// Default number of rotated copies to keep
pub const DEFAULT_ROTATE_COUNT: u32 = 4;

/// Default compression program
pub const DEFAULT_COMPRESS_COMMAND: &str = "/bin/gzip";

/// Default compression arguments
pub const DEFAULT_COMPRESS_OPTIONS: &[&str] = &["-6"];

/// Default extension appended to compressed copies
pub const DEFAULT_COMPRESS_EXT: &str = ".gz";

/// Default strftime suffix for date-named copies
pub const DEFAULT_DATE_FORMAT: &str = "-%Y%m%d";

/// Shell used for hook scripts
pub const HOOK_SHELL: &str = "sh";

/// Value passed as `$0` to hook scripts
pub const HOOK_ARG0: &str = "logrotor";

/// Environment variable names exported to hooks
pub const ENV_HOOK: &str = "LOGROTOR_HOOK";
pub const ENV_GROUP: &str = "LOGROTOR_GROUP";
pub const ENV_FILE: &str = "LOGROTOR_FILE";
pub const ENV_FILES: &str = "LOGROTOR_FILES";

/// Per-user state file path, used when not running as root
pub fn user_state_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join("logrotor").join(USER_STATE_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}

/// Lock file path for a given state file
pub fn lock_path(state_path: &std::path::Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}
