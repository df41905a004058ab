use std::env;
use std::path::PathBuf;

use dirs_next::home_dir;

/// Directory under the system temp dir that receives relative cache database paths.
pub const TEMP_SUBDIRECTORY: &str = "wfgate";

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Resolves the configured cache database location.
///
/// Absolute paths (after tilde expansion) are used as given. Relative paths keep only their file
/// name and are placed in `<temp>/wfgate/`, so the cache never lands in the working directory.
pub fn resolve_cache_database_path(configured: &str) -> PathBuf {
    let expanded = expand_tilde(configured);
    if expanded.is_absolute() {
        return expanded;
    }
    let file_name = expanded.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("cache.db"));
    env::temp_dir().join(TEMP_SUBDIRECTORY).join(file_name)
}
