//! Platform configuration, cache and log locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/hurlui/`, `~/.cache/hurlui/`, `~/.local/share/hurlui/`
//! - macOS: `~/Library/Application Support/hurlui/`, `~/Library/Caches/hurlui/`
//! - Windows: `%APPDATA%\hurlui\`, `%LOCALAPPDATA%\hurlui\cache\`

use std::path::PathBuf;

/// Project name used for every platform directory
const APP_NAME: &str = "hurlui";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the settings file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the default path of the environment variables file
pub fn env_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("env.json"))
}

/// Get the cache directory path
pub fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Default root under which each script gets its mirrored working directory
///
/// Falls back to the system temp directory when no home directory is known.
pub fn default_artifact_root() -> PathBuf {
    cache_dir()
        .map(|dir| dir.join("artifacts"))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME).join("artifacts"))
}

/// Default location of the result cache database
pub fn default_cache_db() -> PathBuf {
    cache_dir()
        .map(|dir| dir.join("cache.db"))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME).join("cache.db"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}
