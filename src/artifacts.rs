//! Per-script working directories
//!
//! Every script gets a directory under the artifact root that mirrors the
//! script's absolute path, so `/home/u/a/t.hurl` and `/home/u/b/t.hurl` never
//! share artifacts. The runner writes its report and response bodies there.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use crate::common::{Error, Result};

/// File name of the structured report inside a working directory
pub const REPORT_FILE: &str = "report.json";

/// Make a path absolute and remove `.` and `..` components without touching
/// the filesystem
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Map an absolute script path onto its working directory under `root`
///
/// The mapping keeps every path component, so distinct absolute paths always
/// map to distinct directories.
pub fn working_dir_for(root: &Path, script: &Path) -> PathBuf {
    // `..` never climbs above the artifact root.
    let mut parts: Vec<OsString> = Vec::new();
    for component in script.components() {
        match component {
            Component::Prefix(prefix) => parts.push(sanitize_prefix(prefix.as_os_str())),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(name) => parts.push(name.to_os_string()),
        }
    }

    let mut dir = root.to_path_buf();
    dir.extend(parts);
    dir
}

/// `C:` becomes `C`, `\\server\share` becomes `server_share`
fn sanitize_prefix(prefix: &std::ffi::OsStr) -> OsString {
    let cleaned: String = prefix
        .to_string_lossy()
        .trim_start_matches(['\\', '/', '?', '.'])
        .chars()
        .map(|c| match c {
            ':' => '\0',
            '\\' | '/' => '_',
            c => c,
        })
        .filter(|c| *c != '\0')
        .collect();
    OsString::from(cleaned)
}

/// Path of the structured report inside a working directory
pub fn report_path(working_dir: &Path) -> PathBuf {
    working_dir.join(REPORT_FILE)
}

/// Cache key identifying a working directory
pub fn cache_key(working_dir: &Path) -> String {
    working_dir.to_string_lossy().into_owned()
}

/// Whether `key` names `dir_key` itself or something below it
pub fn key_is_within(key: &str, dir_key: &str) -> bool {
    let dir_key = dir_key.trim_end_matches(MAIN_SEPARATOR);
    key == dir_key
        || key
            .strip_prefix(dir_key)
            .is_some_and(|rest| rest.starts_with(MAIN_SEPARATOR))
}

/// Clear a working directory and create it again, empty
pub fn reset_dir(dir: &Path) -> Result<()> {
    remove_dir(dir)?;
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Internal(format!(
            "Failed to create working directory '{}': {}",
            dir.display(),
            e
        ))
    })
}

/// Remove a working directory and everything under it
///
/// Returns whether something was removed. A missing directory is not an error.
pub fn remove_dir(dir: &Path) -> Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Internal(format!(
            "Failed to remove working directory '{}': {}",
            dir.display(),
            e
        ))),
    }
}
