//! Response body rehydration
//!
//! The runner stores response bodies as files next to the report and only
//! records their relative path. Rehydration reads each file back into the
//! report so the result can be handed out or cached on its own.

use std::path::{Component, Path, PathBuf};

use crate::common::Error;

use super::types::Report;

/// A body file that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyReadFailure {
    /// Position of the call as (session, entry, call)
    pub location: (usize, usize, usize),
    pub path: PathBuf,
    pub reason: String,
}

impl From<&BodyReadFailure> for Error {
    fn from(failure: &BodyReadFailure) -> Self {
        Error::BodyRead {
            path: failure.path.display().to_string(),
            reason: failure.reason.clone(),
        }
    }
}

/// Report with bodies inlined, plus the bodies that could not be read
#[derive(Debug, Clone, Default)]
pub struct Rehydrated {
    pub report: Report,
    pub failures: Vec<BodyReadFailure>,
}

/// Inline every referenced response body
///
/// Body paths are resolved against `working_dir`. A body that cannot be read
/// leaves its content empty and is recorded as a failure; the remaining calls
/// are still processed. The file reference itself is never modified, so
/// running this again on its own output re-reads the same files.
pub fn rehydrate(mut report: Report, working_dir: &Path) -> Rehydrated {
    let mut failures = Vec::new();

    for (s, session) in report.sessions.iter_mut().enumerate() {
        for (e, entry) in session.entries.iter_mut().enumerate() {
            for (c, call) in entry.calls.iter_mut().enumerate() {
                let response = &mut call.response;
                if response.body_file.is_empty() {
                    continue;
                }

                let path = match body_path(working_dir, &response.body_file) {
                    Ok(path) => path,
                    Err(reason) => {
                        tracing::warn!(
                            "Ignoring response body reference {}: {}",
                            response.body_file,
                            reason
                        );
                        response.body_content.clear();
                        failures.push(BodyReadFailure {
                            location: (s, e, c),
                            path: PathBuf::from(&response.body_file),
                            reason,
                        });
                        continue;
                    }
                };
                match std::fs::read(&path) {
                    Ok(bytes) => {
                        response.body_content = String::from_utf8_lossy(&bytes).into_owned();
                    }
                    Err(err) => {
                        tracing::warn!(
                            "Failed to read response body file {}: {}",
                            path.display(),
                            err
                        );
                        response.body_content.clear();
                        failures.push(BodyReadFailure {
                            location: (s, e, c),
                            path,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
    }

    Rehydrated { report, failures }
}

/// Resolve a body reference inside `working_dir`
///
/// Absolute references are re-rooted under `working_dir`. A reference with
/// `..` components is rejected.
fn body_path(working_dir: &Path, body_file: &str) -> std::result::Result<PathBuf, String> {
    let mut path = working_dir.to_path_buf();
    for component in Path::new(body_file).components() {
        match component {
            Component::Normal(name) => path.push(name),
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                return Err("reference leaves the working directory".to_string())
            }
        }
    }
    if path == working_dir || !path.starts_with(working_dir) {
        return Err("reference does not name a file in the working directory".to_string());
    }
    Ok(path)
}
