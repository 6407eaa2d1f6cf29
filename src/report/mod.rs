//! Runner reports
//!
//! Types for the structured report written by the test runner, loading it
//! from a working directory, and inlining response bodies.

mod rehydrate;
mod types;

pub use rehydrate::{rehydrate, BodyReadFailure, Rehydrated};
pub use types::*;
pub(crate) use types::null_as_default;

use std::path::Path;

use crate::common::{Error, Result};

/// Read and parse a report file
///
/// Any failure, including a missing file, is a [`Error::ReportParse`].
pub fn parse_report_file(path: &Path) -> Result<Report> {
    let data = std::fs::read(path).map_err(|e| Error::report_parse(path, e))?;
    serde_json::from_slice(&data).map_err(|e| Error::report_parse(path, e))
}
