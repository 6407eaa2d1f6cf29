//! External test runner invocation
//!
//! Builds the runner command line for a script, runs it to completion in the
//! script's working directory and captures what it printed.

mod invoker;

pub use invoker::Invoker;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::artifacts;
use crate::environment::Variables;

/// Flag asking the runner for a JSON report in a directory
pub const REPORT_FLAG: &str = "--report-json";

/// Flag passing one `key=value` variable to the runner
pub const VARIABLE_FLAG: &str = "--variable";

/// Outcome of one runner process
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Stdout and stderr interleaved in arrival order
    pub output: Vec<u8>,
    /// Exit code of the runner
    pub exit_code: i32,
    /// Where the runner was asked to write its report
    pub report_path: PathBuf,
}

impl Invocation {
    /// Captured output as text
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Whether the runner exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether a report file is present, whatever the exit code
    pub fn report_exists(&self) -> bool {
        self.report_path.is_file()
    }
}

/// Build the runner arguments for a script
///
/// Layout: `--report-json <dir> [extra]... [--variable key=value]... <script>`.
pub fn build_args(
    extra_args: &[String],
    working_dir: &Path,
    variables: &Variables,
    script: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(3 + extra_args.len() + variables.len() * 2);
    args.push(REPORT_FLAG.into());
    args.push(working_dir.as_os_str().to_owned());
    args.extend(extra_args.iter().map(OsString::from));
    for (key, value) in variables {
        args.push(VARIABLE_FLAG.into());
        args.push(format!("{}={}", key, value).into());
    }
    args.push(script.as_os_str().to_owned());
    args
}

/// Report location for a working directory
pub fn expected_report_path(working_dir: &Path) -> PathBuf {
    artifacts::report_path(working_dir)
}
