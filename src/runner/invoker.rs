//! Runner process execution

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout, Command};

use crate::artifacts;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::environment::Variables;

use super::{build_args, expected_report_path, Invocation};

/// Runs the external test runner
#[derive(Debug, Clone)]
pub struct Invoker {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl Invoker {
    pub fn new(binary: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
        }
    }

    /// Create an invoker from the loaded settings
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.runner_binary(), config.runner.args.clone())
    }

    /// Run `script` with `variables`, writing artifacts into `working_dir`
    ///
    /// The script must exist and be readable, otherwise nothing is spawned.
    /// `working_dir` is emptied before the run. A non-zero exit is returned as
    /// a normal [`Invocation`]; only a runner that cannot be started (or that
    /// is killed by a signal) is an [`Error::InvocationFailed`].
    pub async fn execute(
        &self,
        script: &Path,
        variables: &Variables,
        working_dir: &Path,
    ) -> Result<Invocation> {
        ensure_readable(script)?;
        artifacts::reset_dir(working_dir)?;

        let args = build_args(&self.extra_args, working_dir, variables, script);
        let command_line = format!(
            "{} {}",
            self.binary.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        tracing::debug!("Running: {}", command_line);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::invocation_failed(&self.binary, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("Failed to get runner stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("Failed to get runner stderr".to_string()))?;

        let output = collect_combined(stdout, stderr).await?;
        let status = child.wait().await?;

        let exit_code = status.code().ok_or_else(|| {
            Error::invocation_failed(&self.binary, format!("terminated by signal ({})", status))
        })?;
        tracing::debug!(
            "Runner exited with code {} after writing {} bytes of output",
            exit_code,
            output.len()
        );

        Ok(Invocation {
            output,
            exit_code,
            report_path: expected_report_path(working_dir),
        })
    }
}

fn ensure_readable(script: &Path) -> Result<()> {
    let is_file = std::fs::metadata(script)
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file || std::fs::File::open(script).is_err() {
        return Err(Error::input_not_found(script));
    }
    Ok(())
}

/// Read both pipes to EOF, appending chunks in the order they arrive
async fn collect_combined(mut stdout: ChildStdout, mut stderr: ChildStderr) -> Result<Vec<u8>> {
    let mut combined = Vec::new();
    let mut out_buf = [0u8; 8192];
    let mut err_buf = [0u8; 8192];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => {
                let n = read?;
                if n == 0 {
                    out_open = false;
                } else {
                    combined.extend_from_slice(&out_buf[..n]);
                }
            }
            read = stderr.read(&mut err_buf), if err_open => {
                let n = read?;
                if n == 0 {
                    err_open = false;
                } else {
                    combined.extend_from_slice(&err_buf[..n]);
                }
            }
        }
    }

    Ok(combined)
}
