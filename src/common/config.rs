//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// External test runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Storage locations
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Configuration of the external test runner
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Runner executable, either a path or a name looked up in PATH
    #[serde(default = "default_runner_binary")]
    pub binary: PathBuf,

    /// Extra arguments placed before the variables
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: default_runner_binary(),
            args: Vec::new(),
        }
    }
}

fn default_runner_binary() -> PathBuf {
    PathBuf::from("hurl")
}

/// Storage locations, each defaulting to a platform directory
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PathsConfig {
    /// Root of the per-script working directories
    pub artifact_root: Option<PathBuf>,

    /// Result cache database file
    pub cache_db: Option<PathBuf>,

    /// Environment variables file (JSON)
    pub env_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match paths::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file, defaulting when it is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Resolve the runner executable
    ///
    /// Bare names are searched in PATH. Anything unresolved is returned as
    /// given so that spawning reports the failure.
    pub fn runner_binary(&self) -> PathBuf {
        let binary = &self.runner.binary;
        if binary.components().count() > 1 {
            return binary.clone();
        }
        which::which(binary).unwrap_or_else(|_| binary.clone())
    }

    /// Root directory of the mirrored working directories
    pub fn artifact_root(&self) -> PathBuf {
        self.paths
            .artifact_root
            .clone()
            .unwrap_or_else(paths::default_artifact_root)
    }

    /// Location of the result cache database
    pub fn cache_db(&self) -> PathBuf {
        self.paths
            .cache_db
            .clone()
            .unwrap_or_else(paths::default_cache_db)
    }

    /// Location of the environment variables file
    pub fn env_file(&self) -> PathBuf {
        self.paths
            .env_file
            .clone()
            .or_else(paths::env_file_path)
            .unwrap_or_else(|| PathBuf::from("env.json"))
    }
}
