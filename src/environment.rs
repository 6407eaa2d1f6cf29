//! Layered variable configuration
//!
//! An environment file holds global variables plus named environments that
//! override them. Resolving always starts from the globals and lets the
//! selected environment win on key collisions.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::common::{Error, Result};

/// Resolved variables, ordered by name
pub type Variables = BTreeMap<String, String>;

/// Contents of the environment file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Variables applied to every run
    pub global: HashMap<String, String>,

    /// Named environments and their overrides
    pub environments: HashMap<String, HashMap<String, String>>,
}

impl EnvironmentConfig {
    /// Names of the selectable environments, sorted
    pub fn environment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.environments.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Load the environment file
///
/// A missing file is an empty configuration. Unreadable or malformed content
/// is a [`Error::ConfigParse`].
pub fn load_config(path: &Path) -> Result<EnvironmentConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No environment file at {}", path.display());
            return Ok(EnvironmentConfig::default());
        }
        Err(e) => {
            return Err(Error::ConfigParse(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    // JSON `null` for any map is treated like an absent key. The legacy
    // `selectable` key is only read when `environments` is absent.
    #[derive(Deserialize)]
    struct RawConfig {
        global: Option<HashMap<String, String>>,
        environments: Option<HashMap<String, HashMap<String, String>>>,
        selectable: Option<HashMap<String, HashMap<String, String>>>,
    }

    let raw: RawConfig = serde_json::from_str(&content)
        .map_err(|e| Error::ConfigParse(format!("failed to parse {}: {}", path.display(), e)))?;

    Ok(EnvironmentConfig {
        global: raw.global.unwrap_or_default(),
        environments: raw.environments.or(raw.selectable).unwrap_or_default(),
    })
}

/// Merge the globals with the named environment
///
/// An unknown or absent environment name leaves the globals untouched.
pub fn resolve_variables(config: &EnvironmentConfig, environment: Option<&str>) -> Variables {
    let mut variables: Variables = config
        .global
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if let Some(name) = environment.filter(|name| !name.is_empty()) {
        match config.environments.get(name) {
            Some(overrides) => {
                for (key, value) in overrides {
                    variables.insert(key.clone(), value.clone());
                }
            }
            None => tracing::debug!("Environment '{}' not defined, using globals only", name),
        }
    }

    variables
}
