//! Run and fetch results for scripts
//!
//! Ties the pieces together: resolve variables, run the runner in the
//! script's working directory, parse and rehydrate the report, and remember
//! the result. Only a missing script or a runner that cannot start fails a
//! run; every other problem is returned as a [`Warning`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::artifacts;
use crate::cache::{CacheEntry, ResultCache};
use crate::common::config::Config;
use crate::common::{Error, ErrorKind, Result, Warning};
use crate::environment::{self, EnvironmentConfig, Variables};
use crate::report::{self, Report};
use crate::runner::Invoker;

/// Result of running a script
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub script: PathBuf,
    pub working_dir: PathBuf,
    pub environment: Option<String>,
    pub variables: Variables,
    pub exit_code: i32,
    /// Runner stdout and stderr, interleaved
    pub output: String,
    pub report: Report,
    /// Whether the result was stored in the cache
    pub cached: bool,
    pub warnings: Vec<Warning>,
}

impl RunOutcome {
    /// Runner exited cleanly and every session passed
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.report.success()
    }
}

/// Most recent result of a script, read back without running it
#[derive(Debug, Clone, Default, Serialize)]
pub struct LastResult {
    /// False when the script has no recorded result
    pub found: bool,
    pub report: Report,
    pub warnings: Vec<Warning>,
}

/// What an invalidation removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct Invalidation {
    pub removed_dir: bool,
    pub removed_keys: usize,
    pub warnings: Vec<Warning>,
}

/// Entry point for running scripts and retrieving their results
pub struct Orchestrator {
    invoker: Invoker,
    artifact_root: PathBuf,
    env_file: PathBuf,
    cache: Arc<ResultCache>,
    /// One lock per working directory, so runs of the same script queue up
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        invoker: Invoker,
        artifact_root: impl Into<PathBuf>,
        env_file: impl Into<PathBuf>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            invoker,
            artifact_root: artifact_root.into(),
            env_file: env_file.into(),
            cache,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build an orchestrator from settings, opening the result cache
    pub fn from_config(config: &Config) -> Self {
        let cache = Arc::new(ResultCache::open(&config.cache_db()));
        Self::new(
            Invoker::from_config(config),
            config.artifact_root(),
            config.env_file(),
            cache,
        )
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    /// Working directory of a script
    pub fn working_dir(&self, script: &Path) -> Result<PathBuf> {
        let script = artifacts::absolutize(script)?;
        Ok(artifacts::working_dir_for(&self.artifact_root, &script))
    }

    /// Cache key under which a script's result is stored
    pub fn cache_key(&self, script: &Path) -> Result<String> {
        Ok(artifacts::cache_key(&self.working_dir(script)?))
    }

    /// Load the environment file, falling back to an empty configuration
    pub fn environment_config(&self) -> (EnvironmentConfig, Option<Warning>) {
        match environment::load_config(&self.env_file) {
            Ok(config) => (config, None),
            Err(e) => {
                tracing::warn!("Ignoring environment file: {}", e);
                (EnvironmentConfig::default(), Some(Warning::from(&e)))
            }
        }
    }

    /// Run a script with the variables of `environment`
    ///
    /// Waits for any other run of the same script to finish first.
    pub async fn run(&self, script: &Path, environment: Option<&str>) -> Result<RunOutcome> {
        let script = artifacts::absolutize(script)?;
        let working_dir = artifacts::working_dir_for(&self.artifact_root, &script);

        let lock = self.script_lock(&working_dir);
        let outcome = {
            let _guard = lock.lock().await;
            self.run_locked(script, environment, working_dir.clone())
                .await
        };
        self.release_script_lock(&working_dir, lock);
        outcome
    }

    async fn run_locked(
        &self,
        script: PathBuf,
        environment: Option<&str>,
        working_dir: PathBuf,
    ) -> Result<RunOutcome> {
        let mut warnings = Vec::new();

        let (env_config, env_warning) = self.environment_config();
        warnings.extend(env_warning);
        let variables = environment::resolve_variables(&env_config, environment);

        let invocation = self
            .invoker
            .execute(&script, &variables, &working_dir)
            .await?;
        let output = invocation.output_text();

        let parsed = match report::parse_report_file(&invocation.report_path) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!("No usable report for {}: {}", script.display(), e);
                warnings.push(Warning::from(&e));
                None
            }
        };

        let mut cached = false;
        let report = match parsed {
            Some(report) => {
                let rehydrated = report::rehydrate(report, &working_dir);
                warnings.extend(
                    rehydrated
                        .failures
                        .iter()
                        .map(|f| Warning::from(Error::from(f))),
                );

                let entry = CacheEntry {
                    output: output.clone(),
                    report: rehydrated.report,
                };
                let key = artifacts::cache_key(&working_dir);
                let stored = entry.clone();
                match self.with_cache(move |cache| cache.put(&key, &stored)).await {
                    Ok(()) => cached = true,
                    Err(e) => {
                        tracing::warn!("Result of {} not cached: {}", script.display(), e);
                        warnings.push(Warning::from(&e));
                    }
                }
                entry.report
            }
            None => Report::default(),
        };

        tracing::info!(
            "Ran {} (exit code {}, {} session(s), {} warning(s))",
            script.display(),
            invocation.exit_code,
            report.sessions.len(),
            warnings.len()
        );

        Ok(RunOutcome {
            script,
            working_dir,
            environment: environment.map(str::to_string),
            variables,
            exit_code: invocation.exit_code,
            output,
            report,
            cached,
            warnings,
        })
    }

    /// Last result of a script, without running it
    ///
    /// Reads the report left in the working directory. A script that never
    /// ran yields an empty, not-found result. While the script is running,
    /// or when the report on disk is unusable, the cached result is returned.
    pub async fn fetch_last(&self, script: &Path) -> Result<LastResult> {
        let script = artifacts::absolutize(script)?;
        let working_dir = artifacts::working_dir_for(&self.artifact_root, &script);
        let key = artifacts::cache_key(&working_dir);

        let lock = self.script_lock(&working_dir);
        let result = match lock.try_lock() {
            Ok(_guard) => self.read_last(&working_dir, &key).await,
            Err(_) => {
                tracing::debug!("{} is running, serving cached result", script.display());
                self.cached_last(&key, Vec::new()).await
            }
        };
        self.release_script_lock(&working_dir, lock);
        Ok(result)
    }

    async fn read_last(&self, working_dir: &Path, key: &str) -> LastResult {
        if !working_dir.is_dir() {
            return LastResult::default();
        }

        match report::parse_report_file(&artifacts::report_path(working_dir)) {
            Ok(report) => {
                let rehydrated = report::rehydrate(report, working_dir);
                LastResult {
                    found: true,
                    report: rehydrated.report,
                    warnings: rehydrated
                        .failures
                        .iter()
                        .map(|f| Warning::from(Error::from(f)))
                        .collect(),
                }
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.cached_last(key, vec![Warning::from(&e)]).await
            }
        }
    }

    async fn cached_last(&self, key: &str, mut warnings: Vec<Warning>) -> LastResult {
        let key = key.to_string();
        match self.with_cache(move |cache| cache.get(&key)).await {
            Ok(Some(entry)) => LastResult {
                found: true,
                report: entry.report,
                warnings,
            },
            Ok(None) => LastResult {
                found: false,
                report: Report::default(),
                warnings,
            },
            Err(e) => {
                warnings.push(Warning::from(&e));
                LastResult {
                    found: false,
                    report: Report::default(),
                    warnings,
                }
            }
        }
    }

    /// Cached result of a script, including the runner output
    pub async fn cached(&self, script: &Path) -> Result<Option<CacheEntry>> {
        let key = self.cache_key(script)?;
        self.with_cache(move |cache| cache.get(&key)).await
    }

    /// Run a cache operation on the blocking thread pool
    ///
    /// SQLite calls block for as long as another writer holds the database.
    pub async fn with_cache<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&ResultCache) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || operation(&cache))
            .await
            .map_err(|e| Error::Internal(format!("Cache task failed: {}", e)))?
    }

    /// Forget everything recorded for a script or a directory of scripts
    ///
    /// Removes the mirrored working directory and every cache entry at or
    /// below it. Call this when the path is deleted or renamed.
    pub async fn invalidate(&self, path: &Path) -> Result<Invalidation> {
        let path = artifacts::absolutize(path)?;
        let working_dir = artifacts::working_dir_for(&self.artifact_root, &path);

        let lock = self.script_lock(&working_dir);
        let result = {
            let _guard = lock.lock().await;
            self.invalidate_locked(&working_dir).await
        };
        self.release_script_lock(&working_dir, lock);

        if let Ok(invalidation) = &result {
            tracing::info!(
                "Invalidated {} ({} cached result(s) removed)",
                path.display(),
                invalidation.removed_keys
            );
        }
        result
    }

    async fn invalidate_locked(&self, working_dir: &Path) -> Result<Invalidation> {
        let mut invalidation = Invalidation::default();

        match self.purge_keys(artifacts::cache_key(working_dir)).await {
            Ok(removed) => invalidation.removed_keys = removed,
            Err(e) if e.kind() == ErrorKind::CacheUnavailable => {
                tracing::warn!("Cached results not removed: {}", e);
                invalidation.warnings.push(Warning::from(&e));
            }
            Err(e) => return Err(e),
        }

        invalidation.removed_dir = artifacts::remove_dir(working_dir)?;
        Ok(invalidation)
    }

    async fn purge_keys(&self, dir_key: String) -> Result<usize> {
        self.with_cache(move |cache| {
            let mut removed = 0;
            for key in cache.list_keys()? {
                if artifacts::key_is_within(&key, &dir_key) && cache.delete(&key)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }

    /// Handle a rename: results of the old path are dropped
    ///
    /// The new path starts without a recorded result, even if stale
    /// artifacts were left behind for it.
    pub async fn relocate(&self, old: &Path, new: &Path) -> Result<Invalidation> {
        let mut invalidation = self.invalidate(old).await?;
        let stale = self.invalidate(new).await?;
        invalidation.removed_dir |= stale.removed_dir;
        invalidation.removed_keys += stale.removed_keys;
        invalidation.warnings.extend(stale.warnings);
        Ok(invalidation)
    }

    /// Close the result cache
    pub fn shutdown(&self) {
        self.cache.close();
    }

    fn script_lock(&self, working_dir: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(working_dir.to_path_buf())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drop the lock entry once nobody else holds or waits on it
    fn release_script_lock(&self, working_dir: &Path, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(working_dir);
        }
    }
}
