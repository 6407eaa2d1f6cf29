//! CLI command handling
//!
//! Dispatches CLI commands to the orchestrator and formats output.

use std::path::Path;

use colored::Colorize;

use crate::cache::CacheEntry;
use crate::commands::{CacheCommands, Commands, EnvCommands};
use crate::common::{Error, Result, Warning};
use crate::environment;
use crate::orchestrator::{Invalidation, LastResult, Orchestrator, RunOutcome};
use crate::report::{Entry, Report, Session};

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands, orchestrator: &Orchestrator) -> Result<i32> {
    match command {
        Commands::Run {
            script,
            env,
            json,
            output,
        } => {
            let outcome = orchestrator.run(&script, env.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_run_outcome(&outcome, output);
            }

            Ok(if outcome.succeeded() {
                0
            } else if outcome.exit_code != 0 {
                outcome.exit_code
            } else {
                1
            })
        }

        Commands::Last { script, json, raw } => {
            if raw {
                return match orchestrator.cached(&script).await? {
                    Some(CacheEntry { output, .. }) => {
                        print!("{}", output);
                        Ok(0)
                    }
                    None => {
                        println!("No cached result for {}", script.display());
                        Ok(1)
                    }
                };
            }

            let last = orchestrator.fetch_last(&script).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&last.report)?);
            } else {
                print_last_result(&script, &last);
            }
            Ok(if last.found { 0 } else { 1 })
        }

        Commands::Invalidate { path } => {
            let invalidation = orchestrator.invalidate(&path).await?;
            print_invalidation(&path, &invalidation);
            Ok(0)
        }

        Commands::Rename { old, new } => {
            let invalidation = orchestrator.relocate(&old, &new).await?;
            print_invalidation(&old, &invalidation);
            Ok(0)
        }

        Commands::Env(env_cmd) => match env_cmd {
            EnvCommands::List => {
                let (config, warning) = orchestrator.environment_config();
                print_warnings(warning.as_slice());

                let names = config.environment_names();
                if names.is_empty() {
                    println!("No environments defined in {}", orchestrator.env_file().display());
                } else {
                    for name in names {
                        println!("{}", name);
                    }
                }
                Ok(0)
            }

            EnvCommands::Show { env } => {
                let (config, warning) = orchestrator.environment_config();
                print_warnings(warning.as_slice());

                let variables = environment::resolve_variables(&config, env.as_deref());
                if variables.is_empty() {
                    println!("No variables");
                }
                for (key, value) in &variables {
                    println!("{}={}", key, value);
                }
                Ok(0)
            }

            EnvCommands::Path => {
                println!("{}", orchestrator.env_file().display());
                Ok(0)
            }
        },

        Commands::Cache(cache_cmd) => {
            let resolve = |key: String, script: bool| -> Result<String> {
                if script {
                    orchestrator.cache_key(Path::new(&key))
                } else {
                    Ok(key)
                }
            };

            match cache_cmd {
                CacheCommands::List => {
                    let keys = orchestrator.with_cache(|cache| cache.list_keys()).await?;
                    if keys.is_empty() {
                        println!("Cache is empty");
                    }
                    for key in keys {
                        println!("{}", key);
                    }
                    Ok(0)
                }

                CacheCommands::Get { key, script } => {
                    let key = resolve(key, script)?;
                    let lookup = key.clone();
                    match orchestrator.with_cache(move |cache| cache.get(&lookup)).await? {
                        Some(entry) => {
                            println!("{}", serde_json::to_string_pretty(&entry)?);
                            Ok(0)
                        }
                        None => {
                            println!("Not cached: {}", key);
                            Ok(1)
                        }
                    }
                }

                CacheCommands::Exists { key, script } => {
                    let key = resolve(key, script)?;
                    let exists = orchestrator
                        .with_cache(move |cache| cache.exists(&key))
                        .await?;
                    println!("{}", exists);
                    Ok(if exists { 0 } else { 1 })
                }

                CacheCommands::Delete { key, script } => {
                    let key = resolve(key, script)?;
                    let target = key.clone();
                    if orchestrator
                        .with_cache(move |cache| cache.delete(&target))
                        .await?
                    {
                        println!("Deleted {}", key);
                    } else {
                        println!("Not cached: {}", key);
                    }
                    Ok(0)
                }

                CacheCommands::Clear => {
                    let removed = orchestrator.with_cache(|cache| cache.clear()).await?;
                    println!("Removed {} cached result(s)", removed);
                    Ok(0)
                }
            }
        }
    }
}

// === Output formatting ===

fn print_run_outcome(outcome: &RunOutcome, always_show_output: bool) {
    match &outcome.environment {
        Some(env) => println!(
            "{} {} {}",
            "Ran".blue().bold(),
            outcome.script.display(),
            format!("[{}]", env).dimmed()
        ),
        None => println!("{} {}", "Ran".blue().bold(), outcome.script.display()),
    }

    if (outcome.report.is_empty() || always_show_output) && !outcome.output.is_empty() {
        println!("\n{}", "Runner output:".cyan());
        for line in outcome.output.lines() {
            println!("  {}", line);
        }
    }

    print_report(&outcome.report);
    print_warnings(&outcome.warnings);

    println!();
    if outcome.succeeded() {
        println!("{}", "✓ Passed".green().bold());
    } else {
        println!(
            "{} {}",
            "✗ Failed".red().bold(),
            format!("(exit code {})", outcome.exit_code).dimmed()
        );
    }
}

fn print_last_result(script: &Path, last: &LastResult) {
    if !last.found {
        println!("No previous result for {}", script.display());
        print_warnings(&last.warnings);
        return;
    }

    println!("{} {}", "Last result of".blue().bold(), script.display());
    print_report(&last.report);
    print_warnings(&last.warnings);
}

fn print_report(report: &Report) {
    for session in &report.sessions {
        print_session(session);
    }
}

fn print_session(session: &Session) {
    let marker = if session.success {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "\n{} {} {}",
        marker,
        session.filename.white().bold(),
        format!("({} ms)", session.time).dimmed()
    );

    for entry in &session.entries {
        print_entry(entry);
    }
}

fn print_entry(entry: &Entry) {
    let failed_asserts = entry
        .asserts
        .iter()
        .filter(|a| a.get("success").and_then(|s| s.as_bool()) == Some(false))
        .count();

    for call in &entry.calls {
        let status = call.response.status.to_string();
        let status = if call.response.status >= 400 || failed_asserts > 0 {
            status.red()
        } else {
            status.green()
        };
        println!(
            "  #{} line {}: {} {} -> {} {}",
            entry.index,
            entry.line,
            call.request.method,
            call.request.url,
            status,
            format!("({} ms)", entry.time).dimmed()
        );
    }

    if failed_asserts > 0 {
        println!(
            "    {}",
            format!("{} of {} assert(s) failed", failed_asserts, entry.asserts.len()).red()
        );
    }
}

fn print_invalidation(path: &Path, invalidation: &Invalidation) {
    println!(
        "Invalidated {} ({} cached result(s), artifacts {})",
        path.display(),
        invalidation.removed_keys,
        if invalidation.removed_dir {
            "removed"
        } else {
            "absent"
        }
    );
    print_warnings(&invalidation.warnings);
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

/// Print a blocking error
pub fn print_error(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
