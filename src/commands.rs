//! CLI command definitions
//!
//! Defines the clap commands for the hurlui CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script and show its result
    Run {
        /// Path to the Hurl script
        script: PathBuf,

        /// Named environment whose variables override the globals
        #[arg(long, short)]
        env: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Always print the runner output
        #[arg(long)]
        output: bool,
    },

    /// Show the last result of a script without running it
    #[command(alias = "show")]
    Last {
        /// Path to the Hurl script
        script: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Print the cached runner output instead of the report
        #[arg(long, conflicts_with = "json")]
        raw: bool,
    },

    /// Forget the results of a deleted script or directory
    Invalidate {
        /// Script or directory that was removed
        path: PathBuf,
    },

    /// Forget the results of a renamed script or directory
    Rename {
        /// Previous path
        old: PathBuf,

        /// New path
        new: PathBuf,
    },

    /// Environment variables
    #[command(subcommand)]
    Env(EnvCommands),

    /// Result cache management
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
pub enum EnvCommands {
    /// List the named environments
    List,

    /// Show the variables a run would receive
    Show {
        /// Named environment to apply over the globals
        #[arg(long, short)]
        env: Option<String>,
    },

    /// Print the location of the environment file
    Path,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached keys
    List,

    /// Print a cached entry as JSON
    Get {
        /// Cache key
        key: String,

        /// Interpret KEY as a script path
        #[arg(long)]
        script: bool,
    },

    /// Check whether a key is cached (exit code 1 when absent)
    Exists {
        /// Cache key
        key: String,

        /// Interpret KEY as a script path
        #[arg(long)]
        script: bool,
    },

    /// Remove a cached entry
    Delete {
        /// Cache key
        key: String,

        /// Interpret KEY as a script path
        #[arg(long)]
        script: bool,
    },

    /// Remove every cached entry
    Clear,
}
