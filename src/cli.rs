// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `buildwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildwatch",
    version,
    about = "Watch project sources, rebuild stale artifacts, and run auxiliary services.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Buildwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Buildwatch.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run init + watch services, build everything once, then watch for
    /// changes until interrupted. SIGHUP rebuilds everything.
    Watch,

    /// Run init + build services and build every source once.
    Build,

    /// Print the computed service order for a phase without executing
    /// anything.
    Plan {
        /// Phase to plan for (init, watch, build).
        #[arg(long, value_name = "PHASE", default_value = "init")]
        phase: String,
    },

    /// Execute a single registered service for a phase.
    Run {
        /// Name of the service to execute.
        service: String,

        /// Phase to run the service for (init, watch, build).
        #[arg(long, value_name = "PHASE", default_value = "init")]
        phase: String,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
