use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reaper::{SupervisorConfig, status};

#[derive(Debug, Parser)]
#[command(name = "reaper-wrapper", version)]
/// Run a command as a subreaper and supervise its whole process tree
pub struct Cli {
    /// Interval between reap and liveness rounds
    #[arg(long, env = "REAPER_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Log filter, e.g. `info` or `reaper=debug`
    #[arg(long, env = "REAPER_LOG", default_value = "info")]
    pub log_level: String,

    /// Publish the final status as `reaper-status-<RUN_ID>.json`
    #[arg(long, env = "REAPER_RUN_ID")]
    pub run_id: Option<String>,

    /// Directory for the status file [default: $XDG_RUNTIME_DIR or the temp dir]
    #[arg(long, env = "REAPER_STATUS_DIR")]
    pub status_dir: Option<PathBuf>,

    /// Label shown in the process list
    pub title: String,

    /// Number of process names to always monitor
    pub include_count: usize,

    /// Number of process names to never monitor
    pub exclude_count: usize,

    /// Include names, then exclude names, then the command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 1..)]
    pub rest: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CliError {
    #[error("expected {expected} process names before the command, got {got} arguments")]
    MissingNames { expected: usize, got: usize },

    #[error("no command given")]
    MissingCommand,
}

/// A validated command line.
#[derive(Debug)]
pub struct Invocation {
    pub config: SupervisorConfig,
    pub command: Vec<String>,
}

impl TryFrom<Cli> for Invocation {
    type Error = CliError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let got = cli.rest.len();
        let expected = cli
            .include_count
            .checked_add(cli.exclude_count)
            .filter(|names| *names <= got)
            .ok_or(CliError::MissingNames {
                expected: cli.include_count.saturating_add(cli.exclude_count),
                got,
            })?;

        let mut include = cli.rest;
        let command = include.split_off(expected);
        if command.is_empty() {
            return Err(CliError::MissingCommand);
        }
        let exclude = include.split_off(cli.include_count);

        Ok(Self {
            config: SupervisorConfig {
                title: cli.title,
                poll_interval: Duration::from_millis(cli.poll_interval_ms),
                include,
                exclude,
                run_id: cli.run_id.filter(|id| !id.trim().is_empty()),
                status_dir: cli.status_dir.unwrap_or_else(status::status_dir),
            },
            command,
        })
    }
}
