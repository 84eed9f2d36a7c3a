use std::path::PathBuf;
use std::time::Duration;

use crate::status;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tunables for a supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Label advertised in the OS process list.
    pub title: String,
    /// Sleep between reap/poll rounds.
    pub poll_interval: Duration,
    /// Names that always count toward the workload.
    pub include: Vec<String>,
    /// Names that never count toward the workload.
    pub exclude: Vec<String>,
    /// Key for the status file; no file is written without one.
    pub run_id: Option<String>,
    /// Where the status file goes.
    pub status_dir: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            include: Vec::new(),
            exclude: Vec::new(),
            run_id: None,
            status_dir: status::status_dir(),
        }
    }
}
