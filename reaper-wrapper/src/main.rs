//! Command-line wrapper around the process-tree supervisor.
//!
//! Becomes a subreaper, runs the given command, waits until the workload
//! (possibly a grandchild) has finished and exits with the primary
//! process's status. SIGINT/SIGTERM are relayed to the whole tree; a second
//! one kills it.

mod cli;

use std::fmt;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use reaper::{LinuxPlatform, ProcessTable, Supervisor};
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let invocation = match cli::Invocation::try_from(cli) {
        Ok(invocation) => invocation,
        Err(e) => {
            error!(error = %e, "invalid arguments");
            return ExitCode::from(2);
        }
    };

    let relay = reaper::relay::install();
    let supervisor = Supervisor::new(
        LinuxPlatform,
        ProcessTable::for_current_process(),
        relay,
        invocation.config,
    );
    let record = supervisor.run(&invocation.command);
    ExitCode::from(record.exit_code())
}
