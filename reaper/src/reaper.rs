//! Non-blocking collection of terminated descendants.

use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::platform::Platform;
use crate::types::{ChildExit, SweepResult};

/// The process spawned directly from the supervised command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryProcess {
    pub pid: Pid,
    pub status: Option<ChildExit>,
}

pub struct Reaper<'p, P: ?Sized> {
    platform: &'p P,
    primary: PrimaryProcess,
}

impl<'p, P: Platform + ?Sized> Reaper<'p, P> {
    pub fn new(platform: &'p P, primary_pid: Pid) -> Self {
        Self {
            platform,
            primary: PrimaryProcess {
                pid: primary_pid,
                status: None,
            },
        }
    }

    pub fn primary(&self) -> PrimaryProcess {
        self.primary
    }

    /// One collection attempt. Records the primary's status when it is the
    /// process collected.
    pub fn sweep(&mut self) -> SweepResult {
        let result = match self.platform.reap_nonblocking() {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "reap failed");
                return SweepResult::NoneAvailable;
            }
        };

        if let SweepResult::Collected { pid, status } = result {
            if pid == self.primary.pid {
                self.record_primary(status);
            } else {
                debug!(pid = %pid, code = status.code(), "reaped descendant");
            }
        }
        result
    }

    /// Sweep until nothing more is ready. Returns the result that ended the
    /// drain: [`SweepResult::NoneAvailable`] or [`SweepResult::ChildrenExhausted`].
    pub fn drain(&mut self) -> SweepResult {
        loop {
            match self.sweep() {
                SweepResult::Collected { .. } => continue,
                other => return other,
            }
        }
    }

    fn record_primary(&mut self, status: ChildExit) {
        if let Some(previous) = self.primary.status {
            warn!(
                pid = %self.primary.pid,
                previous = previous.code(),
                current = status.code(),
                "primary process reported exit more than once"
            );
        } else {
            info!(pid = %self.primary.pid, code = status.code(), "primary process exited");
        }
        self.primary.status = Some(status);
    }
}
