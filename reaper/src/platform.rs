//! OS process operations behind a small trait so supervision logic can run
//! against a simulated process table in tests.

use std::ffi::CStr;
use std::process::Command;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::trace;

use crate::error::{PlatformError, Result, SpawnError};
use crate::types::{ChildExit, SweepResult};

pub trait Platform {
    /// Adopt orphaned descendants so their exits can still be collected.
    fn register_as_subreaper(&self) -> Result<()>;

    /// Collect at most one terminated descendant without blocking.
    fn reap_nonblocking(&self) -> Result<SweepResult>;

    /// Start `command` (program followed by its arguments) as a direct child.
    fn spawn(&self, command: &[String]) -> Result<Pid, SpawnError>;

    /// Deliver `signal` to `pid`. A process that no longer exists is not an error.
    fn send_signal(&self, pid: Pid, signal: Signal) -> Result<()>;

    /// Advertise a label for this process in the OS process list.
    fn set_title(&self, title: &CStr) -> Result<()>;
}

/// [`Platform`] backed by Linux syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxPlatform;

impl Platform for LinuxPlatform {
    fn register_as_subreaper(&self) -> Result<()> {
        nix::sys::prctl::set_child_subreaper(true).map_err(PlatformError::SubreaperUnsupported)
    }

    fn reap_nonblocking(&self) -> Result<SweepResult> {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => return Ok(SweepResult::NoneAvailable),
                Ok(WaitStatus::Exited(pid, code)) => {
                    return Ok(SweepResult::Collected {
                        pid,
                        status: ChildExit::Exited(code),
                    });
                }
                Ok(WaitStatus::Signaled(pid, signal, _core_dumped)) => {
                    return Ok(SweepResult::Collected {
                        pid,
                        status: ChildExit::Signaled(signal as i32),
                    });
                }
                // Stop/continue notifications are not terminations.
                Ok(other) => trace!(status = ?other, "ignoring non-terminal wait status"),
                Err(Errno::ECHILD) => return Ok(SweepResult::ChildrenExhausted),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(PlatformError::Wait(e)),
            }
        }
    }

    fn spawn(&self, command: &[String]) -> Result<Pid, SpawnError> {
        let (program, args) = command.split_first().ok_or(SpawnError::EmptyCommand)?;
        let child = Command::new(program)
            .args(args)
            .spawn()
            .map_err(|source| SpawnError::Exec {
                program: program.clone(),
                source,
            })?;

        // The child handle is dropped without waiting; its exit is collected
        // by `reap_nonblocking` like any other descendant.
        let id = child.id();
        let raw = i32::try_from(id).map_err(|_| SpawnError::InvalidPid(id))?;
        Ok(Pid::from_raw(raw))
    }

    fn send_signal(&self, pid: Pid, signal: Signal) -> Result<()> {
        match signal::kill(pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(PlatformError::Signal {
                pid,
                signal,
                source,
            }),
        }
    }

    fn set_title(&self, title: &CStr) -> Result<()> {
        nix::sys::prctl::set_name(title).map_err(PlatformError::Title)
    }
}
