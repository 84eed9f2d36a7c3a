use nix::unistd::Pid;

/// How a collected process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Normal exit with the given status code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
}

impl ChildExit {
    /// Numeric status as a shell would report it (`128 + signal` for signals).
    pub fn code(self) -> i32 {
        match self {
            ChildExit::Exited(code) => code,
            ChildExit::Signaled(signal) => 128 + signal,
        }
    }
}

/// Outcome of a single non-blocking collection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepResult {
    /// One terminated descendant was collected.
    Collected { pid: Pid, status: ChildExit },
    /// Descendants exist but none has terminated since the last sweep.
    NoneAvailable,
    /// No descendants remain at all.
    ChildrenExhausted,
}

/// Final status of a supervisor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitRecord {
    /// Pid of the primary process, absent when nothing was spawned.
    pub primary_pid: Option<Pid>,
    /// Recorded exit of the primary process, absent when it was never reaped.
    pub status: Option<ChildExit>,
}

impl ExitRecord {
    /// Record for a run where no process could be started.
    pub fn no_run() -> Self {
        Self::default()
    }

    /// The forwarded status, or 0 when unknown.
    pub fn code(&self) -> i32 {
        self.status.map_or(0, ChildExit::code)
    }

    /// [`code`](Self::code) clamped into the range a process can exit with.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.code().clamp(0, 255)).unwrap_or(u8::MAX)
    }
}
