//! Shared setup for the real-process scenarios.
//!
//! Each scenario lives in its own test binary: the supervisor reaps with
//! `waitpid(-1)`, which would steal children from tests running in parallel
//! threads of the same process.

#![allow(dead_code)]

use std::time::Duration;

use reaper::{ExitRecord, LinuxPlatform, ProcessTable, SignalRelay, Supervisor, SupervisorConfig};

pub fn args(command: &[&str]) -> Vec<String> {
    command.iter().map(|a| a.to_string()).collect()
}

pub fn config(include: &[&str], exclude: &[&str]) -> SupervisorConfig {
    SupervisorConfig {
        title: "reaper-test".into(),
        poll_interval: Duration::from_millis(50),
        include: args(include),
        exclude: args(exclude),
        ..SupervisorConfig::default()
    }
}

pub fn supervise(
    relay: &SignalRelay,
    command: &[&str],
    include: &[&str],
    exclude: &[&str],
) -> ExitRecord {
    let supervisor = Supervisor::new(
        LinuxPlatform,
        ProcessTable::for_current_process(),
        relay,
        config(include, exclude),
    );
    supervisor.run(&args(command))
}
