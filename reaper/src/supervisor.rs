//! Supervision loop: spawn the payload, reap everything beneath us and stop
//! once the workload is gone.
//!
//! The loop has two phases. While no monitored process has been seen yet it
//! keeps reaping, which lets launcher scripts exit before the real payload
//! starts. Once the workload is running it keeps reaping until the workload
//! exits. Either phase ends early when the kernel reports no descendants left.

use std::ops::ControlFlow;
use std::thread;

use tracing::{error, info, warn};

use crate::classifier::TreeClassifier;
use crate::config::SupervisorConfig;
use crate::filter::ProcessFilter;
use crate::liveness::{LivenessPoller, WorkloadState};
use crate::platform::Platform;
use crate::reaper::Reaper;
use crate::relay::SignalRelay;
use crate::types::{ExitRecord, SweepResult};
use crate::{status, title};

/// Why the supervision loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    WorkloadExited,
    ChildrenExhausted,
}

pub struct Supervisor<'r, P, C> {
    platform: P,
    classifier: C,
    relay: &'r SignalRelay,
    filter: ProcessFilter,
    config: SupervisorConfig,
}

impl<'r, P: Platform, C: TreeClassifier> Supervisor<'r, P, C> {
    pub fn new(
        platform: P,
        classifier: C,
        relay: &'r SignalRelay,
        config: SupervisorConfig,
    ) -> Self {
        let filter = ProcessFilter::new(&config.include, &config.exclude);
        Self {
            platform,
            classifier,
            relay,
            filter,
            config,
        }
    }

    #[cfg(test)]
    fn platform(&self) -> &P {
        &self.platform
    }

    #[cfg(test)]
    fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Supervise `command` until its workload is gone. Produces exactly one
    /// [`ExitRecord`], which is also published on the status channel.
    pub fn run(&self, command: &[String]) -> ExitRecord {
        if let Err(e) = self.platform.register_as_subreaper() {
            warn!(error = %e, "continuing without subreaper; orphaned descendants may not be reaped");
        }
        title::announce(&self.platform, &self.config.title);

        info!(command = %command.join(" "), "running");
        let pid = match self.platform.spawn(command) {
            Ok(pid) => pid,
            Err(e) => {
                error!(error = %e, "failed to execute process, check that the file exists");
                return self.finish(ExitRecord::no_run());
            }
        };
        info!(pid = %pid, "primary process started");

        let mut reaper = Reaper::new(&self.platform, pid);
        let mut poller = LivenessPoller::new(&self.filter);

        match self.supervise(&mut reaper, &mut poller) {
            LoopExit::WorkloadExited => info!("workload exited"),
            LoopExit::ChildrenExhausted => info!("all children gone"),
        }

        self.finish(ExitRecord {
            primary_pid: Some(pid),
            status: reaper.primary().status,
        })
    }

    fn finish(&self, record: ExitRecord) -> ExitRecord {
        info!(code = record.code(), "exit with return code");
        status::report(
            self.config.run_id.as_deref(),
            &self.config.status_dir,
            &record,
        );
        record
    }

    fn supervise(&self, reaper: &mut Reaper<'_, P>, poller: &mut LivenessPoller<'_>) -> LoopExit {
        while poller.classify(&self.classifier) == WorkloadState::AwaitingStart {
            if self.tick(reaper).is_break() {
                return LoopExit::ChildrenExhausted;
            }
        }
        info!("workload started");

        while poller.classify(&self.classifier) == WorkloadState::Running {
            if self.tick(reaper).is_break() {
                return LoopExit::ChildrenExhausted;
            }
        }

        reaper.drain();
        LoopExit::WorkloadExited
    }

    /// Deliver pending signal work, reap, sleep.
    fn tick(&self, reaper: &mut Reaper<'_, P>) -> ControlFlow<()> {
        self.relay.dispatch(&self.platform, &self.classifier);
        if reaper.drain() == SweepResult::ChildrenExhausted {
            return ControlFlow::Break(());
        }
        thread::sleep(self.config.poll_interval);
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    use super::*;
    use crate::classifier::fake::FakeClassifier;
    use crate::platform::fake::{FakePlatform, PRIMARY, exited};
    use crate::relay::{ESCALATION_PASSES, ShutdownState, signalled};
    use crate::types::ChildExit;

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            title: "test".into(),
            poll_interval: Duration::ZERO,
            ..SupervisorConfig::default()
        }
    }

    fn command(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn spawn_failure_reports_no_run() {
        let relay = SignalRelay::new();
        let platform = FakePlatform {
            spawn_fails: true,
            ..FakePlatform::new()
        };
        let supervisor = Supervisor::new(platform, FakeClassifier::default(), &relay, config());

        let record = supervisor.run(&command(&["/does/not/exist"]));

        assert_eq!(record, ExitRecord::no_run());
        assert_eq!(record.code(), 0);
        assert_eq!(*supervisor.platform().reap_calls.borrow(), 0);
        assert_eq!(*supervisor.classifier().queries.borrow(), 0);
    }

    #[test]
    fn empty_command_reports_no_run() {
        let relay = SignalRelay::new();
        let supervisor =
            Supervisor::new(FakePlatform::new(), FakeClassifier::default(), &relay, config());

        assert_eq!(supervisor.run(&[]), ExitRecord::no_run());
        assert!(supervisor.platform().spawned.borrow().is_empty());
    }

    #[test]
    fn workload_exit_ends_loop_with_primary_status() {
        let relay = SignalRelay::new();
        let platform = FakePlatform::new().script([
            SweepResult::NoneAvailable,
            exited(100, 7),
            SweepResult::NoneAvailable,
        ]);
        let classifier = FakeClassifier::new([true, true, false], Vec::new());
        let supervisor = Supervisor::new(platform, classifier, &relay, config());

        let record = supervisor.run(&command(&["game", "--fullscreen"]));

        assert_eq!(record.primary_pid, Some(PRIMARY));
        assert_eq!(record.status, Some(ChildExit::Exited(7)));
        assert_eq!(record.code(), 7);
        assert_eq!(
            supervisor.platform().spawned.borrow().as_slice(),
            &[command(&["game", "--fullscreen"])]
        );
        assert_eq!(supervisor.platform().titles.borrow()[0].to_str().unwrap(), "test");
    }

    #[test]
    fn exhausted_children_end_loop_before_workload_starts() {
        let relay = SignalRelay::new();
        // Launcher exits with 3, nothing monitored ever shows up.
        let platform = FakePlatform::new().script([SweepResult::NoneAvailable, exited(100, 3)]);
        let classifier = FakeClassifier::new([false], Vec::new());
        let supervisor = Supervisor::new(platform, classifier, &relay, config());

        let record = supervisor.run(&command(&["launcher"]));

        assert_eq!(record.code(), 3);
        assert_eq!(*supervisor.classifier().queries.borrow(), 2);
    }

    #[test]
    fn grandchild_keeps_workload_running_after_primary_exits() {
        let relay = SignalRelay::new();
        // Primary (launcher) exits early; the grandchild stays alive for two
        // more polls and is reaped after the workload is gone.
        let platform = FakePlatform::new().script([
            SweepResult::NoneAvailable,
            exited(100, 0),
            SweepResult::NoneAvailable,
            SweepResult::NoneAvailable,
            exited(200, 0),
            SweepResult::NoneAvailable,
        ]);
        let classifier = FakeClassifier::new([false, true, true, true, false], Vec::new());
        let supervisor = Supervisor::new(platform, classifier, &relay, config());

        let record = supervisor.run(&command(&["launcher"]));

        assert_eq!(record.status, Some(ChildExit::Exited(0)));
        assert_eq!(*supervisor.classifier().queries.borrow(), 5);
        assert!(supervisor.platform().wait_script.borrow().is_empty());
    }

    #[test]
    fn run_id_publishes_final_status() {
        let dir = tempfile::tempdir().unwrap();
        let relay = SignalRelay::new();
        let platform = FakePlatform::new().script([exited(100, 9)]);
        let config = SupervisorConfig {
            run_id: Some("session".into()),
            status_dir: dir.path().to_path_buf(),
            ..config()
        };
        let supervisor =
            Supervisor::new(platform, FakeClassifier::new([true], Vec::new()), &relay, config);

        assert_eq!(supervisor.run(&command(&["game"])).code(), 9);

        let content =
            std::fs::read_to_string(dir.path().join("reaper-status-session.json")).unwrap();
        let status: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(status["exit_code"], 9);
        assert_eq!(status["primary_pid"], PRIMARY.as_raw());
    }

    #[test]
    fn spawn_failure_publishes_zero_status() {
        let dir = tempfile::tempdir().unwrap();
        let relay = SignalRelay::new();
        let platform = FakePlatform {
            spawn_fails: true,
            ..FakePlatform::new()
        };
        let config = SupervisorConfig {
            run_id: Some("broken".into()),
            status_dir: dir.path().to_path_buf(),
            ..config()
        };
        let supervisor = Supervisor::new(platform, FakeClassifier::default(), &relay, config);

        supervisor.run(&command(&["/does/not/exist"]));

        let content =
            std::fs::read_to_string(dir.path().join("reaper-status-broken.json")).unwrap();
        let status: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(status["exit_code"], 0);
        assert!(status.get("primary_pid").is_none());
    }

    #[test]
    fn subreaper_failure_is_not_fatal() {
        let relay = SignalRelay::new();
        let platform = FakePlatform {
            subreaper_supported: false,
            ..FakePlatform::new()
        }
        .script([exited(100, 5)]);
        let supervisor =
            Supervisor::new(platform, FakeClassifier::new([true], Vec::new()), &relay, config());

        assert_eq!(supervisor.run(&command(&["game"])).code(), 5);
    }

    #[test]
    fn pending_signals_reach_the_tree() {
        let relay = SignalRelay::new();
        let tree = vec![PRIMARY, Pid::from_raw(200)];
        let platform = FakePlatform::new().script([
            SweepResult::NoneAvailable,
            SweepResult::Collected {
                pid: PRIMARY,
                status: ChildExit::Signaled(libc::SIGKILL),
            },
        ]);
        let classifier = FakeClassifier::new([true, true], tree.clone());
        let supervisor = Supervisor::new(platform, classifier, &relay, config());

        relay.on_signal(Signal::SIGTERM);
        relay.on_signal(Signal::SIGTERM);
        let record = supervisor.run(&command(&["game"]));

        let signals = supervisor.platform().signals.borrow();
        assert_eq!(signalled(&signals, Signal::SIGTERM), tree);
        assert_eq!(
            signalled(&signals, Signal::SIGKILL).len(),
            ESCALATION_PASSES * tree.len()
        );
        assert_eq!(relay.state(), ShutdownState::Escalated);
        assert_eq!(record.code(), 137);
    }
}
