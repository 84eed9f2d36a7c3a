//! Process-tree supervisor.
//!
//! Launches a program, adopts every descendant it orphans, decides when the
//! real workload has started and finished, and relays termination requests
//! through the whole tree with escalating force.
//!
//! - [`supervisor`]: orchestration loop
//! - [`reaper`]: non-blocking collection of terminated descendants
//! - [`liveness`]: AwaitingStart / Running / Exited tracking
//! - [`relay`]: SIGINT/SIGTERM handling with one-shot escalation
//! - [`platform`] and [`classifier`]: OS seams, replaceable in tests

pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod liveness;
pub mod platform;
pub mod reaper;
pub mod relay;
pub mod status;
pub mod supervisor;
pub mod title;
pub mod types;

pub use classifier::{ProcessTable, TreeClassifier};
pub use config::SupervisorConfig;
pub use error::{PlatformError, SpawnError, StatusError};
pub use filter::ProcessFilter;
pub use liveness::{LivenessPoller, WorkloadState};
pub use platform::{LinuxPlatform, Platform};
pub use reaper::{PrimaryProcess, Reaper};
pub use relay::{RelayAction, ShutdownState, SignalRelay};
pub use supervisor::{LoopExit, Supervisor};
pub use types::{ChildExit, ExitRecord, SweepResult};
