//! Enumerates the live descendants of the supervisor and classifies them
//! against a [`ProcessFilter`].
//!
//! Every query takes a fresh snapshot of the process table. Nothing is cached
//! between calls, so a process that appears and vanishes between two polls is
//! simply never seen rather than reported stale.

use std::cell::RefCell;
use std::collections::HashMap;

use nix::unistd::Pid;
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::trace;

use crate::filter::ProcessFilter;

pub trait TreeClassifier {
    /// True if at least one running descendant is monitored by `filter`.
    fn is_alive(&self, filter: &ProcessFilter) -> bool;

    /// Pids of all current descendants, recomputed on every call.
    fn children(&self) -> Vec<Pid>;
}

/// One row of a process-table snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcEntry {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub zombie: bool,
}

/// All transitive descendants of `root` in `table`.
pub fn descendants(root: u32, table: &[ProcEntry]) -> Vec<&ProcEntry> {
    let mut by_parent: HashMap<u32, Vec<&ProcEntry>> = HashMap::new();
    for entry in table {
        if let Some(parent) = entry.parent
            && parent != entry.pid
        {
            by_parent.entry(parent).or_default().push(entry);
        }
    }

    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(pid) = frontier.pop() {
        if let Some(children) = by_parent.remove(&pid) {
            for child in children {
                frontier.push(child.pid);
                found.push(child);
            }
        }
    }
    found
}

/// [`TreeClassifier`] over the live OS process table.
pub struct ProcessTable {
    root: u32,
    system: RefCell<System>,
}

impl ProcessTable {
    /// Classifier rooted at the calling process.
    pub fn for_current_process() -> Self {
        Self::rooted_at(std::process::id())
    }

    pub fn rooted_at(root: u32) -> Self {
        Self {
            root,
            system: RefCell::new(System::new()),
        }
    }

    fn snapshot(&self) -> Vec<ProcEntry> {
        let mut system = self.system.borrow_mut();
        // Name, parent and state come with every refresh; skip cpu, memory,
        // disk and exe collection.
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new(),
        );
        system
            .processes()
            .values()
            .filter(|process| process.thread_kind().is_none())
            .map(|process| ProcEntry {
                pid: process.pid().as_u32(),
                parent: process.parent().map(|parent| parent.as_u32()),
                name: process.name().to_string_lossy().into_owned(),
                zombie: matches!(process.status(), ProcessStatus::Zombie),
            })
            .collect()
    }
}

impl TreeClassifier for ProcessTable {
    fn is_alive(&self, filter: &ProcessFilter) -> bool {
        let table = self.snapshot();
        descendants(self.root, &table).into_iter().any(|entry| {
            let monitored = !entry.zombie && filter.is_monitored(&entry.name);
            trace!(pid = entry.pid, name = %entry.name, monitored, "descendant");
            monitored
        })
    }

    fn children(&self) -> Vec<Pid> {
        let table = self.snapshot();
        descendants(self.root, &table)
            .into_iter()
            .filter_map(|entry| i32::try_from(entry.pid).ok())
            .map(Pid::from_raw)
            .collect()
    }
}
