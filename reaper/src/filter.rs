//! Which descendant processes count as the workload.

use std::collections::HashSet;

/// Longest process name the kernel keeps in `comm` (TASK_COMM_LEN minus NUL).
pub const COMM_LEN: usize = 15;

/// Infrastructure processes that never count as the workload unless a caller
/// explicitly includes them.
pub const HELPER_PROCESSES: &[&str] = &[
    "wineserver",
    "wine",
    "wine64",
    "wine-preloader",
    "wine64-preloader",
    "services.exe",
    "winedevice.exe",
    "plugplay.exe",
    "explorer.exe",
    "wineboot.exe",
    "svchost.exe",
    "rpcss.exe",
    "rundll32.exe",
    "mscorsvw.exe",
    "iexplore.exe",
    "winemenubuilder.exe",
    "tabtip.exe",
    "conhost.exe",
    "steam.exe",
    "steamwebhelper.exe",
    "steamerrorreporter.exe",
    "gameoverlayui.exe",
    "gldriverquery",
    "gldriverquery64",
    "vulkandriverquery",
    "vulkandriverquery64",
];

/// Truncate `name` the way the kernel truncates `comm`, on a char boundary.
pub fn truncate_comm(name: &str) -> &str {
    if name.len() <= COMM_LEN {
        return name;
    }
    let mut end = COMM_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.get(..end).unwrap_or(name)
}

/// Include/exclude classification of process names.
///
/// A name is monitored unless it is in `(exclude ∪ helpers) \ include`.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    unmonitored: HashSet<String>,
}

impl ProcessFilter {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let include: HashSet<String> = include
            .into_iter()
            .map(|name| truncate_comm(name.as_ref()).to_string())
            .collect();

        let unmonitored = exclude
            .into_iter()
            .map(|name| truncate_comm(name.as_ref()).to_string())
            .chain(HELPER_PROCESSES.iter().map(|name| truncate_comm(name).to_string()))
            .filter(|name| !include.contains(name))
            .collect();

        Self { unmonitored }
    }

    /// Whether a process with this name counts toward the workload.
    pub fn is_monitored(&self, name: &str) -> bool {
        !name.is_empty() && !self.unmonitored.contains(truncate_comm(name))
    }
}
