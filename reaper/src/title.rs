//! Process title shown in `ps`/`top` for the supervisor.

use std::ffi::CString;

use tracing::debug;

use crate::filter::truncate_comm;
use crate::platform::Platform;

const DEFAULT_TITLE: &str = "reaper-wrapper";

/// Kernel-sized `comm` label for `title`. Interior NULs are dropped and an
/// empty title falls back to the binary name.
pub fn comm_label(title: &str) -> CString {
    let cleaned: String = title.chars().filter(|c| *c != '\0').collect();
    let label = truncate_comm(cleaned.trim());
    let label = if label.is_empty() { DEFAULT_TITLE } else { label };
    CString::new(label).unwrap_or_default()
}

/// Best effort: failure only logs.
pub fn announce<P: Platform + ?Sized>(platform: &P, title: &str) {
    let label = comm_label(title);
    if let Err(e) = platform.set_title(&label) {
        debug!(error = %e, "process title not supported");
    }
}
