//! Final status side channel.
//!
//! When a run id is configured, the exit record is published as a JSON file
//! keyed by that id so a launcher that lost track of the process can still
//! read the outcome.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::StatusError;
use crate::types::ExitRecord;

#[derive(Debug, Serialize)]
struct StatusDocument<'a> {
    run_id: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_pid: Option<i32>,
    finished_at: String,
}

/// Directory holding status files: `$XDG_RUNTIME_DIR`, else the temp dir.
pub fn status_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}

pub fn status_path(dir: &Path, run_id: &str) -> PathBuf {
    let safe: String = run_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("reaper-status-{safe}.json"))
}

/// Atomic write: write to a temp file in the same directory, then rename.
pub fn write_status(path: &Path, run_id: &str, record: &ExitRecord) -> Result<(), StatusError> {
    let document = StatusDocument {
        run_id,
        exit_code: record.code(),
        primary_pid: record.primary_pid.map(|pid| pid.as_raw()),
        finished_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    };
    let json = serde_json::to_string_pretty(&document)?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(|source| StatusError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StatusError::Rename {
        from: tmp.clone(),
        to: path.to_path_buf(),
        source,
    })
}

/// Publish `record` under `dir` if a run id is present. Failures only log.
pub fn report(run_id: Option<&str>, dir: &Path, record: &ExitRecord) {
    let Some(id) = run_id else {
        return;
    };
    let path = status_path(dir, id);
    match write_status(&path, id, record) {
        Ok(()) => info!(path = %path.display(), "status written"),
        Err(e) => warn!(error = %e, "failed to write status"),
    }
}
