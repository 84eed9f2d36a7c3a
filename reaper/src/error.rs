use std::path::PathBuf;

/// Failure to start the primary process.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to execute {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned process id {0} does not fit a pid_t")]
    InvalidPid(u32),
}

/// Failure of an OS-level process operation.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("subreaper registration unsupported: {0}")]
    SubreaperUnsupported(nix::Error),

    #[error("waitpid failed: {0}")]
    Wait(nix::Error),

    #[error("failed to send {signal} to {pid}: {source}")]
    Signal {
        pid: nix::unistd::Pid,
        signal: nix::sys::signal::Signal,
        source: nix::Error,
    },

    #[error("failed to set process title: {0}")]
    Title(nix::Error),
}

/// Failure to publish the final status file.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("serialize status: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T, E = PlatformError> = std::result::Result<T, E>;
