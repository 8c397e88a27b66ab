//! Typed failures of the script lifecycle.
//!
//! Most code paths return `anyhow::Result`; the variants here are the ones callers need to
//! tell apart (and tests need to match on) via `downcast_ref::<ScriptError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    /// No process was ever registered for this path.
    #[error("{path} has not been started")]
    NotStarted { path: String },
    /// A live process is already registered and the restart policy is `refuse`.
    #[error("{path} is already running (pid {pid})")]
    AlreadyRunning { path: String, pid: u32 },
    /// The log file does not exist yet.
    #[error("no log for {path} (has it been started?)")]
    LogMissing { path: String },
    /// The interpreter or the script could not be spawned.
    #[error("failed to spawn {program} for {path}")]
    Spawn {
        path: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScriptError {
    pub fn not_started(path: &str) -> Self {
        Self::NotStarted {
            path: path.to_string(),
        }
    }
}
