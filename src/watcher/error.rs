//! Error types for the watch engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watch engine operations.
///
/// Startup errors (`ProcessNotFound`, `EmptyWatchList`, `NotADirectory`) are
/// fatal to [`run`](crate::watcher::WatchEngine::run); errors while servicing
/// a notification batch are logged and the loop keeps going.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("No watch roots configured")]
    EmptyWatchList,

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Notification channel closed unexpectedly")]
    ChannelClosed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
