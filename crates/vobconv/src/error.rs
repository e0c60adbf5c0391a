use std::path::PathBuf;
use thiserror::Error;

/// The ffmpeg binary could not be started; fatal for the whole batch
#[derive(Debug, Error)]
#[error("ffmpeg is not installed or not found at {bin}: {reason}")]
pub struct EngineUnavailable {
    pub bin: PathBuf,
    pub reason: String,
}

/// Failure of a single transcode job
#[derive(Debug, Error)]
pub enum JobError {
    #[error("ffmpeg exited with status {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "<signal>".to_string()))]
    EngineExitedNonZero { code: Option<i32> },

    #[error("transcode was cancelled")]
    Cancelled,

    #[error("transcode exceeded the {secs}s watchdog and was terminated")]
    TimedOut { secs: u64 },

    #[error("failed to spawn {bin}: {source}")]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("another transcode is already registered as active")]
    SlotOccupied,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Whether this failure must stop the batch instead of moving on to the next file
    pub fn aborts_batch(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

/// Failure of a whole batch run
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    EngineUnavailable(#[from] EngineUnavailable),

    #[error("directory does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("conversion cancelled after {completed} of {total} files")]
    Cancelled { completed: usize, total: usize },

    #[error("batch task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancellation_aborts_batch() {
        assert!(JobError::Cancelled.aborts_batch());
        assert!(!JobError::EngineExitedNonZero { code: Some(1) }.aborts_batch());
        assert!(!JobError::TimedOut { secs: 10 }.aborts_batch());
        assert!(!JobError::SlotOccupied.aborts_batch());
    }

    #[test]
    fn test_exit_status_message() {
        let e = JobError::EngineExitedNonZero { code: Some(69) };
        assert_eq!(e.to_string(), "ffmpeg exited with status 69");
        let e = JobError::EngineExitedNonZero { code: None };
        assert_eq!(e.to_string(), "ffmpeg exited with status <signal>");
    }

    #[test]
    fn test_engine_unavailable_message_names_binary() {
        let e = EngineUnavailable {
            bin: PathBuf::from("/opt/ffmpeg"),
            reason: "No such file or directory".to_string(),
        };
        assert!(e.to_string().contains("/opt/ffmpeg"));
    }
}
