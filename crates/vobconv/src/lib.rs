pub mod config;
pub mod error;
pub mod engine;
pub mod duration;
pub mod progress;
pub mod lines;
pub mod cancel;
pub mod presenter;
pub mod scan;
pub mod job;
pub mod batch;

pub use config::ConvertConfig;
pub use error::{BatchError, EngineUnavailable, JobError};
pub use engine::Engine;
pub use progress::{BatchProgress, FileProgress, ProgressParser};
pub use cancel::CancellationController;
pub use presenter::Presenter;
pub use scan::SourceFile;
pub use job::{JobOutcome, JobRunner, TranscodeJob};
pub use batch::{BatchSummary, BatchTask, BatchWalker};
