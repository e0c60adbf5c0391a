use std::path::Path;
use crate::error::JobError;
use crate::job::JobOutcome;
use crate::progress::{BatchProgress, FileProgress};
use crate::scan::SourceFile;

/// Everything the conversion core needs from a user interface
///
/// The core never touches widgets or terminals; it reports through this
/// trait and the UI adapter decides how to render. `confirm_overwrite` may
/// block (it is called on a blocking thread); the other methods are called
/// inline from the batch task and should return quickly.
pub trait Presenter: Send + Sync {
    /// Ask whether an existing output file may be overwritten
    fn confirm_overwrite(&self, output: &Path) -> bool;

    /// A file is about to be converted
    fn file_started(&self, _source: &SourceFile) {}

    /// Per-file progress, in the order ffmpeg reported it
    fn file_progress(&self, _progress: &FileProgress) {}

    /// Batch progress, once per finished file, with a strictly increasing completed count
    fn batch_progress(&self, _progress: &BatchProgress) {}

    /// A file finished, was skipped, or failed
    fn file_finished(&self, _source: &SourceFile, _result: &Result<JobOutcome, JobError>) {}
}
