use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use crate::cancel::CancellationController;
use crate::config::ConvertConfig;
use crate::engine::Engine;
use crate::error::{BatchError, JobError};
use crate::job::{JobOutcome, JobRunner};
use crate::presenter::Presenter;
use crate::progress::{BatchProgress, ProgressParser};
use crate::scan::{self, SourceFile};

/// Result of a batch that ran to the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub files_total: usize,
    pub files_converted: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub total_elapsed: Duration,
}

/// Drives one job per discovered source file, strictly one after another
pub struct BatchWalker {
    runner: JobRunner,
}

impl BatchWalker {
    pub fn new(cfg: ConvertConfig, controller: Arc<CancellationController>) -> Self {
        BatchWalker {
            runner: JobRunner::new(Engine::new(cfg), controller),
        }
    }

    pub fn controller(&self) -> &Arc<CancellationController> {
        self.runner.controller()
    }

    fn config(&self) -> &ConvertConfig {
        self.runner.engine().config()
    }

    /// Convert every source file under `root`
    ///
    /// Probes ffmpeg first and fails before touching the tree if it is
    /// missing. The file list is enumerated once and serves as both the
    /// progress denominator and the work order. A failed file is reported
    /// and the batch moves on; a cancelled file stops the batch.
    pub async fn run_batch(
        &self,
        root: &Path,
        presenter: Arc<dyn Presenter>,
    ) -> Result<BatchSummary, BatchError> {
        let started = Instant::now();
        let controller = self.controller();

        self.runner.engine().probe().await?;

        let sources = scan::discover_sources(self.config(), root)?;
        let total = sources.len();
        info!("Converting {} file(s) under {}", total, root.display());

        let mut summary = BatchSummary {
            files_total: total,
            files_converted: 0,
            files_skipped: 0,
            files_failed: 0,
            total_elapsed: Duration::ZERO,
        };

        for (index, source) in sources.iter().enumerate() {
            if controller.stop_requested() {
                return Err(BatchError::Cancelled { completed: index, total });
            }

            let result = self.convert_one(source, presenter.clone()).await;
            presenter.file_finished(source, &result);

            match &result {
                Ok(JobOutcome::Converted { .. }) => summary.files_converted += 1,
                Ok(JobOutcome::Skipped { .. }) => summary.files_skipped += 1,
                Err(e) if e.aborts_batch() => {
                    warn!("Batch cancelled while converting {}", source.path.display());
                    return Err(BatchError::Cancelled { completed: index, total });
                }
                Err(e) => {
                    error!("Failed to convert {}: {}", source.path.display(), e);
                    summary.files_failed += 1;
                }
            }

            presenter.batch_progress(&BatchProgress::new(index + 1, total));
        }

        summary.total_elapsed = started.elapsed();
        info!(
            "Batch finished in {:.1?}: {} converted, {} skipped, {} failed",
            summary.total_elapsed, summary.files_converted, summary.files_skipped, summary.files_failed
        );
        Ok(summary)
    }

    async fn convert_one(&self, source: &SourceFile, presenter: Arc<dyn Presenter>) -> Result<JobOutcome, JobError> {
        let output = self.config().output_path_for(&source.path);
        presenter.file_started(source);

        let sink = presenter.clone();
        let mut parser: Option<ProgressParser> = None;
        self.runner
            .run_job(&source.path, &output, presenter, move |line, total, started| {
                let parser = parser.get_or_insert_with(|| ProgressParser::new(total, started));
                if let Some(progress) = parser.feed(line) {
                    sink.file_progress(&progress);
                }
            })
            .await
    }
}

/// Handle on a batch running in the background
///
/// The caller can cancel it, poll whether it is done, and await its result.
pub struct BatchTask {
    handle: JoinHandle<Result<BatchSummary, BatchError>>,
    controller: Arc<CancellationController>,
}

impl BatchTask {
    /// Start `walker` on the current tokio runtime
    pub fn spawn(walker: BatchWalker, root: PathBuf, presenter: Arc<dyn Presenter>) -> Self {
        let controller = walker.controller().clone();
        controller.reset();
        let handle = tokio::spawn(async move { walker.run_batch(&root, presenter).await });
        BatchTask { handle, controller }
    }

    /// Stop dispatching files and terminate the running transcode, if any
    pub fn cancel(&self) {
        self.controller.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the batch to end and return its terminal result
    ///
    /// Borrowing keeps the handle usable inside `select!`; do not call again
    /// once it has returned.
    pub async fn wait(&mut self) -> Result<BatchSummary, BatchError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => Err(BatchError::Task(e.to_string())),
        }
    }
}
