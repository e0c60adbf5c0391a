use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;
use crate::cancel::CancellationController;
use crate::engine::Engine;
use crate::error::JobError;
use crate::lines::DiagnosticLines;
use crate::presenter::Presenter;

/// How a job ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// ffmpeg exited successfully
    Converted { output: PathBuf, elapsed: Duration },
    /// The output already existed and the user declined to overwrite it
    Skipped { output: PathBuf },
}

/// One in-flight invocation of ffmpeg on one source file
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub source: PathBuf,
    pub output: PathBuf,
    pub started_at: Instant,
    /// Total source duration in seconds; 0.0 when unknown
    pub total_duration: f64,
}

/// Why the supervision loop asked ffmpeg to stop
#[derive(Debug, Clone, Copy)]
enum StopReason {
    Cancelled,
    TimedOut(u64),
}

// Placeholder deadline for timers that are not armed yet
const IDLE_TIMER: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs one ffmpeg subprocess per call, registered with the cancellation controller
pub struct JobRunner {
    engine: Engine,
    controller: Arc<CancellationController>,
}

impl JobRunner {
    pub fn new(engine: Engine, controller: Arc<CancellationController>) -> Self {
        JobRunner { engine, controller }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn controller(&self) -> &Arc<CancellationController> {
        &self.controller
    }

    /// Transcode `source` into `output`
    ///
    /// If `output` exists, `presenter` decides whether it may be overwritten;
    /// declining yields [`JobOutcome::Skipped`] and leaves the file untouched.
    /// Every line of ffmpeg's diagnostic stream (stderr) is handed to
    /// `on_line` together with the total duration and the start time, in
    /// the order it was written. The active-process registration is always
    /// cleared before returning.
    pub async fn run_job<F>(
        &self,
        source: &Path,
        output: &Path,
        presenter: Arc<dyn Presenter>,
        mut on_line: F,
    ) -> Result<JobOutcome, JobError>
    where
        F: FnMut(&str, f64, Instant),
    {
        if output.exists() {
            let prompt_path = output.to_path_buf();
            let overwrite = tokio::task::spawn_blocking(move || presenter.confirm_overwrite(&prompt_path))
                .await
                .map_err(|e| JobError::Io(std::io::Error::other(e.to_string())))?;
            if !overwrite {
                info!("Skipped {}", output.display());
                return Ok(JobOutcome::Skipped {
                    output: output.to_path_buf(),
                });
            }
        }

        let started_at = Instant::now();
        let total_duration = self.engine.get_duration(source).await;
        let job = TranscodeJob {
            id: Uuid::new_v4(),
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            started_at,
            total_duration,
        };

        info!("Job {}: converting {} -> {}", job.id, source.display(), output.display());

        let bin = self.engine.config().ffmpeg_bin.clone();
        let mut child = self
            .engine
            .transcode_command(source, output)
            .spawn()
            .map_err(|e| JobError::Spawn { bin, source: e })?;

        let terminate = match self.controller.register(job.id, job.source.clone(), child.id()) {
            Ok(rx) => rx,
            Err(e) => {
                // Stop was requested between jobs; do not let this one run
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(e);
            }
        };

        let result = self.supervise(&mut child, terminate, &job, &mut on_line).await;
        self.controller.clear(job.id);

        match &result {
            Ok(JobOutcome::Converted { elapsed, .. }) => {
                info!("Converted {} to {} in {:.1?}", source.display(), output.display(), elapsed);
            }
            Ok(JobOutcome::Skipped { .. }) => {}
            Err(e) => {
                warn!("Job {}: {} failed: {}", job.id, source.display(), e);
                remove_partial_output(output);
            }
        }

        result
    }

    /// Pump output lines until ffmpeg exits, honouring termination requests and the watchdog
    async fn supervise<F>(
        &self,
        child: &mut Child,
        mut terminate: oneshot::Receiver<()>,
        job: &TranscodeJob,
        on_line: &mut F,
    ) -> Result<JobOutcome, JobError>
    where
        F: FnMut(&str, f64, Instant),
    {
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stderr was not captured"))?;
        let mut stdin = child.stdin.take();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(forward_lines(stderr, tx));

        let cfg = self.engine.config();
        let grace = Duration::from_secs(cfg.terminate_grace_secs);
        let watchdog_secs = cfg.job_timeout_secs;

        let kill_timer = tokio::time::sleep(IDLE_TIMER);
        tokio::pin!(kill_timer);
        let watchdog = tokio::time::sleep(watchdog_secs.map(Duration::from_secs).unwrap_or(IDLE_TIMER));
        tokio::pin!(watchdog);

        let mut stop: Option<StopReason> = None;
        let mut terminate_closed = false;
        let mut killed = false;

        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => on_line(&line, job.total_duration, job.started_at),
                    None => break,
                },
                signal = &mut terminate, if stop.is_none() && !terminate_closed => {
                    if signal.is_ok() {
                        stop = Some(StopReason::Cancelled);
                        killed = self.request_quit(child, &mut stdin).await;
                        kill_timer.as_mut().reset(tokio::time::Instant::now() + grace);
                    } else {
                        terminate_closed = true;
                    }
                },
                () = &mut watchdog, if stop.is_none() && watchdog_secs.is_some() => {
                    let secs = watchdog_secs.unwrap_or_default();
                    warn!("Job {}: no exit after {}s, terminating", job.id, secs);
                    stop = Some(StopReason::TimedOut(secs));
                    killed = self.request_quit(child, &mut stdin).await;
                    kill_timer.as_mut().reset(tokio::time::Instant::now() + grace);
                },
                () = &mut kill_timer, if stop.is_some() && !killed => {
                    warn!("Job {}: ffmpeg ignored quit request for {:?}, killing", job.id, grace);
                    self.force_kill(child).await;
                    killed = true;
                },
            }
        }

        let status = child.wait().await?;
        let _ = reader_task.await;
        debug!("Job {}: ffmpeg exited with {}", job.id, status);

        match stop {
            Some(StopReason::Cancelled) => Err(JobError::Cancelled),
            Some(StopReason::TimedOut(secs)) => Err(JobError::TimedOut { secs }),
            None if !status.success() => Err(JobError::EngineExitedNonZero { code: status.code() }),
            None => Ok(JobOutcome::Converted {
                output: job.output.clone(),
                elapsed: job.started_at.elapsed(),
            }),
        }
    }

    /// Ask ffmpeg to quit the way an interactive user would; kill it if stdin is gone
    ///
    /// Returns `true` if the process had to be killed outright.
    async fn request_quit(&self, child: &mut Child, stdin: &mut Option<ChildStdin>) -> bool {
        if let Some(pipe) = stdin.as_mut() {
            if pipe.write_all(b"q\n").await.is_ok() && pipe.flush().await.is_ok() {
                return false;
            }
        }
        self.force_kill(child).await;
        true
    }

    /// Kill the transcode, taking the shell wrapper's children down with it
    async fn force_kill(&self, child: &mut Child) {
        if let Some(mut taskkill) = child.id().and_then(|pid| self.engine.tree_kill_command(pid)) {
            if let Err(e) = taskkill.status().await {
                warn!("Failed to kill ffmpeg process tree: {}", e);
            }
        }
        let _ = child.start_kill();
    }
}


async fn forward_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = DiagnosticLines::new(BufReader::new(stream));
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading ffmpeg output: {}", e);
                break;
            }
        }
    }
}

fn remove_partial_output(output: &Path) {
    if output.exists() {
        match std::fs::remove_file(output) {
            Ok(()) => debug!("Removed partial output {}", output.display()),
            Err(e) => warn!("Failed to remove partial output {}: {}", output.display(), e),
        }
    }
}
