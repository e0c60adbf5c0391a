use anyhow::{Context, Result};
use clap::Parser;
use humansize::{format_size, DECIMAL};
use log::{error, info, warn, LevelFilter};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use vobconv::{
    BatchError, BatchProgress, BatchTask, BatchWalker, CancellationController, ConvertConfig,
    FileProgress, JobError, JobOutcome, Presenter, SourceFile,
};

/// Convert every VOB file under a directory to MP4 with ffmpeg
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to convert (prompted for when omitted)
    directory: Option<PathBuf>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Overwrite existing outputs without asking
    #[arg(short = 'y', long, conflicts_with = "no")]
    yes: bool,

    /// Never overwrite existing outputs
    #[arg(short = 'n', long)]
    no: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// How overwrite prompts are answered
#[derive(Debug, Clone, Copy)]
enum OverwriteMode {
    Ask,
    Always,
    Never,
}

/// Terminal rendering of batch progress
struct ConsolePresenter {
    overwrite: OverwriteMode,
    // Last per-file percent logged, to avoid one log line per ffmpeg status line
    last_percent: Mutex<Option<u8>>,
}

impl ConsolePresenter {
    fn new(overwrite: OverwriteMode) -> Self {
        ConsolePresenter {
            overwrite,
            last_percent: Mutex::new(None),
        }
    }
}

impl Presenter for ConsolePresenter {
    fn confirm_overwrite(&self, output: &Path) -> bool {
        match self.overwrite {
            OverwriteMode::Always => true,
            OverwriteMode::Never => false,
            OverwriteMode::Ask => {
                let question = format!("File '{}' already exists. Overwrite? [y/N] ", output.display());
                match prompt(&question) {
                    Ok(Some(answer)) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
                    _ => false,
                }
            }
        }
    }

    fn file_started(&self, source: &SourceFile) {
        if let Ok(mut last) = self.last_percent.lock() {
            *last = None;
        }
        info!("Converting: {}", source.display_name());
    }

    fn file_progress(&self, progress: &FileProgress) {
        let Ok(mut last) = self.last_percent.lock() else {
            return;
        };
        match progress.percent {
            Some(percent) if *last != Some(percent) => {
                *last = Some(percent);
                info!("  file {:>3}% | {}", percent, progress.remaining_text());
            }
            None if last.is_none() => {
                // Duration unknown: say so once per file
                *last = Some(0);
                info!("  file progress unavailable | {}", progress.remaining_text());
            }
            _ => {}
        }
    }

    fn batch_progress(&self, progress: &BatchProgress) {
        info!("Overall: {}% ({}/{})", progress.percent, progress.completed, progress.total);
    }

    fn file_finished(&self, source: &SourceFile, outcome: &Result<JobOutcome, JobError>) {
        match outcome {
            Ok(JobOutcome::Converted { output, elapsed }) => {
                let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
                let elapsed = chrono::Duration::from_std(*elapsed).unwrap_or_else(|_| chrono::Duration::zero());
                info!(
                    "✅ Converted {} to {} in {} ({})",
                    source.path.display(),
                    output.display(),
                    format_duration(elapsed),
                    format_size(size, DECIMAL)
                );
            }
            Ok(JobOutcome::Skipped { output }) => info!("⏭️  Skipped {}", output.display()),
            Err(JobError::Cancelled) => warn!("⏹️  Cancelled {}", source.path.display()),
            Err(e) => error!("❌ {}: {}", source.path.display(), e),
        }
    }
}

/// Print `question` and read one trimmed line from stdin; `None` on EOF
fn prompt(question: &str) -> Result<Option<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", question)?;
    stderr.flush()?;

    let mut answer = String::new();
    let read = io::stdin().lock().read_line(&mut answer).context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(answer.trim().to_string()))
}

/// Resolve the directory to convert; `None` means the user cancelled the selection
fn select_directory(arg: Option<PathBuf>) -> Result<Option<PathBuf>> {
    let dir = match arg {
        Some(dir) => dir,
        None => match prompt("Directory to convert (empty to cancel): ")? {
            Some(answer) if !answer.is_empty() => PathBuf::from(answer),
            _ => return Ok(None),
        },
    };

    let dir = std::path::absolute(&dir)
        .with_context(|| format!("Failed to resolve directory: {}", dir.display()))?;
    Ok(Some(dir))
}

/// Helper function to format duration for logging
fn format_duration(d: chrono::Duration) -> String {
    let hours = d.num_hours();
    let minutes = d.num_minutes() % 60;
    let seconds = d.num_seconds() % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger - RUST_LOG overrides the default level
    let default_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let mut cfg = ConvertConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(ffmpeg) = args.ffmpeg {
        cfg.ffmpeg_bin = ffmpeg;
    }

    let Some(directory) = select_directory(args.directory)? else {
        info!("No directory selected, nothing to do");
        return Ok(());
    };

    let overwrite = if args.yes {
        OverwriteMode::Always
    } else if args.no {
        OverwriteMode::Never
    } else {
        OverwriteMode::Ask
    };

    info!(
        "Converting .{} files under {} with {}",
        cfg.source_extension,
        directory.display(),
        cfg.ffmpeg_bin.display()
    );

    let controller = Arc::new(CancellationController::new());
    let walker = BatchWalker::new(cfg, controller.clone());
    let presenter: Arc<dyn Presenter> = Arc::new(ConsolePresenter::new(overwrite));
    let mut task = BatchTask::spawn(walker, directory, presenter);

    // Shutdown hook: terminate the running ffmpeg before exiting
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let result = loop {
        tokio::select! {
            result = task.wait() => break result,
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                warn!("Interrupted, stopping conversion...");
                controller.request_stop();
            }
        }
    };

    match result {
        Ok(summary) => {
            let elapsed = chrono::Duration::from_std(summary.total_elapsed)
                .unwrap_or_else(|_| chrono::Duration::zero());
            info!(
                "All {} files have been converted in {} ({} converted, {} skipped, {} failed).",
                summary.files_total,
                format_duration(elapsed),
                summary.files_converted,
                summary.files_skipped,
                summary.files_failed
            );
            Ok(())
        }
        Err(BatchError::Cancelled { completed, total }) => {
            warn!("Conversion cancelled after {} of {} files", completed, total);
            Ok(())
        }
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(3725)), "1h 2m 5s");
        assert_eq!(format_duration(chrono::Duration::zero()), "0h 0m 0s");
    }

    #[test]
    fn test_fixed_overwrite_modes_do_not_prompt() {
        assert!(ConsolePresenter::new(OverwriteMode::Always).confirm_overwrite(Path::new("a.mp4")));
        assert!(!ConsolePresenter::new(OverwriteMode::Never).confirm_overwrite(Path::new("a.mp4")));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["vob2mp4", "--yes", "/dvd"]);
        assert!(args.yes);
        assert_eq!(args.directory, Some(PathBuf::from("/dvd")));
        assert!(Args::try_parse_from(["vob2mp4", "--yes", "--no"]).is_err());
    }
}
