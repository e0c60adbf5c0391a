use std::time::{Duration, Instant};
use crate::duration::parse_timestamp;

/// Progress of the file currently being transcoded
#[derive(Debug, Clone, PartialEq)]
pub struct FileProgress {
    /// Position reached in the source, in seconds
    pub elapsed_secs: f64,
    /// `floor(100 * elapsed / total)`, clamped to 100; `None` when the total duration is unknown
    pub percent: Option<u8>,
    /// Raw instantaneous estimate from the latest line; `None` when it cannot be computed
    pub estimated_remaining: Option<Duration>,
}

impl FileProgress {
    /// Remaining time as shown to the user, e.g. `Remaining time for current file: 3m 12s`
    pub fn remaining_text(&self) -> String {
        match self.estimated_remaining {
            Some(d) => {
                let secs = d.as_secs();
                format!("Remaining time for current file: {}m {}s", secs / 60, secs % 60)
            }
            None => "Remaining time for current file: N/A".to_string(),
        }
    }
}

/// Progress of the batch, emitted once per finished file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl BatchProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (completed.min(total) * 100 / total) as u8
        };
        BatchProgress { completed, total, percent }
    }
}

/// Extract the `time=HH:MM:SS` field from an ffmpeg status line
///
/// Returns `None` for lines without the field, when the value after
/// `time=` does not have exactly two colons, and for the negative
/// positions ffmpeg reports before the first frame.
pub fn parse_time_field(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once("time=")?;
    let value = rest.split(' ').next()?;
    if value.matches(':').count() != 2 {
        return None;
    }
    parse_timestamp(value)
}

/// Turn one ffmpeg status line into a progress update
///
/// `wall_elapsed` is the wall-clock time since the transcode started.
pub fn parse_progress_line(line: &str, total_secs: f64, wall_elapsed: Duration) -> Option<FileProgress> {
    let elapsed_secs = parse_time_field(line)?;

    if total_secs <= 0.0 {
        return Some(FileProgress {
            elapsed_secs,
            percent: None,
            estimated_remaining: None,
        });
    }

    let fraction = elapsed_secs / total_secs;
    let percent = (100.0 * fraction).floor().clamp(0.0, 100.0) as u8;

    let estimated_remaining = if fraction > 0.0 {
        let wall = wall_elapsed.as_secs_f64();
        let remaining = wall / fraction - wall;
        // Out of range for `Duration` means no usable estimate
        Duration::try_from_secs_f64(remaining.max(0.0)).ok()
    } else {
        None
    };

    Some(FileProgress {
        elapsed_secs,
        percent: Some(percent),
        estimated_remaining,
    })
}

/// Stateful wrapper binding the parser to one running transcode
#[derive(Debug, Clone)]
pub struct ProgressParser {
    total_secs: f64,
    started: Instant,
}

impl ProgressParser {
    pub fn new(total_secs: f64, started: Instant) -> Self {
        ProgressParser { total_secs, started }
    }

    pub fn feed(&self, line: &str) -> Option<FileProgress> {
        parse_progress_line(line, self.total_secs, self.started.elapsed())
    }
}
