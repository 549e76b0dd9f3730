use std::path::PathBuf;
use std::time::Duration;

/// How a single exposure ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Processed,
    /// Predates the offset or lies beyond the rotation limit
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct FrameTiming {
    pub path: PathBuf,
    pub elapsed: Duration,
    pub outcome: FrameOutcome,
}

/// Per-file timing collected during a run. Purely informational.
#[derive(Debug, Clone, Default)]
pub struct TimingLog {
    frames: Vec<FrameTiming>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: PathBuf, elapsed: Duration, outcome: FrameOutcome) {
        self.frames.push(FrameTiming {
            path,
            elapsed,
            outcome,
        });
    }

    pub fn frames(&self) -> &[FrameTiming] {
        &self.frames
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut total = Duration::ZERO;
        for frame in self.frames.iter() {
            match frame.outcome {
                FrameOutcome::Processed => {
                    summary.processed += 1;
                    total += frame.elapsed;
                }
                FrameOutcome::Skipped => summary.skipped += 1,
                FrameOutcome::Failed => summary.failed += 1,
            }
        }
        if summary.processed > 0 {
            summary.mean_time = total / summary.processed as u32;
        }
        summary.total_time = total;
        summary
    }
}

/// Counts and mean processing time, the latter over successfully processed frames only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub mean_time: Duration,
    pub total_time: Duration,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames processed ({} skipped, {} failed), average time {:.3} ms per frame",
            self.processed,
            self.skipped,
            self.failed,
            self.mean_time.as_secs_f64() * 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_averages_only_processed_frames() {
        let mut log = TimingLog::new();
        log.record(
            PathBuf::from("a_0.h5"),
            Duration::from_millis(10),
            FrameOutcome::Processed,
        );
        log.record(
            PathBuf::from("a_1.h5"),
            Duration::from_millis(30),
            FrameOutcome::Processed,
        );
        log.record(
            PathBuf::from("a_2.h5"),
            Duration::from_millis(500),
            FrameOutcome::Failed,
        );
        log.record(
            PathBuf::from("a_3.h5"),
            Duration::from_millis(1),
            FrameOutcome::Skipped,
        );

        let summary = log.summary();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.mean_time, Duration::from_millis(20));
        assert_eq!(log.frames().len(), 4);
    }

    #[test]
    fn test_empty_summary() {
        let summary = TimingLog::new().summary();
        assert_eq!(summary, RunSummary::default());
    }
}
