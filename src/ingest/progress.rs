use indicatif::{ProgressBar, ProgressStyle};

/// Counters after each processed segment. Display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestProgress {
    pub processed: usize,
    pub remaining: usize,
    pub inserted: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Receives ingest progress. Nothing here feeds back into the run.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _total: usize) {}
    fn on_segment(&self, _progress: &IngestProgress) {}
    fn on_finish(&self, _progress: &IngestProgress) {}
}

pub struct NoopProgress;

impl ProgressObserver for NoopProgress {}

/// Terminal progress bar.
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} journeys {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_start(&self, total: usize) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total as u64);
    }

    fn on_segment(&self, progress: &IngestProgress) {
        self.bar.set_position(progress.processed as u64);
        self.bar.set_message(format!(
            "(+{} new, {} completed, {} skipped, {} failed)",
            progress.inserted, progress.completed, progress.skipped, progress.failed
        ));
    }

    fn on_finish(&self, _progress: &IngestProgress) {
        self.bar.finish_and_clear();
    }
}
