//! Segment → journey-store ingestion.

mod controller;
mod progress;

pub use controller::{IngestConfig, IngestSummary, Ingestor, UpsertOutcome};
pub use progress::{IngestProgress, NoopProgress, ProgressBarObserver, ProgressObserver};
