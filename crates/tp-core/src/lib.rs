//! Telemetry processor core.
//!
//! Discovers tagged binary telemetry files, decodes them, and loads their
//! records into a relational store through a two-stage producer/consumer
//! pipeline.

pub mod cli;
pub mod discover;
pub mod error;
pub mod exit_codes;
pub mod ingest;
pub mod inspect;
pub mod logging;
pub mod pipeline;
pub mod progress;

pub use discover::discover;
pub use error::IngestError;
pub use exit_codes::ExitCode;
pub use ingest::{FileSummary, Ingestor, RunSummary, StoreSink};
pub use inspect::{inspect_file, inspect_reader, InspectReport};
pub use pipeline::{run_pipeline, BatchSink, PipelineStats};
pub use progress::Progress;
