//! File ingestion: header resolution, then the batch pipeline into the store.

use crate::error::IngestError;
use crate::pipeline::{run_pipeline, BatchSink, PipelineStats};
use crate::progress::Progress;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tp_common::FileDimensions;
use tp_format::{
    BodyReader, FileHeader, KeyDictionary, RecordLayout, RecordStream, TaggedMap, TelemetryRecord,
};
use tp_store::{DimensionResolver, TelemetryStore};
use tp_telemetry::{project_batch, ColumnBindings};
use tracing::{debug, info};

/// Sink resolving measurement ids, projecting and bulk inserting a batch.
pub struct StoreSink<'a, S> {
    resolver: &'a mut DimensionResolver<S>,
    dict: &'a KeyDictionary,
    bindings: ColumnBindings,
    dims: FileDimensions,
}

impl<'a, S: TelemetryStore> StoreSink<'a, S> {
    pub fn new(
        resolver: &'a mut DimensionResolver<S>,
        dict: &'a KeyDictionary,
        dims: FileDimensions,
    ) -> Self {
        Self {
            resolver,
            dict,
            bindings: ColumnBindings::from_dictionary(dict),
            dims,
        }
    }
}

impl<S: TelemetryStore> BatchSink for StoreSink<'_, S> {
    fn load(&mut self, batch: &[TelemetryRecord]) -> Result<u64, IngestError> {
        let mut measurements = Vec::with_capacity(batch.len());
        for record in batch {
            let name = self.dict.resolve(record.measurement)?;
            measurements.push(self.resolver.resolve_measurement(name)?);
        }
        let points = project_batch(batch, &measurements, self.dims, &self.bindings)?;
        let rows = self.resolver.store_mut().insert_points(&points)?;
        debug!(rows, "batch loaded");
        Ok(rows)
    }
}

/// Outcome of one ingested file.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub testrun_id: String,
    pub testrun_role: String,
    pub dimensions: FileDimensions,
    #[serde(flatten)]
    pub stats: PipelineStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileSummary>,
    pub total_records: u64,
    pub total_inserted: u64,
    pub measurement_cache_hits: u64,
    pub measurement_cache_misses: u64,
}

impl RunSummary {
    pub fn write_json(&self, path: &Path) -> Result<(), IngestError> {
        let file = File::create(path).map_err(IngestError::io(path))?;
        serde_json::to_writer_pretty(file, self).map_err(|source| IngestError::Report {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Ingests telemetry files into a store, one file at a time.
pub struct Ingestor<S> {
    resolver: DimensionResolver<S>,
    batch_size: usize,
    layout: RecordLayout,
    progress: Progress,
}

impl<S: TelemetryStore + Send> Ingestor<S> {
    pub fn new(store: S, batch_size: usize, layout: RecordLayout, progress: Progress) -> Self {
        Self {
            resolver: DimensionResolver::new(store),
            batch_size,
            layout,
            progress,
        }
    }

    pub fn resolver(&self) -> &DimensionResolver<S> {
        &self.resolver
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn into_store(self) -> S {
        self.resolver.into_store()
    }

    /// Ingest every file in order, stopping at the first error.
    pub fn run(&mut self, files: &[PathBuf]) -> Result<RunSummary, IngestError> {
        let started_at = Utc::now();
        let mut summaries = Vec::with_capacity(files.len());
        for path in files {
            summaries.push(self.ingest_file(path)?);
        }
        let cache = self.resolver.cache_stats();
        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            total_records: summaries.iter().map(|f| f.stats.records).sum(),
            total_inserted: summaries.iter().map(|f| f.stats.inserted).sum(),
            files: summaries,
            measurement_cache_hits: cache.hits,
            measurement_cache_misses: cache.misses,
        };
        info!(
            files = summary.files.len(),
            records = summary.total_records,
            inserted = summary.total_inserted,
            "run complete"
        );
        Ok(summary)
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<FileSummary, IngestError> {
        let file = File::open(path).map_err(IngestError::io(path))?;
        self.ingest_reader(file, path)
    }

    /// Ingest one telemetry file read from `src`. `path` labels the file in
    /// progress output, logs and the summary.
    pub fn ingest_reader<R: Read + Seek>(
        &mut self,
        mut src: R,
        path: &Path,
    ) -> Result<FileSummary, IngestError> {
        let started = Instant::now();
        let started_at = Utc::now();
        self.progress.set_file(path.display().to_string());
        info!(file = %path.display(), "ingesting");

        let dict = KeyDictionary::read_from(&mut src)?;
        src.seek(SeekFrom::Start(0)).map_err(IngestError::io(path))?;
        let mut reader = BodyReader::new(BufReader::new(src), 0, dict.start_offset());
        let header_map = TaggedMap::decode(&mut reader)?;
        dict.ensure_bound(&header_map)?;
        let header = FileHeader::from_map(&header_map, &dict)?;
        let dims = self.resolver.resolve_header(&header)?;

        let records = RecordStream::new(reader, self.layout);
        let mut sink = StoreSink::new(&mut self.resolver, &dict, dims);
        let stats = run_pipeline(records, self.batch_size, &mut sink, &self.progress)?;
        self.progress.finish_file();

        let cache = self.resolver.cache_stats();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            file = %path.display(),
            records = stats.records,
            batches = stats.batches,
            inserted = stats.inserted,
            elapsed_ms,
            "file ingested"
        );
        debug!(
            hits = cache.hits,
            misses = cache.misses,
            entries = cache.entries,
            "measurement cache"
        );

        Ok(FileSummary {
            path: path.to_path_buf(),
            testrun_id: header.testrun_id,
            testrun_role: header.testrun_role,
            dimensions: dims,
            stats,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms,
        })
    }
}
