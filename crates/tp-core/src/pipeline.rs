//! Producer/consumer batch pipeline.
//!
//! The calling thread decodes records and groups them into batches of
//! `batch_size`. A single scoped consumer thread receives each batch over a
//! zero-capacity channel and hands it to a [`BatchSink`]. A send blocks
//! until the consumer has taken the previous batch, which is the only
//! backpressure.
//!
//! Closing the channel ends the input; joining the consumer is the
//! completion signal. Both happen before `run_pipeline` returns, so the
//! sink and everything it borrows outlive the consumer.

use crate::error::IngestError;
use crate::progress::Progress;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use tp_format::{FormatError, TelemetryRecord};
use tp_store::StoreError;
use tracing::debug;

/// Upper bound on the capacity reserved up front for a batch.
pub const MAX_PREALLOCATED_BATCH: usize = 65_536;

/// Destination for batches of decoded records.
pub trait BatchSink {
    /// Load `batch`, returning the number of rows written.
    fn load(&mut self, batch: &[TelemetryRecord]) -> Result<u64, IngestError>;
}

impl<K: BatchSink + ?Sized> BatchSink for &mut K {
    fn load(&mut self, batch: &[TelemetryRecord]) -> Result<u64, IngestError> {
        (**self).load(batch)
    }
}

/// Totals of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub records: u64,
    pub batches: u64,
    pub inserted: u64,
}

enum ProduceError {
    Format(FormatError),
    /// The consumer dropped its end of the channel.
    Closed,
}

struct Produced {
    records: u64,
    batches: u64,
}

/// Decode `records` into batches and feed them to `sink` on a consumer
/// thread.
///
/// The first decode error stops decoding; batches already handed off are
/// still loaded before the error is returned. The first sink error stops
/// the consumer, after which the producer stops at its next hand-off and
/// the sink error is returned.
pub fn run_pipeline<I, K>(
    records: I,
    batch_size: usize,
    sink: &mut K,
    progress: &Progress,
) -> Result<PipelineStats, IngestError>
where
    I: IntoIterator<Item = Result<TelemetryRecord, FormatError>>,
    K: BatchSink + Send,
{
    let batch_size = batch_size.max(1);
    let capacity = batch_size.min(MAX_PREALLOCATED_BATCH);

    thread::scope(|scope| -> Result<PipelineStats, IngestError> {
        let (tx, rx) = mpsc::sync_channel::<Vec<TelemetryRecord>>(0);
        let consumer = thread::Builder::new()
            .name("batch-loader".to_string())
            .spawn_scoped(scope, move || consume(rx, sink, progress))
            .map_err(|e| IngestError::Internal(format!("cannot start batch consumer: {e}")))?;

        let produced = produce(records, batch_size, capacity, &tx, progress);
        drop(tx);
        let consumed = consumer
            .join()
            .unwrap_or_else(|_| Err(IngestError::Internal("batch consumer panicked".to_string())));

        match (produced, consumed) {
            (Ok(p), Ok(inserted)) => Ok(PipelineStats {
                records: p.records,
                batches: p.batches,
                inserted,
            }),
            (Err(ProduceError::Format(e)), _) => Err(e.into()),
            (_, Err(e)) => Err(e),
            (Err(ProduceError::Closed), Ok(_)) => Err(IngestError::Internal(
                "batch consumer stopped before the end of input".to_string(),
            )),
        }
    })
}

fn produce<I>(
    records: I,
    batch_size: usize,
    capacity: usize,
    tx: &SyncSender<Vec<TelemetryRecord>>,
    progress: &Progress,
) -> Result<Produced, ProduceError>
where
    I: IntoIterator<Item = Result<TelemetryRecord, FormatError>>,
{
    let mut produced = Produced {
        records: 0,
        batches: 0,
    };
    let mut batch = Vec::with_capacity(capacity);
    for record in records {
        batch.push(record.map_err(ProduceError::Format)?);
        produced.records += 1;
        progress.record_read();
        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(capacity));
            hand_off(tx, full, &mut produced)?;
        }
    }
    if !batch.is_empty() {
        hand_off(tx, batch, &mut produced)?;
    }
    Ok(produced)
}

fn hand_off(
    tx: &SyncSender<Vec<TelemetryRecord>>,
    batch: Vec<TelemetryRecord>,
    produced: &mut Produced,
) -> Result<(), ProduceError> {
    debug!(records = batch.len(), batch = produced.batches, "handing off batch");
    tx.send(batch).map_err(|_| ProduceError::Closed)?;
    produced.batches += 1;
    Ok(())
}

fn consume<K: BatchSink>(
    rx: Receiver<Vec<TelemetryRecord>>,
    sink: &mut K,
    progress: &Progress,
) -> Result<u64, IngestError> {
    let mut inserted = 0u64;
    for batch in rx {
        let expected = batch.len() as u64;
        let rows = sink.load(&batch)?;
        if rows != expected {
            return Err(StoreError::RowCountMismatch {
                expected,
                inserted: rows,
            }
            .into());
        }
        inserted += rows;
        progress.record_inserted(rows);
    }
    Ok(inserted)
}
