//! Snapshot sink abstraction.
//!
//! The engine hands each emitted [`Snapshot`] to a sink synchronously and
//! never looks at it again; the sink decides representation and persistence.
//! Two implementations ship with the crate: an in-memory [`VecSink`] for
//! tests and a line-delimited JSON [`JsonlSink`] for simple capture-to-disk
//! runs.

use std::io::Write;

use crate::error::{EngineError, Result};
use crate::types::Snapshot;

/// Trait for snapshot consumers.
pub trait SnapshotSink {
    /// Append one emitted snapshot.
    fn append(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Flush any buffered output. Called once at end of run.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink collecting owned snapshots.
#[derive(Debug, Default)]
pub struct VecSink {
    snapshots: Vec<Snapshot>,
}

impl VecSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected snapshots.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Number of collected snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consume the sink and return the snapshots.
    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

impl SnapshotSink for VecSink {
    fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

/// Sink writing one JSON object per line to any writer.
///
/// One convenient representation, not a prescribed one — downstream storage
/// (CSV, columnar, …) belongs behind its own sink implementation.
pub struct JsonlSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonlSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SnapshotSink for JsonlSink<W> {
    fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)
            .map_err(|e| EngineError::Sink(format!("serialize snapshot: {e}")))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
