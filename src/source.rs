//! Event source abstraction for flexible ingestion.
//!
//! The engine consumes an ordered stream of already-decoded [`OrderEvent`]s;
//! where that stream comes from (a capture file, a replay buffer, a live
//! decoder) is the source's business. The trait keeps the reconstruction
//! pass independent of any particular storage or transport.
//!
//! # Implementing Custom Sources
//!
//! ```
//! use l2_snapshot_engine::source::{EventSource, SourceMetadata};
//! use l2_snapshot_engine::{OrderEvent, Result};
//!
//! struct MySource {
//!     events: Vec<OrderEvent>,
//!     metadata: SourceMetadata,
//! }
//!
//! impl EventSource for MySource {
//!     type EventIter = std::vec::IntoIter<OrderEvent>;
//!
//!     fn events(self) -> Result<Self::EventIter> {
//!         Ok(self.events.into_iter())
//!     }
//!
//!     fn metadata(&self) -> &SourceMetadata {
//!         &self.metadata
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::OrderEvent;

/// Metadata about an event source, for logging and output organization.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// Capture date in YYYY-MM-DD format, if known
    pub date: Option<String>,

    /// Original file path, if loaded from a file
    pub file_path: Option<PathBuf>,

    /// Provider name (e.g. "coinbase", "replay", "memory")
    pub provider: Option<String>,

    /// Estimated event count, for progress reporting
    pub estimated_events: Option<u64>,
}

impl SourceMetadata {
    /// Create new empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capture date.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Set the file path.
    pub fn with_file_path(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the estimated event count.
    pub fn with_estimated_events(mut self, count: u64) -> Self {
        self.estimated_events = Some(count);
        self
    }
}

/// Trait for ordered event sources.
///
/// `events()` consumes `self` for single-pass iteration; metadata is
/// available before the pass starts. The source is responsible for order:
/// per-instrument timestamps must be non-decreasing.
pub trait EventSource {
    /// The iterator type over events.
    type EventIter: Iterator<Item = OrderEvent>;

    /// Consume the source and return an iterator over events.
    fn events(self) -> Result<Self::EventIter>;

    /// Metadata about the source.
    fn metadata(&self) -> &SourceMetadata;
}

/// A simple in-memory source for tests and simulations.
///
/// # Example
///
/// ```
/// use l2_snapshot_engine::source::{EventSource, VecSource};
/// use l2_snapshot_engine::{EventKind, OrderEvent, Side};
///
/// let events = vec![
///     OrderEvent::from_decimal(0, "BTC-USD", EventKind::Update, Side::Bid, 100.0, 1.0),
///     OrderEvent::from_decimal(0, "BTC-USD", EventKind::Update, Side::Ask, 101.0, 1.0),
/// ];
///
/// let source = VecSource::new(events);
/// assert_eq!(source.metadata().estimated_events, Some(2));
/// assert_eq!(source.events().unwrap().count(), 2);
/// ```
pub struct VecSource {
    events: Vec<OrderEvent>,
    metadata: SourceMetadata,
}

impl VecSource {
    /// Create a new vector source.
    pub fn new(events: Vec<OrderEvent>) -> Self {
        Self {
            metadata: SourceMetadata::new()
                .with_provider("memory")
                .with_estimated_events(events.len() as u64),
            events,
        }
    }

    /// Set custom metadata.
    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl EventSource for VecSource {
    type EventIter = std::vec::IntoIter<OrderEvent>;

    fn events(self) -> Result<Self::EventIter> {
        Ok(self.events.into_iter())
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, Side};

    #[test]
    fn test_metadata_builder() {
        let meta = SourceMetadata::new()
            .with_date("2025-11-08")
            .with_provider("coinbase")
            .with_estimated_events(1000);

        assert_eq!(meta.date, Some("2025-11-08".to_string()));
        assert_eq!(meta.provider, Some("coinbase".to_string()));
        assert_eq!(meta.estimated_events, Some(1000));
    }

    #[test]
    fn test_vec_source_basic() {
        let events = vec![
            OrderEvent::from_decimal(0, "BTC-USD", EventKind::Update, Side::Bid, 100.0, 1.0),
            OrderEvent::from_decimal(1, "BTC-USD", EventKind::Update, Side::Ask, 101.0, 2.0),
        ];

        let source = VecSource::new(events);
        assert_eq!(source.metadata().provider, Some("memory".to_string()));

        let collected: Vec<_> = source.events().unwrap().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].timestamp, 0);
        assert_eq!(collected[1].side, Side::Ask);
    }

    #[test]
    fn test_vec_source_empty() {
        let source = VecSource::new(Vec::new());
        assert_eq!(source.metadata().estimated_events, Some(0));
        assert_eq!(source.events().unwrap().count(), 0);
    }

    #[test]
    fn test_vec_source_with_metadata() {
        let source = VecSource::new(Vec::new())
            .with_metadata(SourceMetadata::new().with_date("2025-01-01"));
        assert_eq!(source.metadata().date, Some("2025-01-01".to_string()));
    }
}
