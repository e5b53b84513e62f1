//! Anomaly tracking for the reconstruction pass.
//!
//! Data-quality problems in an exchange feed are expected, not exceptional:
//! outlier prices, crossed books, ticker gaps. The engine never fails on
//! them — it degrades to counters and skipped emissions — but an operator
//! auditing a run needs to see what was dropped and why. This module keeps
//! categorized, timestamped anomaly records alongside the raw counters.
//!
//! # Example
//!
//! ```
//! use l2_snapshot_engine::warnings::{AnomalyCategory, AnomalyTracker};
//!
//! let mut tracker = AnomalyTracker::new();
//! tracker.record_simple(AnomalyCategory::CrossedBook, "BTC-USD crossed at t=10");
//!
//! let summary = tracker.summary();
//! assert_eq!(summary.total, 1);
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use ahash::AHashMap;

use crate::error::Result;

/// Category of anomaly, for classification and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyCategory {
    /// Update price rejected by the outlier filter
    OutlierPrice,

    /// Emission skipped because best_bid >= best_ask
    CrossedBook,

    /// Emission skipped because one or both sides were empty
    EmptySide,

    /// Malformed event reached the engine and was skipped
    MalformedEvent,

    /// Timestamp irregularity in the input stream
    TimestampAnomaly,

    /// No ticker matched within the tolerance window
    MissingTicker,
}

impl AnomalyCategory {
    /// Stable uppercase name for exports and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            AnomalyCategory::OutlierPrice => "OUTLIER_PRICE",
            AnomalyCategory::CrossedBook => "CROSSED_BOOK",
            AnomalyCategory::EmptySide => "EMPTY_SIDE",
            AnomalyCategory::MalformedEvent => "MALFORMED_EVENT",
            AnomalyCategory::TimestampAnomaly => "TIMESTAMP_ANOMALY",
            AnomalyCategory::MissingTicker => "MISSING_TICKER",
        }
    }

    /// Severity level (1=low, 2=medium, 3=high).
    pub fn severity(&self) -> u8 {
        match self {
            AnomalyCategory::MissingTicker => 1,
            AnomalyCategory::OutlierPrice => 2,
            AnomalyCategory::EmptySide => 2,
            AnomalyCategory::CrossedBook => 3,
            AnomalyCategory::MalformedEvent => 3,
            AnomalyCategory::TimestampAnomaly => 3,
        }
    }
}

/// A single anomaly record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Auto-incremented id, unique within one tracker
    pub id: u64,

    /// Anomaly category
    pub category: AnomalyCategory,

    /// Human-readable message
    pub message: String,

    /// Data timestamp the anomaly refers to (nanoseconds since epoch)
    pub data_timestamp: Option<i64>,

    /// Instrument involved, if known
    pub instrument_id: Option<String>,

    /// Price involved, if applicable (decimal)
    pub price: Option<f64>,
}

/// Summary counts over a tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalySummary {
    /// Total anomalies recorded (including any beyond the storage cap)
    pub total: u64,

    /// Count per category name
    pub by_category: std::collections::BTreeMap<String, u64>,

    /// First data timestamp seen on a stored record
    pub first_timestamp: Option<i64>,

    /// Last data timestamp seen on a stored record
    pub last_timestamp: Option<i64>,
}

/// Categorized anomaly log with a storage cap.
///
/// Counts are exact; stored records stop at `max_records` so a pathological
/// feed cannot exhaust memory.
#[derive(Debug, Clone)]
pub struct AnomalyTracker {
    records: Vec<Anomaly>,
    category_counts: AHashMap<AnomalyCategory, u64>,
    max_records: usize,
    next_id: u64,
}

impl Default for AnomalyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyTracker {
    /// Default cap on stored records.
    pub const DEFAULT_MAX_RECORDS: usize = 100_000;

    /// Create a tracker with the default storage cap.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_MAX_RECORDS)
    }

    /// Create a tracker with a custom storage cap.
    pub fn with_capacity(max_records: usize) -> Self {
        Self {
            records: Vec::new(),
            category_counts: AHashMap::new(),
            max_records,
            next_id: 1,
        }
    }

    /// Record an anomaly with full context. Returns the record id.
    pub fn record(
        &mut self,
        category: AnomalyCategory,
        message: impl Into<String>,
        data_timestamp: Option<i64>,
        instrument_id: Option<&str>,
        price: Option<f64>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        *self.category_counts.entry(category).or_insert(0) += 1;

        if self.records.len() < self.max_records {
            self.records.push(Anomaly {
                id,
                category,
                message: message.into(),
                data_timestamp,
                instrument_id: instrument_id.map(str::to_string),
                price,
            });
        }

        id
    }

    /// Record an anomaly with just a category and message.
    pub fn record_simple(&mut self, category: AnomalyCategory, message: impl Into<String>) -> u64 {
        self.record(category, message, None, None, None)
    }

    /// Number of stored records (capped).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Total count including records beyond the storage cap.
    pub fn total_count(&self) -> u64 {
        self.category_counts.values().sum()
    }

    /// Count for one category.
    pub fn count_by_category(&self, category: AnomalyCategory) -> u64 {
        *self.category_counts.get(&category).unwrap_or(&0)
    }

    /// Stored records.
    pub fn records(&self) -> &[Anomaly] {
        &self.records
    }

    /// Summary counts.
    pub fn summary(&self) -> AnomalySummary {
        let mut by_category = std::collections::BTreeMap::new();
        for (cat, count) in &self.category_counts {
            by_category.insert(cat.name().to_string(), *count);
        }

        let first_timestamp = self.records.iter().find_map(|a| a.data_timestamp);
        let last_timestamp = self.records.iter().rev().find_map(|a| a.data_timestamp);

        AnomalySummary {
            total: self.total_count(),
            by_category,
            first_timestamp,
            last_timestamp,
        }
    }

    /// Export summary + records as JSON to a writer.
    pub fn export_json<W: Write>(&self, writer: W) -> Result<()> {
        #[derive(Serialize)]
        struct Export<'a> {
            summary: AnomalySummary,
            anomalies: &'a [Anomaly],
        }

        serde_json::to_writer_pretty(
            writer,
            &Export {
                summary: self.summary(),
                anomalies: &self.records,
            },
        )
        .map_err(|e| crate::error::EngineError::Sink(format!("anomaly export: {e}")))?;

        Ok(())
    }

    /// Drop all records and counts.
    pub fn clear(&mut self) {
        self.records.clear();
        self.category_counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_and_severity() {
        assert_eq!(AnomalyCategory::OutlierPrice.name(), "OUTLIER_PRICE");
        assert_eq!(AnomalyCategory::CrossedBook.severity(), 3);
        assert_eq!(AnomalyCategory::MissingTicker.severity(), 1);
    }

    #[test]
    fn test_basic_recording() {
        let mut tracker = AnomalyTracker::new();

        tracker.record_simple(AnomalyCategory::OutlierPrice, "price 500 vs anchor 100");
        tracker.record_simple(AnomalyCategory::OutlierPrice, "price 0.01 vs anchor 100");
        tracker.record(
            AnomalyCategory::CrossedBook,
            "BTC-USD crossed",
            Some(1_000_000_000),
            Some("BTC-USD"),
            None,
        );

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.total_count(), 3);
        assert_eq!(tracker.count_by_category(AnomalyCategory::OutlierPrice), 2);
        assert_eq!(tracker.count_by_category(AnomalyCategory::CrossedBook), 1);
        assert_eq!(tracker.count_by_category(AnomalyCategory::EmptySide), 0);
    }

    #[test]
    fn test_ids_increment() {
        let mut tracker = AnomalyTracker::new();
        let a = tracker.record_simple(AnomalyCategory::MissingTicker, "miss");
        let b = tracker.record_simple(AnomalyCategory::MissingTicker, "miss again");
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_storage_cap_keeps_counts_exact() {
        let mut tracker = AnomalyTracker::with_capacity(2);
        for i in 0..5 {
            tracker.record_simple(AnomalyCategory::OutlierPrice, format!("outlier #{i}"));
        }

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.total_count(), 5);
        assert_eq!(tracker.summary().total, 5);
    }

    #[test]
    fn test_summary_timestamps() {
        let mut tracker = AnomalyTracker::new();
        tracker.record(
            AnomalyCategory::CrossedBook,
            "first",
            Some(10),
            Some("X"),
            None,
        );
        tracker.record(
            AnomalyCategory::CrossedBook,
            "last",
            Some(99),
            Some("X"),
            None,
        );

        let summary = tracker.summary();
        assert_eq!(summary.first_timestamp, Some(10));
        assert_eq!(summary.last_timestamp, Some(99));
        assert_eq!(summary.by_category.get("CROSSED_BOOK"), Some(&2));
    }

    #[test]
    fn test_export_json() {
        let mut tracker = AnomalyTracker::new();
        tracker.record(
            AnomalyCategory::OutlierPrice,
            "rejected",
            Some(5),
            Some("ETH-USD"),
            Some(500.0),
        );

        let mut buf = Vec::new();
        tracker.export_json(&mut buf).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["summary"]["total"], 1);
        assert_eq!(parsed["anomalies"][0]["instrument_id"], "ETH-USD");
        assert_eq!(parsed["anomalies"][0]["price"], 500.0);
    }

    #[test]
    fn test_clear() {
        let mut tracker = AnomalyTracker::new();
        tracker.record_simple(AnomalyCategory::EmptySide, "empty");
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.total_count(), 0);
    }
}
