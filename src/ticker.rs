//! Nearest-timestamp ticker lookup for snapshot annotation.
//!
//! Ticker events are indexed per instrument by exact timestamp; `lookup`
//! probes the exact key first and then steps outward second by second
//! (+1s, −1s, +2s, −2s, …) until the tolerance window is exhausted. The
//! stepped probe matches the upstream collector, which stamps ticker events
//! on whole seconds.
//!
//! The join is soft: a miss never blocks snapshot emission, it just leaves
//! the ticker fields unset on that record.

use std::time::Duration;

use ahash::AHashMap;

use crate::types::{TickerEvent, TickerFields};

const NS_PER_SECOND: i64 = 1_000_000_000;

/// Default tolerance window for the nearest-ticker search.
pub const DEFAULT_TICKER_TOLERANCE: Duration = Duration::from_secs(5);

/// Exact + nearest-timestamp index over ticker events.
#[derive(Debug, Clone, Default)]
pub struct TickerIndex {
    /// instrument → (timestamp ns → annotation fields)
    by_instrument: AHashMap<String, AHashMap<i64, TickerFields>>,

    /// How many whole-second steps the nearest search may take
    tolerance_steps: i64,

    /// Total events indexed
    count: usize,
}

impl TickerIndex {
    /// Create an empty index with the given tolerance window.
    pub fn new(tolerance: Duration) -> Self {
        Self {
            by_instrument: AHashMap::new(),
            tolerance_steps: tolerance.as_secs() as i64,
            count: 0,
        }
    }

    /// Build an index from a slice of ticker events.
    ///
    /// Later events win on duplicate `(timestamp, instrument)` keys.
    pub fn build(events: &[TickerEvent], tolerance: Duration) -> Self {
        let mut index = Self::new(tolerance);
        for event in events {
            index.insert(event);
        }
        index
    }

    /// Add one ticker event to the index.
    pub fn insert(&mut self, event: &TickerEvent) {
        self.by_instrument
            .entry(event.instrument_id.clone())
            .or_default()
            .insert(event.timestamp, event.annotation());
        self.count += 1;
    }

    /// Find the annotation for `(timestamp, instrument)`.
    ///
    /// Exact match takes precedence; otherwise the probe tries +1s, −1s,
    /// +2s, −2s, … out to the tolerance window, first hit wins.
    pub fn lookup(&self, timestamp: i64, instrument: &str) -> Option<TickerFields> {
        let by_ts = self.by_instrument.get(instrument)?;

        if let Some(fields) = by_ts.get(&timestamp) {
            return Some(*fields);
        }

        for step in 1..=self.tolerance_steps {
            let delta = step * NS_PER_SECOND;
            if let Some(fields) = by_ts.get(&(timestamp + delta)) {
                return Some(*fields);
            }
            if let Some(fields) = by_ts.get(&(timestamp - delta)) {
                return Some(*fields);
            }
        }

        None
    }

    /// Total number of indexed ticker events.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the index holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of distinct instruments indexed.
    #[inline]
    pub fn instrument_count(&self) -> usize {
        self.by_instrument.len()
    }
}
