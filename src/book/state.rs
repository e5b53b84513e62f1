//! Per-instrument order book state.
//!
//! `OrderBookState` owns both ladders for one instrument plus the outlier
//! filter that guards incremental updates. Two mutation paths exist:
//!
//! - `apply_snapshot_batch` — authoritative rebuild: clears both ladders,
//!   inserts the batch, and re-seeds the outlier anchor from the fresh mid
//!   (seed-then-filter: the next update is tested against the rebuilt book,
//!   not against pre-reconnect state).
//! - `apply_update` — incremental mutation, outlier-tested first. A flagged
//!   price leaves the ladders untouched.
//!
//! The outlier test runs in exactly one place (here, inside `apply_update`)
//! so filtered events are counted once.

use serde::{Deserialize, Serialize};

use crate::book::features::{BookFeatures, TopOfBook};
use crate::book::ladder::Ladder;
use crate::types::{price_to_f64, BookHealth, LadderEntry, Side};

/// Which reference price the outlier filter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutlierPolicy {
    /// Anchor is the mid observed at the most recent successful
    /// rebuild / feature extraction.
    Reference,

    /// Anchor is an exponential moving average of observed mids,
    /// `anchor ← α·mid + (1−α)·anchor`.
    #[default]
    Ema,
}

/// Per-book configuration.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Outlier filter variant
    pub outlier_policy: OutlierPolicy,

    /// Relative distance from the anchor beyond which an update price is
    /// rejected (0.10 = 10%)
    pub outlier_threshold: f64,

    /// EMA smoothing factor for [`OutlierPolicy::Ema`]
    pub ema_alpha: f64,

    /// Probe market-buy size for the impact feature
    pub impact_probe_qty: f64,

    /// Whether to log filtered updates
    pub log_warnings: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            outlier_policy: OutlierPolicy::default(),
            outlier_threshold: 0.10,
            ema_alpha: 0.05,
            impact_probe_qty: 1.0,
            log_warnings: true,
        }
    }
}

impl BookConfig {
    /// Set the outlier policy.
    pub fn with_outlier_policy(mut self, policy: OutlierPolicy) -> Self {
        self.outlier_policy = policy;
        self
    }

    /// Set the outlier rejection threshold.
    pub fn with_outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = threshold;
        self
    }

    /// Set the EMA smoothing factor.
    pub fn with_ema_alpha(mut self, alpha: f64) -> Self {
        self.ema_alpha = alpha;
        self
    }

    /// Set the impact probe quantity.
    pub fn with_impact_probe_qty(mut self, qty: f64) -> Self {
        self.impact_probe_qty = qty;
        self
    }

    /// Enable/disable warning logs.
    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }
}

/// Slow-moving reference price used to reject implausible update prices.
///
/// Until an anchor exists (no healthy mid has been observed yet) nothing is
/// filtered.
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    policy: OutlierPolicy,
    threshold: f64,
    alpha: f64,
    anchor: Option<f64>,
}

impl OutlierFilter {
    /// Create an unseeded filter from a book configuration.
    pub fn new(config: &BookConfig) -> Self {
        Self {
            policy: config.outlier_policy,
            threshold: config.outlier_threshold,
            alpha: config.ema_alpha,
            anchor: None,
        }
    }

    /// Test a decimal price against the anchor.
    #[inline]
    pub fn is_outlier(&self, price: f64) -> bool {
        match self.anchor {
            Some(anchor) if anchor > 0.0 => (price - anchor).abs() / anchor > self.threshold,
            _ => false,
        }
    }

    /// Feed an observed healthy mid into the anchor: EMA blends, Reference
    /// replaces.
    #[inline]
    pub fn observe(&mut self, mid: f64) {
        self.anchor = Some(match (self.policy, self.anchor) {
            (OutlierPolicy::Ema, Some(prev)) => self.alpha * mid + (1.0 - self.alpha) * prev,
            _ => mid,
        });
    }

    /// Hard-reset the anchor after an authoritative rebuild.
    #[inline]
    pub fn reseed(&mut self, mid: f64) {
        self.anchor = Some(mid);
    }

    /// Current anchor value, if any.
    #[inline]
    pub fn anchor(&self) -> Option<f64> {
        self.anchor
    }
}

/// Outcome of an incremental update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The ladder was mutated
    Applied,
    /// The price failed the outlier test; no state change
    Filtered,
}

impl ApplyOutcome {
    /// Returns true if the update mutated the book.
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Per-book counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BookStats {
    /// Snapshot-batch rebuilds applied
    pub rebuilds: u64,

    /// Incremental updates applied
    pub updates_applied: u64,

    /// Incremental updates dropped by the outlier filter
    pub updates_filtered: u64,
}

/// Order book state for a single instrument.
#[derive(Debug, Clone)]
pub struct OrderBookState {
    instrument_id: String,
    bids: Ladder,
    asks: Ladder,
    filter: OutlierFilter,
    config: BookConfig,
    stats: BookStats,
}

impl OrderBookState {
    /// Create an empty book for one instrument.
    pub fn new(instrument_id: impl Into<String>, config: BookConfig) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            bids: Ladder::new(Side::Bid),
            asks: Ladder::new(Side::Ask),
            filter: OutlierFilter::new(&config),
            config,
            stats: BookStats::default(),
        }
    }

    /// The instrument this book tracks.
    #[inline]
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Replace the entire book with a snapshot batch.
    ///
    /// Zero-quantity entries mean "level absent" and are skipped. Runs in
    /// O(batch size). If the rebuilt book has both sides quoted, the outlier
    /// anchor is re-seeded from the new mid.
    pub fn apply_snapshot_batch(&mut self, entries: &[LadderEntry]) {
        self.bids.clear();
        self.asks.clear();

        for entry in entries {
            if entry.quantity == 0.0 {
                continue;
            }
            match entry.side {
                Side::Bid => self.bids.set(entry.price, entry.quantity),
                Side::Ask => self.asks.set(entry.price, entry.quantity),
            }
        }

        self.stats.rebuilds += 1;

        if let Some(mid) = self.mid_price() {
            self.filter.reseed(mid);
        }
    }

    /// Apply one incremental update, outlier-testing the price first.
    ///
    /// A rejected price leaves both ladders bit-for-bit unchanged and bumps
    /// `updates_filtered` by exactly one.
    pub fn apply_update(&mut self, side: Side, price: i64, quantity: f64) -> ApplyOutcome {
        let price_dec = price_to_f64(price);
        if self.filter.is_outlier(price_dec) {
            self.stats.updates_filtered += 1;
            if self.config.log_warnings {
                log::debug!(
                    "{}: filtered outlier {} {:.8} (anchor {:.8})",
                    self.instrument_id,
                    side.as_wire(),
                    price_dec,
                    self.filter.anchor().unwrap_or_default()
                );
            }
            return ApplyOutcome::Filtered;
        }

        match side {
            Side::Bid => self.bids.set(price, quantity),
            Side::Ask => self.asks.set(price, quantity),
        }
        self.stats.updates_applied += 1;

        ApplyOutcome::Applied
    }

    /// Health of the current book from the emission gate's point of view.
    #[inline]
    pub fn health(&self) -> BookHealth {
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => {
                if bid < ask {
                    BookHealth::Valid
                } else {
                    BookHealth::Crossed
                }
            }
            _ => BookHealth::Empty,
        }
    }

    /// Mid price of the current book, if both sides are quoted. Defined for
    /// crossed books too (the rebuild reseed uses it).
    #[inline]
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => Some((price_to_f64(bid) + price_to_f64(ask)) / 2.0),
            _ => None,
        }
    }

    /// Top `depth` levels per side with aggregate volumes.
    ///
    /// Returns `None` for an unhealthy book — either side empty, or
    /// `best_bid >= best_ask`.
    pub fn top_of_book(&self, depth: usize) -> Option<TopOfBook> {
        if !self.health().is_valid() {
            return None;
        }

        let bids = self.bids.top(depth);
        let asks = self.asks.top(depth);
        let bid_volume = bids.iter().map(|&(_, q)| q).sum();
        let ask_volume = asks.iter().map(|&(_, q)| q).sum();

        Some(TopOfBook {
            bids,
            asks,
            bid_volume,
            ask_volume,
        })
    }

    /// Extract the snapshot feature record at `depth` levels.
    ///
    /// Unavailable under the same conditions as [`Self::top_of_book`]. On
    /// success the observed mid is fed back into the outlier anchor.
    pub fn extract_features(&mut self, depth: usize) -> Option<BookFeatures> {
        let top = self.top_of_book(depth)?;
        let features = BookFeatures::from_top_of_book(&top, self.config.impact_probe_qty);
        self.filter.observe(features.mid_price);
        Some(features)
    }

    /// Bid ladder (read-only).
    #[inline]
    pub fn bids(&self) -> &Ladder {
        &self.bids
    }

    /// Ask ladder (read-only).
    #[inline]
    pub fn asks(&self) -> &Ladder {
        &self.asks
    }

    /// Per-book counters.
    #[inline]
    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Current outlier anchor, if seeded.
    #[inline]
    pub fn outlier_anchor(&self) -> Option<f64> {
        self.filter.anchor()
    }
}
