//! Single-pass reconstruction engine.
//!
//! Drives one ordered pass over the decoded event stream, routing events to
//! per-instrument [`OrderBookState`]s, batching snapshot-kind entries,
//! deciding when to emit feature snapshots, and soft-joining ticker
//! annotations.
//!
//! # Batch state machine
//!
//! Snapshot-kind events arrive as contiguous batches sharing one
//! `(timestamp, instrument_id)` key, and collectively replace that
//! instrument's book. The engine buffers them explicitly:
//!
//! - **Accumulating**: entries with the matching key are buffered. The first
//!   event with a different key, the first update-kind event, or end of
//!   stream closes the batch: the buffered entries rebuild the book and an
//!   emission is attempted immediately, regardless of the snapshot interval
//!   (a rebuild is authoritative fresh state — after a reconnect it must not
//!   be suppressed by the interval gate).
//! - **Streaming**: update-kind events mutate the book one at a time; after
//!   each applied (non-filtered) update the interval gate decides whether to
//!   attempt emission.
//!
//! A skipped emission (crossed or one-sided book) does not advance the
//! per-instrument emission clock, so the next applied update retries.
//!
//! # Failure semantics
//!
//! Anomalies degrade to counters and skipped work; the only hard error on
//! the event path is a per-instrument timestamp regression, which is a
//! decoder contract violation.

use std::mem;
use std::time::Duration;

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::book::{BookConfig, OrderBookState, OutlierPolicy};
use crate::error::{EngineError, Result};
use crate::sink::SnapshotSink;
use crate::ticker::{TickerIndex, DEFAULT_TICKER_TOLERANCE};
use crate::types::{BookHealth, EventKind, LadderEntry, OrderEvent, Snapshot, TickerEvent};
use crate::warnings::{AnomalyCategory, AnomalyTracker};

/// Run configuration for the reconstruction pass.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum spacing between interval-triggered snapshots per instrument
    pub snapshot_interval: Duration,

    /// Ladder depth per side for top-of-book features
    pub depth_levels: usize,

    /// Outlier filter variant
    pub outlier_policy: OutlierPolicy,

    /// Relative outlier rejection threshold (0.10 = 10%)
    pub outlier_threshold: f64,

    /// EMA smoothing factor for [`OutlierPolicy::Ema`]
    pub ema_alpha: f64,

    /// Tolerance window for the nearest-ticker join
    pub ticker_tolerance: Duration,

    /// Probe market-buy size for the impact feature
    pub impact_probe_qty: f64,

    /// Whether to log data-quality warnings
    pub log_warnings: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(10),
            depth_levels: 10,
            outlier_policy: OutlierPolicy::default(),
            outlier_threshold: 0.10,
            ema_alpha: 0.05,
            ticker_tolerance: DEFAULT_TICKER_TOLERANCE,
            impact_probe_qty: 1.0,
            log_warnings: true,
        }
    }
}

impl EngineConfig {
    /// Create a config with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot interval.
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the feature depth.
    pub fn with_depth_levels(mut self, depth: usize) -> Self {
        self.depth_levels = depth;
        self
    }

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

    /// Set the ticker join tolerance.
    pub fn with_ticker_tolerance(mut self, tolerance: Duration) -> Self {
        self.ticker_tolerance = tolerance;
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

    /// Per-book configuration derived from this run configuration.
    pub fn book_config(&self) -> BookConfig {
        BookConfig {
            outlier_policy: self.outlier_policy,
            outlier_threshold: self.outlier_threshold,
            ema_alpha: self.ema_alpha,
            impact_probe_qty: self.impact_probe_qty,
            log_warnings: self.log_warnings,
        }
    }
}

/// Running counters for one reconstruction pass.
///
/// These are the audit surface of a run: enough to account for every input
/// event and every skipped emission.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Snapshot-kind ladder entries consumed
    pub snapshot_entries: u64,

    /// Update-kind events consumed
    pub updates: u64,

    /// Snapshot batches applied (book rebuilds)
    pub batches_applied: u64,

    /// Updates dropped by the outlier filter
    pub outliers_filtered: u64,

    /// Emission attempts skipped on a crossed book
    pub skipped_crossed: u64,

    /// Emission attempts skipped on a one-sided or empty book
    pub skipped_empty: u64,

    /// Snapshots emitted to the sink
    pub snapshots_emitted: u64,

    /// Malformed events skipped (decoder defects)
    pub malformed_skipped: u64,

    /// Emitted snapshots with no ticker match within tolerance
    pub ticker_misses: u64,
}

impl EngineStats {
    /// Total order events consumed.
    #[inline]
    pub fn events_processed(&self) -> u64 {
        self.snapshot_entries + self.updates
    }

    /// Emission attempts skipped for any book-health reason.
    #[inline]
    pub fn skipped_unhealthy(&self) -> u64 {
        self.skipped_crossed + self.skipped_empty
    }
}

/// Per-instrument batch accumulation state.
#[derive(Debug, Clone)]
enum BatchState {
    /// Applying updates one at a time
    Streaming,

    /// Buffering one snapshot batch, keyed by `(timestamp, instrument)`
    Accumulating {
        instrument: String,
        timestamp: i64,
        entries: Vec<LadderEntry>,
    },
}

/// Single-pass, in-order driver: events in, snapshots out.
///
/// # Example
///
/// ```
/// use l2_snapshot_engine::{
///     EngineConfig, EventKind, OrderEvent, ReconstructionEngine, Side, VecSink,
/// };
///
/// let events = vec![
///     OrderEvent::from_decimal(0, "BTC-USD", EventKind::Snapshot, Side::Bid, 100.0, 1.0),
///     OrderEvent::from_decimal(0, "BTC-USD", EventKind::Snapshot, Side::Ask, 101.0, 2.0),
/// ];
///
/// let mut engine = ReconstructionEngine::new(EngineConfig::default());
/// let mut sink = VecSink::new();
/// engine.run(events, &mut sink).unwrap();
///
/// assert_eq!(sink.len(), 1);
/// assert_eq!(engine.stats().batches_applied, 1);
/// ```
pub struct ReconstructionEngine {
    config: EngineConfig,

    /// Per-instrument books, in first-seen order for deterministic reporting
    books: IndexMap<String, OrderBookState>,

    /// Per-instrument timestamp of the last emitted snapshot
    last_emit: AHashMap<String, i64>,

    /// Per-instrument timestamp of the last consumed event (ordering guard)
    last_seen: AHashMap<String, i64>,

    ticker: TickerIndex,
    batch: BatchState,
    stats: EngineStats,
    anomalies: AnomalyTracker,
}

impl ReconstructionEngine {
    /// Create an engine with no ticker data.
    pub fn new(config: EngineConfig) -> Self {
        let ticker = TickerIndex::new(config.ticker_tolerance);
        Self {
            config,
            books: IndexMap::new(),
            last_emit: AHashMap::new(),
            last_seen: AHashMap::new(),
            ticker,
            batch: BatchState::Streaming,
            stats: EngineStats::default(),
            anomalies: AnomalyTracker::new(),
        }
    }

    /// Index the given ticker events for snapshot annotation, using the
    /// configured tolerance window.
    pub fn with_ticker_events(mut self, events: &[TickerEvent]) -> Self {
        self.ticker = TickerIndex::build(events, self.config.ticker_tolerance);
        self
    }

    /// Use a prebuilt ticker index.
    pub fn with_ticker_index(mut self, index: TickerIndex) -> Self {
        self.ticker = index;
        self
    }

    /// Run configuration.
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one decoded order event.
    ///
    /// Malformed events are logged, counted, and skipped. The only error is
    /// a per-instrument timestamp regression (decoder contract violation).
    pub fn process_event(
        &mut self,
        event: &OrderEvent,
        sink: &mut impl SnapshotSink,
    ) -> Result<()> {
        if let Some(&prev) = self.last_seen.get(&event.instrument_id) {
            if event.timestamp < prev {
                self.anomalies.record(
                    AnomalyCategory::TimestampAnomaly,
                    format!(
                        "{}: event at {} after {}",
                        event.instrument_id, event.timestamp, prev
                    ),
                    Some(event.timestamp),
                    Some(&event.instrument_id),
                    None,
                );
                return Err(EngineError::OutOfOrderEvent {
                    instrument: event.instrument_id.clone(),
                    prev,
                    got: event.timestamp,
                });
            }
        }

        if let Err(err) = event.validate() {
            if self.config.log_warnings {
                log::warn!(
                    "skipping malformed event for {} at {}: {err}",
                    event.instrument_id,
                    event.timestamp
                );
            }
            self.anomalies.record(
                AnomalyCategory::MalformedEvent,
                err.to_string(),
                Some(event.timestamp),
                Some(&event.instrument_id),
                Some(event.price_as_f64()),
            );
            self.stats.malformed_skipped += 1;
            return Ok(());
        }

        self.last_seen
            .insert(event.instrument_id.clone(), event.timestamp);

        match event.kind {
            EventKind::Snapshot => self.accumulate(event, sink),
            EventKind::Update => self.stream_update(event, sink),
        }
    }

    /// Flush any still-open batch and the sink. Call once after the last
    /// event.
    pub fn finish(&mut self, sink: &mut impl SnapshotSink) -> Result<()> {
        self.close_batch(sink)?;
        sink.flush()
    }

    /// Drive a whole event stream through the engine and finish.
    pub fn run<I, S>(&mut self, events: I, sink: &mut S) -> Result<()>
    where
        I: IntoIterator<Item = OrderEvent>,
        S: SnapshotSink,
    {
        for event in events {
            self.process_event(&event, sink)?;
        }
        self.finish(sink)
    }

    /// Buffer one snapshot-kind entry, closing any batch with a different
    /// key first.
    fn accumulate(&mut self, event: &OrderEvent, sink: &mut impl SnapshotSink) -> Result<()> {
        let key_matches = matches!(
            &self.batch,
            BatchState::Accumulating { instrument, timestamp, .. }
                if *instrument == event.instrument_id && *timestamp == event.timestamp
        );

        if !key_matches {
            self.close_batch(sink)?;
            self.batch = BatchState::Accumulating {
                instrument: event.instrument_id.clone(),
                timestamp: event.timestamp,
                entries: Vec::new(),
            };
        }

        if let BatchState::Accumulating { entries, .. } = &mut self.batch {
            entries.push(LadderEntry::from(event));
        }
        self.stats.snapshot_entries += 1;

        Ok(())
    }

    /// Apply a buffered batch, if any, and attempt emission for it.
    ///
    /// The attempt deliberately ignores the interval gate: a rebuild is
    /// authoritative fresh state.
    fn close_batch(&mut self, sink: &mut impl SnapshotSink) -> Result<()> {
        let state = mem::replace(&mut self.batch, BatchState::Streaming);
        let BatchState::Accumulating {
            instrument,
            timestamp,
            entries,
        } = state
        else {
            return Ok(());
        };

        self.book_mut(&instrument).apply_snapshot_batch(&entries);
        self.stats.batches_applied += 1;

        self.try_emit(&instrument, timestamp, sink)
    }

    /// Apply one incremental update, then consult the interval gate.
    fn stream_update(&mut self, event: &OrderEvent, sink: &mut impl SnapshotSink) -> Result<()> {
        self.close_batch(sink)?;
        self.stats.updates += 1;

        let outcome =
            self.book_mut(&event.instrument_id)
                .apply_update(event.side, event.price, event.quantity);

        if !outcome.is_applied() {
            self.stats.outliers_filtered += 1;
            self.anomalies.record(
                AnomalyCategory::OutlierPrice,
                format!(
                    "{}: rejected {} update at {:.8}",
                    event.instrument_id,
                    event.side.as_wire(),
                    event.price_as_f64()
                ),
                Some(event.timestamp),
                Some(&event.instrument_id),
                Some(event.price_as_f64()),
            );
            return Ok(());
        }

        if self.emission_due(&event.instrument_id, event.timestamp) {
            self.try_emit(&event.instrument_id, event.timestamp, sink)?;
        }

        Ok(())
    }

    /// Interval gate: due when nothing was emitted yet for the instrument,
    /// or the configured interval has elapsed since the last emission.
    fn emission_due(&self, instrument: &str, timestamp: i64) -> bool {
        match self.last_emit.get(instrument) {
            None => true,
            Some(&last) => timestamp - last >= self.config.snapshot_interval.as_nanos() as i64,
        }
    }

    /// Attempt one emission: extract features, annotate, append to the sink.
    ///
    /// An unhealthy book skips the emission and leaves the emission clock
    /// untouched.
    fn try_emit(
        &mut self,
        instrument: &str,
        timestamp: i64,
        sink: &mut impl SnapshotSink,
    ) -> Result<()> {
        let depth = self.config.depth_levels;
        let book = match self.books.get_mut(instrument) {
            Some(book) => book,
            None => return Ok(()),
        };

        let features = match book.extract_features(depth) {
            Some(features) => features,
            None => {
                if book.health() == BookHealth::Crossed {
                    self.stats.skipped_crossed += 1;
                    if self.config.log_warnings {
                        log::warn!("{instrument}: skipping snapshot at {timestamp}, book crossed");
                    }
                    self.anomalies.record(
                        AnomalyCategory::CrossedBook,
                        format!("{instrument}: crossed book at emission"),
                        Some(timestamp),
                        Some(instrument),
                        None,
                    );
                } else {
                    self.stats.skipped_empty += 1;
                    self.anomalies.record(
                        AnomalyCategory::EmptySide,
                        format!("{instrument}: one-sided book at emission"),
                        Some(timestamp),
                        Some(instrument),
                        None,
                    );
                }
                return Ok(());
            }
        };

        let ticker = self.ticker.lookup(timestamp, instrument);
        if ticker.is_none() {
            self.stats.ticker_misses += 1;
            self.anomalies.record(
                AnomalyCategory::MissingTicker,
                format!("{instrument}: no ticker within tolerance"),
                Some(timestamp),
                Some(instrument),
                None,
            );
        }

        let snapshot = Snapshot {
            timestamp,
            instrument_id: instrument.to_string(),
            features,
            ticker,
        };
        sink.append(&snapshot)?;

        self.stats.snapshots_emitted += 1;
        self.last_emit.insert(instrument.to_string(), timestamp);

        Ok(())
    }

    /// Get or lazily create the book for an instrument.
    fn book_mut(&mut self, instrument: &str) -> &mut OrderBookState {
        let config = &self.config;
        self.books
            .entry(instrument.to_string())
            .or_insert_with(|| OrderBookState::new(instrument, config.book_config()))
    }

    /// Running counters.
    #[inline]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Anomaly log.
    #[inline]
    pub fn anomalies(&self) -> &AnomalyTracker {
        &self.anomalies
    }

    /// Book for one instrument, if it has seen events.
    pub fn book(&self, instrument: &str) -> Option<&OrderBookState> {
        self.books.get(instrument)
    }

    /// All books, in first-seen order.
    pub fn books(&self) -> impl Iterator<Item = (&str, &OrderBookState)> {
        self.books.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of instruments seen.
    pub fn instrument_count(&self) -> usize {
        self.books.len()
    }

    /// Ticker index in use.
    pub fn ticker_index(&self) -> &TickerIndex {
        &self.ticker
    }

    /// Log the end-of-run audit line.
    pub fn log_summary(&self) {
        log::info!(
            "run complete: {} events ({} snapshot entries, {} updates) over {} instruments | \
             {} batches applied, {} snapshots emitted | \
             filtered {} outliers, skipped {} crossed / {} empty, {} malformed, {} ticker misses",
            self.stats.events_processed(),
            self.stats.snapshot_entries,
            self.stats.updates,
            self.books.len(),
            self.stats.batches_applied,
            self.stats.snapshots_emitted,
            self.stats.outliers_filtered,
            self.stats.skipped_crossed,
            self.stats.skipped_empty,
            self.stats.malformed_skipped,
            self.stats.ticker_misses,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::VecSink;
    use crate::types::{price_from_f64, Side};

    const NS: i64 = 1_000_000_000;

    fn quiet_config() -> EngineConfig {
        EngineConfig::default().with_logging(false)
    }

    fn snap(ts_secs: i64, instrument: &str, side: Side, price: f64, qty: f64) -> OrderEvent {
        OrderEvent::from_decimal(ts_secs * NS, instrument, EventKind::Snapshot, side, price, qty)
    }

    fn upd(ts_secs: i64, instrument: &str, side: Side, price: f64, qty: f64) -> OrderEvent {
        OrderEvent::from_decimal(ts_secs * NS, instrument, EventKind::Update, side, price, qty)
    }

    fn base_batch(ts_secs: i64, instrument: &str) -> Vec<OrderEvent> {
        vec![
            snap(ts_secs, instrument, Side::Bid, 100.0, 1.0),
            snap(ts_secs, instrument, Side::Bid, 99.0, 2.0),
            snap(ts_secs, instrument, Side::Ask, 101.0, 1.5),
            snap(ts_secs, instrument, Side::Ask, 102.0, 0.5),
        ]
    }

    #[test]
    fn test_batch_applied_and_emitted_at_end_of_stream() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        engine.run(base_batch(0, "BTC-USD"), &mut sink).unwrap();

        assert_eq!(engine.stats().snapshot_entries, 4);
        assert_eq!(engine.stats().batches_applied, 1);
        assert_eq!(engine.stats().snapshots_emitted, 1);
        assert_eq!(sink.len(), 1);

        let record = &sink.snapshots()[0];
        assert_eq!(record.instrument_id, "BTC-USD");
        assert_eq!(record.features.best_bid, 100.0);
        assert_eq!(record.features.best_ask, 101.0);
        assert_eq!(record.features.bid_volume, 3.0);
        assert_eq!(record.features.ask_volume, 2.0);
    }

    #[test]
    fn test_update_closes_open_batch() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let mut events = base_batch(0, "BTC-USD");
        events.push(upd(1, "BTC-USD", Side::Bid, 100.5, 1.0));

        engine.run(events, &mut sink).unwrap();

        // The batch emits when the update closes it; the update itself is
        // then inside the interval, so no second emission.
        assert_eq!(engine.stats().batches_applied, 1);
        assert_eq!(engine.stats().snapshots_emitted, 1);
        assert_eq!(sink.snapshots()[0].timestamp, 0);

        let book = engine.book("BTC-USD").unwrap();
        assert_eq!(book.bids().quantity_at(price_from_f64(100.5)), Some(1.0));
    }

    #[test]
    fn test_new_timestamp_starts_new_batch() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let mut events = base_batch(0, "BTC-USD");
        // Reconnect: a fresh batch two seconds later, inside the interval
        events.extend(vec![
            snap(2, "BTC-USD", Side::Bid, 200.0, 1.0),
            snap(2, "BTC-USD", Side::Ask, 201.0, 1.0),
        ]);

        engine.run(events, &mut sink).unwrap();

        assert_eq!(engine.stats().batches_applied, 2);
        // Reconnect override: both rebuilds emit despite the 10s interval
        assert_eq!(engine.stats().snapshots_emitted, 2);
        assert_eq!(sink.snapshots()[1].features.best_bid, 200.0);

        // The rebuild replaced the old ladder entirely
        let book = engine.book("BTC-USD").unwrap();
        assert_eq!(book.bids().len(), 1);
    }

    #[test]
    fn test_interleaved_instruments_keep_separate_books() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let mut events = base_batch(0, "BTC-USD");
        events.extend(vec![
            snap(0, "ETH-USD", Side::Bid, 10.0, 5.0),
            snap(0, "ETH-USD", Side::Ask, 10.1, 5.0),
        ]);
        events.push(upd(1, "BTC-USD", Side::Bid, 99.5, 1.0));

        engine.run(events, &mut sink).unwrap();

        assert_eq!(engine.instrument_count(), 2);
        assert_eq!(engine.stats().batches_applied, 2);

        let btc = engine.book("BTC-USD").unwrap();
        let eth = engine.book("ETH-USD").unwrap();
        assert_eq!(btc.bids().best_price(), Some(price_from_f64(100.0)));
        assert_eq!(eth.bids().best_price(), Some(price_from_f64(10.0)));
    }

    #[test]
    fn test_emission_interval_monotonicity() {
        // Updates at t=0..=20 with a 10s interval and a healthy book
        // throughout: exactly 3 snapshots, at t ∈ {0, 10, 20}
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        for t in 0..=20 {
            let qty = 1.0 + t as f64 * 0.1;
            engine
                .process_event(&upd(t, "BTC-USD", Side::Bid, 100.0, qty), &mut sink)
                .unwrap();
            engine
                .process_event(&upd(t, "BTC-USD", Side::Ask, 101.0, qty), &mut sink)
                .unwrap();
        }
        engine.finish(&mut sink).unwrap();

        // The very first update finds a one-sided book (skip); the ask
        // update at t=0 completes the book and emits.
        let times: Vec<i64> = sink.snapshots().iter().map(|s| s.timestamp / NS).collect();
        assert_eq!(times, vec![0, 10, 20]);
        assert_eq!(engine.stats().snapshots_emitted, 3);
        assert_eq!(engine.stats().skipped_empty, 1);
    }

    #[test]
    fn test_skipped_emission_does_not_advance_clock() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        // One-sided book at t=0: due, but skipped
        engine
            .process_event(&upd(0, "BTC-USD", Side::Bid, 100.0, 1.0), &mut sink)
            .unwrap();
        assert_eq!(engine.stats().skipped_empty, 1);

        // Completing the book at t=1 is still due (clock never advanced)
        engine
            .process_event(&upd(1, "BTC-USD", Side::Ask, 101.0, 1.0), &mut sink)
            .unwrap();
        assert_eq!(engine.stats().snapshots_emitted, 1);
        assert_eq!(sink.snapshots()[0].timestamp, NS);
    }

    #[test]
    fn test_crossed_book_skips_emission() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let events = vec![
            // Crossed from the start: bid above ask
            snap(0, "BTC-USD", Side::Bid, 102.0, 1.0),
            snap(0, "BTC-USD", Side::Ask, 101.0, 1.0),
        ];
        engine.run(events, &mut sink).unwrap();

        assert_eq!(engine.stats().batches_applied, 1);
        assert_eq!(engine.stats().snapshots_emitted, 0);
        assert_eq!(engine.stats().skipped_crossed, 1);
        assert!(sink.is_empty());
        assert_eq!(
            engine
                .anomalies()
                .count_by_category(AnomalyCategory::CrossedBook),
            1
        );
    }

    #[test]
    fn test_outlier_filtered_update_skips_emission_check() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let mut events = base_batch(0, "BTC-USD");
        // Anchor ≈ 100.5; this is far outside the 10% band, and arrives
        // after the interval has elapsed
        events.push(upd(15, "BTC-USD", Side::Ask, 500.0, 1.0));
        engine.run(events, &mut sink).unwrap();

        assert_eq!(engine.stats().outliers_filtered, 1);
        // Only the batch-close emission happened
        assert_eq!(engine.stats().snapshots_emitted, 1);
        let book = engine.book("BTC-USD").unwrap();
        assert_eq!(book.asks().quantity_at(price_from_f64(500.0)), None);
    }

    #[test]
    fn test_malformed_event_is_skipped_not_fatal() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let mut events = base_batch(0, "BTC-USD");
        events.push(upd(11, "BTC-USD", Side::Bid, 100.0, -3.0));
        events.push(upd(12, "BTC-USD", Side::Bid, 100.0, 2.0));

        engine.run(events, &mut sink).unwrap();

        assert_eq!(engine.stats().malformed_skipped, 1);
        // The bad quantity never reached the ladder
        let book = engine.book("BTC-USD").unwrap();
        assert_eq!(book.bids().quantity_at(price_from_f64(100.0)), Some(2.0));
    }

    #[test]
    fn test_out_of_order_event_is_typed_error() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        engine
            .process_event(&upd(10, "BTC-USD", Side::Bid, 100.0, 1.0), &mut sink)
            .unwrap();

        let err = engine
            .process_event(&upd(5, "BTC-USD", Side::Bid, 100.0, 1.0), &mut sink)
            .unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrderEvent { .. }));

        // Equal timestamps are fine; other instruments are unaffected
        engine
            .process_event(&upd(10, "BTC-USD", Side::Ask, 101.0, 1.0), &mut sink)
            .unwrap();
        engine
            .process_event(&upd(1, "ETH-USD", Side::Bid, 10.0, 1.0), &mut sink)
            .unwrap();
    }

    #[test]
    fn test_ticker_join_within_tolerance() {
        let ticker_events = vec![TickerEvent {
            timestamp: 100 * NS,
            instrument_id: "BTC-USD".to_string(),
            price: 100.5,
            volume_24h: 1000.0,
            low_24h: 95.0,
            high_24h: 105.0,
            pct_change_24h: 2.0,
        }];

        let mut engine =
            ReconstructionEngine::new(quiet_config()).with_ticker_events(&ticker_events);
        let mut sink = VecSink::new();

        // Emission at t=103: joins the t=100 ticker via the ±5s window
        engine.run(base_batch(103, "BTC-USD"), &mut sink).unwrap();

        let record = &sink.snapshots()[0];
        let fields = record.ticker.expect("ticker should join");
        assert_eq!(fields.ticker_price, 100.5);
        assert_eq!(engine.stats().ticker_misses, 0);
    }

    #[test]
    fn test_ticker_miss_is_soft() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        engine.run(base_batch(0, "BTC-USD"), &mut sink).unwrap();

        // Emitted anyway, with no ticker fields
        assert_eq!(sink.len(), 1);
        assert!(sink.snapshots()[0].ticker.is_none());
        assert_eq!(engine.stats().ticker_misses, 1);
        assert_eq!(
            engine
                .anomalies()
                .count_by_category(AnomalyCategory::MissingTicker),
            1
        );
    }

    #[test]
    fn test_stats_account_for_every_event() {
        let mut engine = ReconstructionEngine::new(quiet_config());
        let mut sink = VecSink::new();

        let mut events = base_batch(0, "BTC-USD");
        events.push(upd(11, "BTC-USD", Side::Bid, 100.2, 1.0));
        events.push(upd(12, "BTC-USD", Side::Bid, 100.0, -1.0)); // malformed
        engine.run(events, &mut sink).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.snapshot_entries, 4);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.malformed_skipped, 1);
        assert_eq!(stats.events_processed(), 5);
    }

    #[test]
    fn test_book_config_derivation() {
        let config = quiet_config()
            .with_outlier_policy(OutlierPolicy::Reference)
            .with_outlier_threshold(0.05)
            .with_ema_alpha(0.2)
            .with_impact_probe_qty(0.1);

        let book_config = config.book_config();
        assert_eq!(book_config.outlier_policy, OutlierPolicy::Reference);
        assert_eq!(book_config.outlier_threshold, 0.05);
        assert_eq!(book_config.ema_alpha, 0.2);
        assert_eq!(book_config.impact_probe_qty, 0.1);
        assert!(!book_config.log_warnings);
    }
}
