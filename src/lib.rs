//! # L2 Snapshot Engine
//!
//! Order-book reconstruction and feature snapshot generation from L2 event
//! logs, designed as a preprocessing step for market-microstructure ML
//! pipelines.
//!
//! The engine consumes an ordered stream of decoded exchange events — full
//! book snapshots (sent on connect and reconnect) and incremental level
//! updates — maintains one bid/ask ladder pair per instrument, filters bad
//! data (outlier prices, crossed books), and emits interval-triggered
//! feature snapshots annotated with nearby ticker data.
//!
//! ## Features
//!
//! - **Stateful reconstruction**: snapshot-batch rebuilds + incremental
//!   updates, with an explicit accumulating/streaming state machine
//! - **Bad-data filtering**: EMA or reference-price outlier rejection,
//!   crossed/one-sided book detection
//! - **Derived features**: mid, spread, depth volumes, imbalance,
//!   microprice, VWAP, impact probe
//! - **Soft ticker join**: nearest-timestamp annotation within a bounded
//!   tolerance window; misses never block emission
//! - **Auditable runs**: full counters plus a categorized anomaly log
//!
//! ## Quick Start
//!
//! ```
//! use l2_snapshot_engine::{
//!     EngineConfig, EventKind, OrderEvent, ReconstructionEngine, Side, VecSink,
//! };
//!
//! // A connect-time snapshot batch followed by one update, 12s later
//! let events = vec![
//!     OrderEvent::from_decimal(0, "BTC-USD", EventKind::Snapshot, Side::Bid, 65_000.0, 1.5),
//!     OrderEvent::from_decimal(0, "BTC-USD", EventKind::Snapshot, Side::Ask, 65_001.0, 2.0),
//!     OrderEvent::from_decimal(
//!         12_000_000_000,
//!         "BTC-USD",
//!         EventKind::Update,
//!         Side::Bid,
//!         65_000.5,
//!         0.75,
//!     ),
//! ];
//!
//! let mut engine = ReconstructionEngine::new(EngineConfig::default());
//! let mut sink = VecSink::new();
//! engine.run(events, &mut sink).unwrap();
//!
//! // One emission at the rebuild, one at the post-interval update
//! assert_eq!(sink.len(), 2);
//! let snap = &sink.snapshots()[1];
//! assert_eq!(snap.features.best_bid, 65_000.5);
//! assert!(snap.features.spread > 0.0);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core types: `OrderEvent`, `TickerEvent`, `Side`, `EventKind`, `Snapshot` |
//! | [`book`] | Per-instrument state: `OrderBookState`, `Ladder`, `BookFeatures`, outlier filtering |
//! | [`engine`] | `ReconstructionEngine`: single-pass driver, emission policy, counters |
//! | [`ticker`] | `TickerIndex`: nearest-timestamp annotation lookup |
//! | [`source`] | `EventSource` abstraction over ordered event streams |
//! | [`sink`] | `SnapshotSink` abstraction plus in-memory and JSONL sinks |
//! | [`warnings`] | `AnomalyTracker`: categorized data-quality records |

pub mod book;
pub mod engine;
pub mod error;
pub mod sink;
pub mod source;
pub mod ticker;
pub mod types;
pub mod warnings;

// Re-exports - Core types
pub use error::{EngineError, Result};
pub use types::{
    price_from_f64, price_to_f64, BookHealth, EventKind, LadderEntry, OrderEvent, Side, Snapshot,
    TickerEvent, TickerFields, PRICE_SCALE,
};

// Re-exports - Book state and features
pub use book::{
    ApplyOutcome, BookConfig, BookFeatures, BookStats, Ladder, OrderBookState, OutlierPolicy,
    TopOfBook,
};

// Re-exports - Engine
pub use engine::{EngineConfig, EngineStats, ReconstructionEngine};

// Re-exports - Ticker join
pub use ticker::{TickerIndex, DEFAULT_TICKER_TOLERANCE};

// Re-exports - Source/sink abstractions
pub use sink::{JsonlSink, SnapshotSink, VecSink};
pub use source::{EventSource, SourceMetadata, VecSource};

// Re-exports - Anomaly tracking
pub use warnings::{Anomaly, AnomalyCategory, AnomalySummary, AnomalyTracker};
