//! Order book state: per-instrument ladders, outlier filtering, and
//! feature extraction.

pub mod features;
pub mod ladder;
pub mod state;

pub use features::{BookFeatures, TopOfBook, VWAP_LEVELS};
pub use ladder::Ladder;
pub use state::{ApplyOutcome, BookConfig, BookStats, OrderBookState, OutlierFilter, OutlierPolicy};
