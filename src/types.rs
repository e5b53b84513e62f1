//! Core data types for L2 events and emitted snapshots.
//!
//! These types are the normalized output of the upstream event decoder and
//! the input to the reconstruction engine:
//! - Timestamps are nanoseconds since epoch (`i64`)
//! - Prices are fixed-point `i64` (divide by 1e9 for the quoted unit), which
//!   keeps them exact as ordered map keys
//! - Quantities are `f64` (crypto sizes are fractional)

use serde::{Deserialize, Serialize};

use crate::book::features::BookFeatures;
use crate::error::{EngineError, Result};

/// Fixed-point price scale: raw price units per quoted unit.
pub const PRICE_SCALE: f64 = 1e9;

/// Convert a decimal price to fixed-point representation.
#[inline]
pub fn price_from_f64(value: f64) -> i64 {
    (value * PRICE_SCALE).round() as i64
}

/// Convert a fixed-point price back to decimal.
#[inline]
pub fn price_to_f64(price: i64) -> f64 {
    price as f64 / PRICE_SCALE
}

/// Order book side (bid or ask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy side
    Bid,
    /// Sell side (the upstream feed calls this "offer")
    Ask,
}

impl Side {
    /// Parse a side from its wire name. The feed uses `"bid"` and `"offer"`;
    /// `"ask"` is accepted as a synonym.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "bid" => Some(Side::Bid),
            "offer" | "ask" => Some(Side::Ask),
            _ => None,
        }
    }

    /// Wire name of this side.
    pub fn as_wire(self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "offer",
        }
    }

    /// Check if this is the bid side.
    #[inline(always)]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// Check if this is the ask side.
    #[inline(always)]
    pub fn is_ask(self) -> bool {
        matches!(self, Side::Ask)
    }
}

/// What an [`OrderEvent`] means for the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// One ladder entry out of a batch that collectively replaces the book.
    /// Entries of one batch share the same `(timestamp, instrument_id)`.
    Snapshot,
    /// A single incremental mutation against the already-built ladder.
    Update,
}

impl EventKind {
    /// Parse an event kind from its wire name.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "snapshot" => Some(EventKind::Snapshot),
            "update" => Some(EventKind::Update),
            _ => None,
        }
    }

    /// Wire name of this kind.
    pub fn as_wire(self) -> &'static str {
        match self {
            EventKind::Snapshot => "snapshot",
            EventKind::Update => "update",
        }
    }
}

/// A single decoded L2 order book event.
///
/// Events for one instrument must be fed to the engine in non-decreasing
/// timestamp order; the decoder guarantees this, the engine checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Event timestamp (nanoseconds since epoch)
    pub timestamp: i64,

    /// Instrument identifier (e.g. "BTC-USD")
    pub instrument_id: String,

    /// Snapshot-batch entry or incremental update
    pub kind: EventKind,

    /// Which ladder the event touches
    pub side: Side,

    /// Price level in fixed-point format (divide by 1e9 for the quoted unit)
    pub price: i64,

    /// New absolute quantity at the level; 0 removes the level
    pub quantity: f64,
}

impl OrderEvent {
    /// Create a new order event with a fixed-point price.
    pub fn new(
        timestamp: i64,
        instrument_id: impl Into<String>,
        kind: EventKind,
        side: Side,
        price: i64,
        quantity: f64,
    ) -> Self {
        Self {
            timestamp,
            instrument_id: instrument_id.into(),
            kind,
            side,
            price,
            quantity,
        }
    }

    /// Create a new order event from a decimal price.
    pub fn from_decimal(
        timestamp: i64,
        instrument_id: impl Into<String>,
        kind: EventKind,
        side: Side,
        price: f64,
        quantity: f64,
    ) -> Self {
        Self::new(
            timestamp,
            instrument_id,
            kind,
            side,
            price_from_f64(price),
            quantity,
        )
    }

    /// Get the price as a decimal.
    #[inline]
    pub fn price_as_f64(&self) -> f64 {
        price_to_f64(self.price)
    }

    /// Validate the event fields.
    ///
    /// A malformed event reaching the engine is a decoder defect; the engine
    /// skips it rather than corrupting ladder state.
    pub fn validate(&self) -> Result<()> {
        if self.price <= 0 {
            return Err(EngineError::InvalidPrice(self.price));
        }

        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(EngineError::InvalidQuantity(self.quantity));
        }

        Ok(())
    }
}

/// One ladder entry of a snapshot-kind batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderEntry {
    pub side: Side,
    pub price: i64,
    pub quantity: f64,
}

impl From<&OrderEvent> for LadderEntry {
    fn from(ev: &OrderEvent) -> Self {
        Self {
            side: ev.side,
            price: ev.price,
            quantity: ev.quantity,
        }
    }
}

/// A decoded ticker message. Auxiliary annotation only; never drives book
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEvent {
    /// Event timestamp (nanoseconds since epoch)
    pub timestamp: i64,

    /// Instrument identifier
    pub instrument_id: String,

    /// Last trade price
    pub price: f64,

    /// 24-hour traded volume
    pub volume_24h: f64,

    /// 24-hour low
    pub low_24h: f64,

    /// 24-hour high
    pub high_24h: f64,

    /// 24-hour percent change
    pub pct_change_24h: f64,
}

impl TickerEvent {
    /// The annotation fields carried onto an emitted snapshot.
    pub fn annotation(&self) -> TickerFields {
        TickerFields {
            ticker_price: self.price,
            ticker_volume_24h: self.volume_24h,
            ticker_low_24h: self.low_24h,
            ticker_high_24h: self.high_24h,
            ticker_pct_change_24h: self.pct_change_24h,
        }
    }
}

/// Ticker annotation attached to emitted snapshots when a nearby ticker
/// event exists. Field names follow the historical snapshot column layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerFields {
    pub ticker_price: f64,
    pub ticker_volume_24h: f64,
    pub ticker_low_24h: f64,
    pub ticker_high_24h: f64,
    pub ticker_pct_change_24h: f64,
}

/// Book health after an update, from the emission gate's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookHealth {
    /// Both sides quoted and best_bid < best_ask
    Valid,
    /// One or both sides have no quotes
    Empty,
    /// best_bid >= best_ask. A locked book (bid == ask) is folded in here:
    /// it fails the same emission gate.
    Crossed,
}

impl BookHealth {
    /// Returns true if the book may emit snapshots.
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, BookHealth::Valid)
    }

    /// Returns true if the book is crossed (or locked).
    #[inline]
    pub fn is_crossed(&self) -> bool {
        matches!(self, BookHealth::Crossed)
    }

    /// Returns true if either side is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BookHealth::Empty)
    }
}

/// An emitted market snapshot: book features plus optional ticker
/// annotation. Read-only once emitted; ownership passes to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Timestamp of the event that triggered emission (nanoseconds)
    pub timestamp: i64,

    /// Instrument identifier
    pub instrument_id: String,

    /// Derived book features
    #[serde(flatten)]
    pub features: BookFeatures,

    /// Ticker annotation; `None` when no ticker matched within tolerance
    #[serde(flatten)]
    pub ticker: Option<TickerFields>,
}
