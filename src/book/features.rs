//! Derived microstructure features for one book observation.
//!
//! `TopOfBook` is the raw top-N view; `BookFeatures` is the flat numeric
//! record emitted on snapshots. Both exist only for healthy books — the
//! caller gates on `best_bid < best_ask` before constructing them.

use serde::{Deserialize, Serialize};

use crate::types::price_to_f64;

/// Number of levels per side aggregated into the VWAP features.
pub const VWAP_LEVELS: usize = 5;

/// Top-N view of a healthy book: levels best-first per side, with aggregate
/// volumes over those levels.
#[derive(Debug, Clone, PartialEq)]
pub struct TopOfBook {
    /// Bid levels, highest price first, as (fixed-point price, quantity)
    pub bids: Vec<(i64, f64)>,

    /// Ask levels, lowest price first
    pub asks: Vec<(i64, f64)>,

    /// Aggregate quantity over the bid levels above
    pub bid_volume: f64,

    /// Aggregate quantity over the ask levels above
    pub ask_volume: f64,
}

impl TopOfBook {
    /// Best bid level. Present by construction.
    #[inline]
    pub fn best_bid(&self) -> (i64, f64) {
        self.bids[0]
    }

    /// Best ask level. Present by construction.
    #[inline]
    pub fn best_ask(&self) -> (i64, f64) {
        self.asks[0]
    }
}

/// Flat feature record derived from a [`TopOfBook`].
///
/// Prices are decimal here (the snapshot row is for downstream ML
/// consumption, not for further book mutation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookFeatures {
    /// Best bid price
    pub best_bid: f64,

    /// Best ask price
    pub best_ask: f64,

    /// Midpoint of best bid/ask
    pub mid_price: f64,

    /// Absolute spread
    pub spread: f64,

    /// Spread in basis points of mid
    pub spread_bps: f64,

    /// Quantity resting at the best bid
    pub best_bid_qty: f64,

    /// Quantity resting at the best ask
    pub best_ask_qty: f64,

    /// Aggregate bid quantity over the top N levels
    pub bid_volume: f64,

    /// Aggregate ask quantity over the top N levels
    pub ask_volume: f64,

    /// bid_volume + ask_volume
    pub total_depth: f64,

    /// Depth-weighted microprice:
    /// (best_bid * ask_volume + best_ask * bid_volume) / total_depth.
    /// Leans toward the side with less resting volume; falls back to mid
    /// when total depth is zero.
    pub microprice: f64,

    /// Order book imbalance: (bid_volume - ask_volume) / total_depth,
    /// in [-1, 1]; 0 when total depth is zero.
    pub imbalance: f64,

    /// Volume-weighted average bid price over the top [`VWAP_LEVELS`] levels
    pub bid_vwap: f64,

    /// Volume-weighted average ask price over the top [`VWAP_LEVELS`] levels
    pub ask_vwap: f64,

    /// Slippage, in basis points of the best ask, of a probe market buy
    /// walked against the ask ladder
    pub impact_bps: f64,
}

impl BookFeatures {
    /// Compute the feature record from a top-of-book view.
    ///
    /// `impact_probe_qty` is the hypothetical market-buy size used for the
    /// impact feature.
    pub fn from_top_of_book(top: &TopOfBook, impact_probe_qty: f64) -> Self {
        let (best_bid_px, best_bid_qty) = top.best_bid();
        let (best_ask_px, best_ask_qty) = top.best_ask();

        let best_bid = price_to_f64(best_bid_px);
        let best_ask = price_to_f64(best_ask_px);
        let mid_price = (best_bid + best_ask) / 2.0;
        let spread = best_ask - best_bid;
        let spread_bps = if mid_price > 0.0 {
            (spread / mid_price) * 10_000.0
        } else {
            0.0
        };

        let bid_volume = top.bid_volume;
        let ask_volume = top.ask_volume;
        let total_depth = bid_volume + ask_volume;

        let microprice = if total_depth > 0.0 {
            (best_bid * ask_volume + best_ask * bid_volume) / total_depth
        } else {
            mid_price
        };

        let imbalance = if total_depth > 0.0 {
            (bid_volume - ask_volume) / total_depth
        } else {
            0.0
        };

        Self {
            best_bid,
            best_ask,
            mid_price,
            spread,
            spread_bps,
            best_bid_qty,
            best_ask_qty,
            bid_volume,
            ask_volume,
            total_depth,
            microprice,
            imbalance,
            bid_vwap: side_vwap(&top.bids, VWAP_LEVELS),
            ask_vwap: side_vwap(&top.asks, VWAP_LEVELS),
            impact_bps: impact_bps(&top.asks, best_ask, impact_probe_qty),
        }
    }
}

/// Volume-weighted average price over the first `n` levels; falls back to
/// the best price when the levels carry no volume.
fn side_vwap(levels: &[(i64, f64)], n: usize) -> f64 {
    let mut value = 0.0;
    let mut volume = 0.0;
    for &(price, qty) in levels.iter().take(n) {
        value += price_to_f64(price) * qty;
        volume += qty;
    }

    if volume > 0.0 {
        value / volume
    } else {
        levels.first().map(|&(p, _)| price_to_f64(p)).unwrap_or(0.0)
    }
}

/// Walk a probe market buy against the ask levels and report the average
/// fill price's distance from the best ask, in basis points.
fn impact_bps(asks: &[(i64, f64)], best_ask: f64, probe_qty: f64) -> f64 {
    if probe_qty <= 0.0 || best_ask <= 0.0 {
        return 0.0;
    }

    let mut remaining = probe_qty;
    let mut cost = 0.0;
    let mut filled = 0.0;

    for &(price, qty) in asks {
        if remaining <= 0.0 {
            break;
        }
        let take = qty.min(remaining);
        cost += price_to_f64(price) * take;
        filled += take;
        remaining -= take;
    }

    if filled > 0.0 {
        let avg_fill = cost / filled;
        ((avg_fill - best_ask) / best_ask) * 10_000.0
    } else {
        0.0
    }
}
