//! One side of an order book: a sorted price → quantity mapping.
//!
//! `BTreeMap` keeps the fixed-point price keys sorted, so best-price and
//! top-N queries are cheap iterator walks: bids read the map back-to-front
//! (highest price first), asks front-to-back (lowest price first).
//!
//! # Invariant
//!
//! A price level with quantity 0 is never stored; `set(price, 0.0)` removes
//! the key. Mutation goes through `set`/`clear` only.

use std::collections::BTreeMap;

use crate::types::Side;

/// One side's ladder of resting liquidity.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    side: Side,
    levels: BTreeMap<i64, f64>,
}

impl Ladder {
    /// Create an empty ladder for the given side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Which side this ladder holds.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Set the absolute quantity at a price level. Quantity 0 removes the
    /// level; quantities come from well-formed decimal input, so exact
    /// comparison against zero is the deletion test.
    #[inline]
    pub fn set(&mut self, price: i64, quantity: f64) {
        if quantity == 0.0 {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, quantity);
        }
    }

    /// Remove all levels.
    #[inline]
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Best price level: highest for bids, lowest for asks.
    #[inline]
    pub fn best(&self) -> Option<(i64, f64)> {
        match self.side {
            Side::Bid => self.levels.iter().next_back().map(|(&p, &q)| (p, q)),
            Side::Ask => self.levels.iter().next().map(|(&p, &q)| (p, q)),
        }
    }

    /// Best price alone.
    #[inline]
    pub fn best_price(&self) -> Option<i64> {
        self.best().map(|(p, _)| p)
    }

    /// The top `n` levels, best first.
    pub fn top(&self, n: usize) -> Vec<(i64, f64)> {
        match self.side {
            Side::Bid => self
                .levels
                .iter()
                .rev()
                .take(n)
                .map(|(&p, &q)| (p, q))
                .collect(),
            Side::Ask => self
                .levels
                .iter()
                .take(n)
                .map(|(&p, &q)| (p, q))
                .collect(),
        }
    }

    /// Aggregate quantity over the top `n` levels.
    pub fn volume_top(&self, n: usize) -> f64 {
        match self.side {
            Side::Bid => self.levels.values().rev().take(n).sum(),
            Side::Ask => self.levels.values().take(n).sum(),
        }
    }

    /// Quantity resting at an exact price, if the level exists.
    #[inline]
    pub fn quantity_at(&self, price: i64) -> Option<f64> {
        self.levels.get(&price).copied()
    }

    /// Number of price levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the ladder has no levels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterate levels best-first.
    pub fn iter_best_first(&self) -> Box<dyn Iterator<Item = (i64, f64)> + '_> {
        match self.side {
            Side::Bid => Box::new(self.levels.iter().rev().map(|(&p, &q)| (p, q))),
            Side::Ask => Box::new(self.levels.iter().map(|(&p, &q)| (p, q))),
        }
    }
}
