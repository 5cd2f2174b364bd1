//! Quote types produced by the aggregator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::venue::types::{Pair, VenueId};

/// Top-of-book snapshot from one venue.
///
/// Produced fresh on every aggregation round and never mutated; the next
/// round supersedes it with a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Venue that answered.
    pub venue: VenueId,
    /// Trading pair.
    pub pair: Pair,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// When the venue observed the book.
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

impl Quote {
    /// Whether bid and ask are both positive and not crossed.
    pub fn is_sane(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.ask >= self.bid
    }

    /// Mid price.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// One round's quotes for a pair: the subset of venues that answered in time.
#[derive(Debug, Clone)]
pub struct QuoteSet {
    /// Pair the round was taken for.
    pub pair: Pair,
    /// Quotes collected, at most one per venue.
    pub quotes: Vec<Quote>,
    /// Venues that errored or timed out this round.
    pub missing: Vec<VenueId>,
}

impl QuoteSet {
    /// Quote from a specific venue, if it answered.
    pub fn from_venue(&self, venue: &VenueId) -> Option<&Quote> {
        self.quotes.iter().find(|q| &q.venue == venue)
    }

    /// Number of venues that answered.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether no venue answered.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
