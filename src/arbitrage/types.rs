//! Opportunity types and the fee/cost model fed to the scorers.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use strum::Display;
use time::OffsetDateTime;

use crate::venue::types::{Pair, Side, VenueId, VenueProfile};

/// Kind of arbitrage opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Buy on one venue, sell on another.
    #[strum(serialize = "cross_venue")]
    CrossVenue,
    /// A chain of trades on one venue returning to the anchor currency.
    #[strum(serialize = "cyclic")]
    Cyclic,
}

/// One atomic buy or sell within an arbitrage path.
#[derive(Debug, Clone, Serialize)]
pub struct Leg {
    /// Venue the leg trades on.
    pub venue: VenueId,
    /// Pair traded.
    pub pair: Pair,
    /// Buy or sell the base currency.
    pub side: Side,
    /// Top-of-book price used for scoring (ask for buys, bid for sells).
    pub price: Decimal,
}

/// A scored arbitrage candidate. Immutable once emitted; consumed at most
/// once by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    /// Cross-venue or cyclic.
    pub kind: OpportunityKind,
    /// Ordered legs of the path.
    pub legs: Vec<Leg>,
    /// Starting amount in the quote/anchor currency.
    pub investment: Decimal,
    /// Expected amount back after all legs, fees and transfer costs.
    pub expected_net: Decimal,
    /// `expected_net / investment - 1`.
    pub profit_fraction: Decimal,
    /// Estimated inter-venue transfer time in minutes (cross-venue only).
    pub transfer_minutes: Option<u64>,
    /// When the opportunity was scored.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

impl Opportunity {
    /// Expected absolute profit in quote/anchor units.
    pub fn expected_profit(&self) -> Decimal {
        self.expected_net - self.investment
    }

    /// The asset carried through the path (base currency of the first leg).
    pub fn asset(&self) -> &str {
        &self.legs[0].pair.base
    }

    /// Venue of the first leg.
    pub fn buy_venue(&self) -> &VenueId {
        &self.legs[0].venue
    }

    /// Venue of the last leg.
    pub fn sell_venue(&self) -> &VenueId {
        &self.legs[self.legs.len() - 1].venue
    }

    /// Human-readable path, e.g. "binance BUY BTC/USDT -> kucoin SELL BTC/USDT".
    pub fn path(&self) -> String {
        self.legs
            .iter()
            .map(|l| format!("{} {} {}", l.venue, l.side, l.pair))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Immutable fee and transfer-cost model, built once from the venue profiles
/// and passed explicitly to the scorers. Pure data: scoring does no I/O.
#[derive(Debug, Clone, Default)]
pub struct CostModel {
    profiles: HashMap<VenueId, VenueProfile>,
}

impl CostModel {
    /// Build the model from venue profiles.
    pub fn from_profiles<'a>(profiles: impl IntoIterator<Item = &'a VenueProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id.clone(), p.clone()))
                .collect(),
        }
    }

    /// Taker fee for a pair on a venue. Unknown venues cost a conservative 0.2%.
    pub fn taker_fee(&self, venue: &VenueId, pair: &Pair) -> Decimal {
        self.profiles
            .get(venue)
            .map(|p| p.taker_fee_for(pair))
            .unwrap_or(Self::DEFAULT_TAKER_FEE)
    }

    /// Fixed withdrawal fee for a currency on a venue.
    pub fn withdrawal_fee(&self, venue: &VenueId, currency: &str) -> Decimal {
        self.profiles
            .get(venue)
            .map(|p| p.withdrawal_fee(currency))
            .unwrap_or(Decimal::ZERO)
    }

    /// Estimated transfer time between two venues, in minutes.
    pub fn transfer_minutes(&self, from: &VenueId, to: &VenueId) -> u64 {
        self.profiles
            .get(from)
            .map(|p| p.transfer_minutes_to(to))
            .unwrap_or(VenueProfile::DEFAULT_TRANSFER_MINUTES)
    }

    /// Fallback taker fee for venues missing a profile (matches the most
    /// expensive venue in the original fee table).
    pub const DEFAULT_TAKER_FEE: Decimal = Decimal::from_parts(2, 0, 0, false, 3);
}
