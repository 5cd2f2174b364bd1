//! Venue identifiers, trading pairs and immutable per-venue configuration.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// Venue identifier (e.g. "binance", "kucoin").
///
/// Ordered lexically; the ordering is what makes opportunity ranking
/// deterministic when profits tie.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(String);

impl VenueId {
    /// Create a venue id from a name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Base/quote currency tuple, e.g. base=BTC quote=USDT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    /// Base currency (the asset being priced).
    pub base: String,
    /// Quote currency (what the price is denominated in).
    pub quote: String,
}

impl Pair {
    /// Create a pair from base and quote currencies.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid pair '{s}': expected BASE/QUOTE"))?;
        if base.trim().is_empty() || quote.trim().is_empty() {
            return Err(format!("invalid pair '{s}': empty currency"));
        }
        Ok(Pair::new(base.trim(), quote.trim()))
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy the base currency with the quote currency.
    #[strum(to_string = "BUY", serialize = "buy")]
    Buy,
    /// Sell the base currency for the quote currency.
    #[strum(to_string = "SELL", serialize = "sell")]
    Sell,
}

/// Market order terminal status reported by a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Fully filled.
    #[strum(serialize = "closed", serialize = "CLOSED")]
    Closed,
    /// Partially filled, remainder cancelled.
    #[strum(serialize = "partial", serialize = "PARTIAL")]
    Partial,
    /// Nothing filled.
    #[strum(serialize = "failed", serialize = "FAILED", serialize = "rejected")]
    Failed,
}

impl OrderStatus {
    /// Whether the order filled in full.
    pub fn is_closed(&self) -> bool {
        matches!(self, OrderStatus::Closed)
    }
}

/// Result of a market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFill {
    /// Venue-assigned order id.
    pub order_id: String,
    /// Amount of base currency filled.
    pub filled_amount: Decimal,
    /// Average fill price in quote currency.
    pub avg_price: Decimal,
    /// Terminal status.
    pub status: OrderStatus,
}

impl OrderFill {
    /// Quote-currency proceeds/cost of the fill.
    pub fn notional(&self) -> Decimal {
        self.filled_amount * self.avg_price
    }
}

/// Deposit address on a venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositAddress {
    /// Chain address.
    pub address: String,
    /// Optional memo/tag required by some chains.
    pub tag: Option<String>,
}

/// Identifier of an initiated withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalId(pub String);

/// Status of a deposit entry in a venue's deposit history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    /// Confirmed and credited.
    #[strum(serialize = "ok", serialize = "OK")]
    Ok,
    /// Seen on chain, not yet credited.
    #[strum(serialize = "pending", serialize = "PENDING")]
    Pending,
    /// Rejected by the venue.
    #[strum(serialize = "failed", serialize = "FAILED")]
    Failed,
}

/// One entry of a venue's recent deposit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRecord {
    /// Deposited amount.
    pub amount: Decimal,
    /// Deposit status.
    pub status: DepositStatus,
    /// When the venue recorded the deposit.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Immutable per-venue fee and transfer configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueProfile {
    /// Venue identifier.
    pub id: VenueId,
    /// Flat taker fee as a fraction (0.001 = 0.1%).
    pub taker_fee: Decimal,
    /// Flat maker fee as a fraction.
    #[serde(default)]
    pub maker_fee: Decimal,
    /// Per-pair taker fee overrides keyed by "BASE/QUOTE".
    #[serde(default)]
    pub pair_taker_fees: HashMap<String, Decimal>,
    /// Fixed withdrawal fee per currency, in units of that currency.
    #[serde(default)]
    pub withdrawal_fees: HashMap<String, Decimal>,
    /// Approximate transfer latency to another venue, in minutes.
    #[serde(default)]
    pub transfer_minutes: HashMap<VenueId, u64>,
}

impl VenueProfile {
    /// Taker fee for a pair, honoring per-pair overrides.
    pub fn taker_fee_for(&self, pair: &Pair) -> Decimal {
        self.pair_taker_fees
            .get(&pair.to_string())
            .copied()
            .unwrap_or(self.taker_fee)
    }

    /// Fixed withdrawal fee for a currency (zero when unlisted).
    pub fn withdrawal_fee(&self, currency: &str) -> Decimal {
        self.withdrawal_fees
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Estimated transfer time to another venue, in minutes.
    ///
    /// Defaults to 30 minutes when no estimate is configured.
    pub fn transfer_minutes_to(&self, destination: &VenueId) -> u64 {
        self.transfer_minutes
            .get(destination)
            .copied()
            .unwrap_or(Self::DEFAULT_TRANSFER_MINUTES)
    }

    /// Fallback transfer estimate for unlisted venue pairs.
    pub const DEFAULT_TRANSFER_MINUTES: u64 = 30;
}
