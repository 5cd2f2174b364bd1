//! Unified error types for the arbitrage engine.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::venue::types::VenueId;

/// Unified error type for the arbitrage engine.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Venue gateway error.
    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    /// Opportunity scoring error.
    #[error("arbitrage error: {0}")]
    Arbitrage(#[from] ArbitrageError),

    /// Execution orchestration error.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Venue gateway errors.
///
/// `Timeout`, `RateLimited` and `Network` are transient: a scan round drops
/// the venue and retries on the next round. The rest surface to the caller.
#[derive(Error, Debug)]
pub enum VenueError {
    /// Request exceeded its deadline.
    #[error("venue {venue} timed out after {elapsed_ms}ms")]
    Timeout {
        /// The venue that timed out.
        venue: VenueId,
        /// Elapsed time before the deadline fired.
        elapsed_ms: u64,
    },

    /// Venue rejected the request for rate reasons.
    #[error("venue {venue} rate limited")]
    RateLimited {
        /// The venue that throttled us.
        venue: VenueId,
    },

    /// Transport-level failure.
    #[error("venue {venue} network error: {reason}")]
    Network {
        /// The venue we failed to reach.
        venue: VenueId,
        /// Underlying failure description.
        reason: String,
    },

    /// Pair is not tradable on the venue.
    #[error("pair {pair} not listed on {venue}")]
    UnknownPair {
        /// The venue queried.
        venue: VenueId,
        /// The pair requested, as "BASE/QUOTE".
        pair: String,
    },

    /// Venue returned a payload we could not interpret.
    #[error("venue {venue} returned malformed data: {reason}")]
    MalformedResponse {
        /// The venue queried.
        venue: VenueId,
        /// What failed to parse.
        reason: String,
    },

    /// Order was rejected by the venue.
    #[error("order rejected by {venue}: {reason}")]
    OrderRejected {
        /// The venue that rejected the order.
        venue: VenueId,
        /// Rejection reason.
        reason: String,
    },

    /// Withdrawal initiation failed.
    #[error("withdrawal of {currency} rejected by {venue}: {reason}")]
    WithdrawalRejected {
        /// The source venue.
        venue: VenueId,
        /// Currency being withdrawn.
        currency: String,
        /// Rejection reason.
        reason: String,
    },
}

impl VenueError {
    /// Whether the error is transient (retry next round, never fatal).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VenueError::Timeout { .. } | VenueError::RateLimited { .. } | VenueError::Network { .. }
        )
    }
}

/// Opportunity detection and scoring errors.
#[derive(Error, Debug)]
pub enum ArbitrageError {
    /// Invalid investment size.
    #[error("invalid investment size: {0}")]
    InvalidInvestment(Decimal),

    /// A cycle's legs do not chain back to the anchor.
    #[error("broken cycle: holding {held}, next leg needs {needed}")]
    BrokenCycle {
        /// Currency held at the broken link.
        held: String,
        /// Currency the next leg consumes.
        needed: String,
    },
}

/// Execution orchestration errors.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Another execution holds the (asset, venue-pair) slot.
    #[error("execution already in flight for {asset} on {buy_venue}->{sell_venue}")]
    SlotBusy {
        /// Asset being arbitraged.
        asset: String,
        /// Buy-side venue.
        buy_venue: VenueId,
        /// Sell-side venue.
        sell_venue: VenueId,
    },

    /// Free balance below the required investment.
    #[error("insufficient balance on {venue}: need {required}, have {available}")]
    InsufficientBalance {
        /// Venue checked.
        venue: VenueId,
        /// Amount required.
        required: Decimal,
        /// Amount available.
        available: Decimal,
    },

    /// The opportunity has no legs or an unsupported shape.
    #[error("malformed opportunity: {0}")]
    MalformedOpportunity(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
