//! The venue gateway capability interface.
//!
//! Every connected venue implements [`VenueGateway`]. Gateways are selected
//! through explicit registration at startup (see [`super::registry`]), never
//! through runtime reflection.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::VenueError;
use crate::quotes::Quote;

use super::types::{
    DepositAddress, DepositRecord, OrderFill, Pair, Side, VenueId, VenueProfile, WithdrawalId,
};

/// Per-venue adapter exposing quotes, balances, orders and transfers.
///
/// All methods suspend on network I/O only and must resolve within the
/// gateway's own request timeout; callers add their own bound on top
/// (see the quote aggregator).
#[async_trait]
pub trait VenueGateway: Send + Sync {
    /// The venue this gateway talks to.
    fn id(&self) -> &VenueId;

    /// The venue's immutable fee/transfer configuration.
    fn profile(&self) -> &VenueProfile;

    /// Top-of-book quote for a pair.
    async fn quote(&self, pair: &Pair) -> Result<Quote, VenueError>;

    /// Free (available) balance for a currency.
    async fn balance(&self, currency: &str) -> Result<Decimal, VenueError>;

    /// Place a market order.
    ///
    /// For buys, `amount` is denominated in the quote currency (spend);
    /// for sells, in the base currency (dispose).
    async fn place_market_order(
        &self,
        pair: &Pair,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderFill, VenueError>;

    /// Deposit address for receiving a currency.
    async fn deposit_address(&self, currency: &str) -> Result<DepositAddress, VenueError>;

    /// Initiate a withdrawal to an external address.
    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &DepositAddress,
    ) -> Result<WithdrawalId, VenueError>;

    /// Recent deposit history for a currency, newest first.
    async fn recent_deposits(&self, currency: &str) -> Result<Vec<DepositRecord>, VenueError>;

    /// All pairs tradable on this venue. Used once at startup to build cycles.
    async fn list_pairs(&self) -> Result<Vec<Pair>, VenueError>;
}
