//! Mock venue gateway for unit and scenario testing.
//!
//! Supports scripted quotes, balances, fills and deposit histories plus
//! failure flags and latency injection, and records every order and
//! withdrawal so tests can assert on what was placed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::VenueError;
use crate::quotes::Quote;

use super::gateway::VenueGateway;
use super::types::{
    DepositAddress, DepositRecord, DepositStatus, OrderFill, OrderStatus, Pair, Side, VenueId,
    VenueProfile, WithdrawalId,
};

/// A recorded market order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// Pair traded.
    pub pair: Pair,
    /// Order side.
    pub side: Side,
    /// Requested amount (quote units for buys, base units for sells).
    pub amount: Decimal,
}

/// A recorded withdrawal request.
#[derive(Debug, Clone)]
pub struct RecordedWithdrawal {
    /// Currency withdrawn.
    pub currency: String,
    /// Amount withdrawn.
    pub amount: Decimal,
    /// Destination address.
    pub address: String,
}

#[derive(Debug, Default)]
struct MockState {
    quotes: HashMap<Pair, (Decimal, Decimal)>,
    balances: HashMap<String, Decimal>,
    deposits: HashMap<String, Vec<DepositRecord>>,
    pairs: Vec<Pair>,
    orders: Vec<PlacedOrder>,
    withdrawals: Vec<RecordedWithdrawal>,
}

/// Failure and latency knobs.
#[derive(Debug, Clone, Default)]
struct MockBehavior {
    fail_quotes: bool,
    fail_balances: bool,
    fail_orders: bool,
    fail_withdrawals: bool,
    latency: Option<Duration>,
    /// Fill this fraction of requested size (1 = full fill).
    fill_fraction: Option<Decimal>,
}

/// Mock venue gateway.
#[derive(Debug, Clone)]
pub struct MockVenue {
    id: VenueId,
    profile: VenueProfile,
    state: Arc<Mutex<MockState>>,
    behavior: MockBehavior,
    order_seq: Arc<AtomicU64>,
}

impl MockVenue {
    /// Create a mock venue with a flat 0.1% taker fee and no withdrawal fees.
    pub fn new(id: impl Into<String>) -> Self {
        let id = VenueId::new(id);
        Self {
            profile: VenueProfile {
                id: id.clone(),
                taker_fee: Decimal::new(1, 3), // 0.001
                maker_fee: Decimal::new(1, 3),
                pair_taker_fees: HashMap::new(),
                withdrawal_fees: HashMap::new(),
                transfer_minutes: HashMap::new(),
            },
            id,
            state: Arc::new(Mutex::new(MockState::default())),
            behavior: MockBehavior::default(),
            order_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replace the venue profile.
    pub fn with_profile(mut self, profile: VenueProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Override the flat taker fee.
    pub fn with_taker_fee(mut self, fee: Decimal) -> Self {
        self.profile.taker_fee = fee;
        self
    }

    /// Set the withdrawal fee for a currency.
    pub fn with_withdrawal_fee(mut self, currency: &str, fee: Decimal) -> Self {
        self.profile
            .withdrawal_fees
            .insert(currency.to_string(), fee);
        self
    }

    /// Script a top-of-book quote for a pair (also lists the pair).
    pub fn with_quote(self, pair: &Pair, bid: Decimal, ask: Decimal) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.quotes.insert(pair.clone(), (bid, ask));
            if !state.pairs.contains(pair) {
                state.pairs.push(pair.clone());
            }
        }
        self
    }

    /// Script a free balance for a currency.
    pub fn with_balance(self, currency: &str, amount: Decimal) -> Self {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(currency.to_string(), amount);
        self
    }

    /// Inject latency on every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = Some(latency);
        self
    }

    /// Make quote requests fail.
    pub fn failing_quotes(mut self) -> Self {
        self.behavior.fail_quotes = true;
        self
    }

    /// Make balance queries fail.
    pub fn failing_balances(mut self) -> Self {
        self.behavior.fail_balances = true;
        self
    }

    /// Make order placement fail.
    pub fn failing_orders(mut self) -> Self {
        self.behavior.fail_orders = true;
        self
    }

    /// Make withdrawal initiation fail.
    pub fn failing_withdrawals(mut self) -> Self {
        self.behavior.fail_withdrawals = true;
        self
    }

    /// Fill only a fraction of every order (forces `Partial` status).
    pub fn with_fill_fraction(mut self, fraction: Decimal) -> Self {
        self.behavior.fill_fraction = Some(fraction);
        self
    }

    /// Append a confirmed deposit to the scripted history.
    pub fn push_deposit(&self, currency: &str, amount: Decimal) {
        self.state
            .lock()
            .unwrap()
            .deposits
            .entry(currency.to_string())
            .or_default()
            .insert(
                0,
                DepositRecord {
                    amount,
                    status: DepositStatus::Ok,
                    timestamp: OffsetDateTime::now_utc(),
                },
            );
    }

    /// Orders recorded so far.
    pub fn placed_orders(&self) -> Vec<PlacedOrder> {
        self.state.lock().unwrap().orders.clone()
    }

    /// Withdrawals recorded so far.
    pub fn withdrawals(&self) -> Vec<RecordedWithdrawal> {
        self.state.lock().unwrap().withdrawals.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.behavior.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_order_id(&self) -> String {
        format!("{}-{}", self.id, self.order_seq.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl VenueGateway for MockVenue {
    fn id(&self) -> &VenueId {
        &self.id
    }

    fn profile(&self) -> &VenueProfile {
        &self.profile
    }

    async fn quote(&self, pair: &Pair) -> Result<Quote, VenueError> {
        self.simulate_latency().await;

        if self.behavior.fail_quotes {
            return Err(VenueError::Network {
                venue: self.id.clone(),
                reason: "mock quote failure".to_string(),
            });
        }

        let state = self.state.lock().unwrap();
        let (bid, ask) = state
            .quotes
            .get(pair)
            .copied()
            .ok_or_else(|| VenueError::UnknownPair {
                venue: self.id.clone(),
                pair: pair.to_string(),
            })?;

        Ok(Quote {
            venue: self.id.clone(),
            pair: pair.clone(),
            bid,
            ask,
            observed_at: OffsetDateTime::now_utc(),
        })
    }

    async fn balance(&self, currency: &str) -> Result<Decimal, VenueError> {
        self.simulate_latency().await;
        if self.behavior.fail_balances {
            return Err(VenueError::Network {
                venue: self.id.clone(),
                reason: "mock balance failure".to_string(),
            });
        }
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(currency).copied().unwrap_or(Decimal::ZERO))
    }

    async fn place_market_order(
        &self,
        pair: &Pair,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderFill, VenueError> {
        self.simulate_latency().await;

        if self.behavior.fail_orders {
            return Err(VenueError::OrderRejected {
                venue: self.id.clone(),
                reason: "mock order failure".to_string(),
            });
        }

        let order_id = self.next_order_id();
        let mut state = self.state.lock().unwrap();
        state.orders.push(PlacedOrder {
            pair: pair.clone(),
            side,
            amount,
        });

        let (bid, ask) = state
            .quotes
            .get(pair)
            .copied()
            .ok_or_else(|| VenueError::UnknownPair {
                venue: self.id.clone(),
                pair: pair.to_string(),
            })?;

        // Buys spend quote currency at the ask, net of the taker fee;
        // sells dispose base currency at the bid.
        let fee = self.profile.taker_fee_for(pair);
        let (filled_amount, avg_price) = match side {
            Side::Buy => ((amount / ask) * (Decimal::ONE - fee), ask),
            Side::Sell => (amount, bid),
        };

        let (filled_amount, status) = match self.behavior.fill_fraction {
            Some(fraction) if fraction < Decimal::ONE => {
                (filled_amount * fraction, OrderStatus::Partial)
            }
            _ => (filled_amount, OrderStatus::Closed),
        };

        Ok(OrderFill {
            order_id,
            filled_amount,
            avg_price,
            status,
        })
    }

    async fn deposit_address(&self, currency: &str) -> Result<DepositAddress, VenueError> {
        self.simulate_latency().await;
        Ok(DepositAddress {
            address: format!("{}-{}-deposit", self.id, currency.to_lowercase()),
            tag: None,
        })
    }

    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &DepositAddress,
    ) -> Result<WithdrawalId, VenueError> {
        self.simulate_latency().await;

        if self.behavior.fail_withdrawals {
            return Err(VenueError::WithdrawalRejected {
                venue: self.id.clone(),
                currency: currency.to_string(),
                reason: "mock withdrawal failure".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.withdrawals.push(RecordedWithdrawal {
            currency: currency.to_string(),
            amount,
            address: address.address.clone(),
        });

        Ok(WithdrawalId(format!("wd-{}-{}", self.id, state.withdrawals.len())))
    }

    async fn recent_deposits(&self, currency: &str) -> Result<Vec<DepositRecord>, VenueError> {
        self.simulate_latency().await;
        let state = self.state.lock().unwrap();
        Ok(state.deposits.get(currency).cloned().unwrap_or_default())
    }

    async fn list_pairs(&self) -> Result<Vec<Pair>, VenueError> {
        self.simulate_latency().await;
        Ok(self.state.lock().unwrap().pairs.clone())
    }
}
