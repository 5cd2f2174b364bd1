//! Central per-venue request rate limiting.
//!
//! One limiter exists per venue and is shared by every concurrent caller
//! (quote polling, balance checks, order placement), so scan and execution
//! activity cannot jointly exceed a venue's request-rate ceiling.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::error::VenueError;
use crate::quotes::Quote;

use super::gateway::VenueGateway;
use super::types::{
    DepositAddress, DepositRecord, OrderFill, Pair, Side, VenueId, VenueProfile, WithdrawalId,
};

/// Sliding-window rate limiter: at most `max_requests` per `window`.
///
/// `acquire` suspends until a slot opens instead of rejecting, so callers
/// never need retry logic.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Limiter from a requests-per-second budget.
    pub fn per_second(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    /// Wait until a request slot is available, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();
                while let Some(front) = sent.front() {
                    if now.duration_since(*front) >= self.window {
                        sent.pop_front();
                    } else {
                        break;
                    }
                }

                if sent.len() < self.max_requests {
                    sent.push_back(now);
                    return;
                }

                // Oldest in-window request decides when the next slot opens.
                self.window - now.duration_since(*sent.front().unwrap())
            };

            tokio::time::sleep(wait).await;
        }
    }
}

/// Gateway wrapper that paces every call through a shared [`RateLimiter`].
pub struct Throttled<G> {
    inner: G,
    limiter: Arc<RateLimiter>,
}

impl<G: VenueGateway> Throttled<G> {
    /// Wrap a gateway with a limiter.
    pub fn new(inner: G, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<G: VenueGateway> VenueGateway for Throttled<G> {
    fn id(&self) -> &VenueId {
        self.inner.id()
    }

    fn profile(&self) -> &VenueProfile {
        self.inner.profile()
    }

    async fn quote(&self, pair: &Pair) -> Result<Quote, VenueError> {
        self.limiter.acquire().await;
        self.inner.quote(pair).await
    }

    async fn balance(&self, currency: &str) -> Result<Decimal, VenueError> {
        self.limiter.acquire().await;
        self.inner.balance(currency).await
    }

    async fn place_market_order(
        &self,
        pair: &Pair,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderFill, VenueError> {
        self.limiter.acquire().await;
        self.inner.place_market_order(pair, side, amount).await
    }

    async fn deposit_address(&self, currency: &str) -> Result<DepositAddress, VenueError> {
        self.limiter.acquire().await;
        self.inner.deposit_address(currency).await
    }

    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &DepositAddress,
    ) -> Result<WithdrawalId, VenueError> {
        self.limiter.acquire().await;
        self.inner.withdraw(currency, amount, address).await
    }

    async fn recent_deposits(&self, currency: &str) -> Result<Vec<DepositRecord>, VenueError> {
        self.limiter.acquire().await;
        self.inner.recent_deposits(currency).await
    }

    async fn list_pairs(&self) -> Result<Vec<Pair>, VenueError> {
        self.limiter.acquire().await;
        self.inner.list_pairs().await
    }
}
