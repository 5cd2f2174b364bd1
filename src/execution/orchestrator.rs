//! The execution saga.
//!
//! Drives one opportunity through its legs, holding the slot for the whole
//! attempt. Cross-venue runs buy -> withdraw -> wait for deposit -> sell;
//! cyclic runs its legs sequentially on one venue. Failures after the first
//! fill trigger a best-effort reversing order where one is possible.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::arbitrage::{Opportunity, OpportunityKind};
use crate::error::ExecutionError;
use crate::metrics;
use crate::venue::registry::VenueRegistry;
use crate::venue::types::{DepositStatus, Side};
use crate::venue::VenueGateway;

use super::registry::{ExecutionKey, ExecutionSlots};
use super::state::{CompensationRecord, Execution, ExecutionState, FailureReason};

/// Tunables for the transfer stage.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// How often to re-check the sell venue's deposit history.
    pub deposit_poll_interval: Duration,
    /// Give up waiting for the transfer after this long.
    pub deposit_timeout: Duration,
    /// Accept a credited deposit within this fraction of the expected amount.
    pub deposit_tolerance: Decimal,
    /// Log and record instead of placing real orders.
    pub dry_run: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            deposit_poll_interval: Duration::from_secs(30),
            deposit_timeout: Duration::from_secs(3600),
            deposit_tolerance: Decimal::new(1, 2),
            dry_run: true,
        }
    }
}

/// Owns the slot registry and runs executions against the venue registry.
pub struct Orchestrator {
    venues: Arc<VenueRegistry>,
    slots: Arc<ExecutionSlots>,
    settings: ExecutionSettings,
    shutdown: watch::Receiver<bool>,
}

impl Orchestrator {
    pub fn new(
        venues: Arc<VenueRegistry>,
        slots: Arc<ExecutionSlots>,
        settings: ExecutionSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            venues,
            slots,
            settings,
            shutdown,
        }
    }

    /// Execute one opportunity end to end.
    ///
    /// `Err` means the execution never started (slot busy, unknown venue,
    /// malformed path). Once started, every outcome including failure is
    /// reported as an [`Execution`] record.
    #[instrument(skip(self, opportunity), fields(kind = %opportunity.kind, path = %opportunity.path()))]
    pub async fn execute(&self, opportunity: Opportunity) -> Result<Execution, ExecutionError> {
        if opportunity.legs.len() < 2 {
            return Err(ExecutionError::MalformedOpportunity(format!(
                "{} leg(s)",
                opportunity.legs.len()
            )));
        }
        for leg in &opportunity.legs {
            if self.venues.get(&leg.venue).is_none() {
                return Err(ExecutionError::MalformedOpportunity(format!(
                    "unknown venue {}",
                    leg.venue
                )));
            }
        }

        let _slot = self
            .slots
            .try_acquire(ExecutionKey::for_opportunity(&opportunity))?;
        metrics::inc_executions_started();

        let kind = opportunity.kind;
        let mut record = Execution::new(opportunity, self.settings.dry_run);
        match kind {
            OpportunityKind::CrossVenue => self.run_cross_venue(&mut record).await,
            OpportunityKind::Cyclic => self.run_cyclic(&mut record).await,
        }

        match record.state {
            ExecutionState::Completed => metrics::inc_executions_completed(),
            ExecutionState::Failed => {
                if let Some(reason) = &record.failure {
                    metrics::inc_executions_failed(&reason.to_string());
                }
            }
            _ => {}
        }
        Ok(record)
    }

    async fn run_cross_venue(&self, record: &mut Execution) {
        let buy_leg = record.opportunity.legs[0].clone();
        let sell_leg = record.opportunity.legs[record.opportunity.legs.len() - 1].clone();
        let investment = record.opportunity.investment;
        let asset = buy_leg.pair.base.clone();

        // Registration was checked before the slot was taken.
        let buy_venue = match self.venues.get(&buy_leg.venue) {
            Some(v) => v,
            None => return record.fail(FailureReason::LegRejected { leg: 0 }),
        };
        let sell_venue = match self.venues.get(&sell_leg.venue) {
            Some(v) => v,
            None => return record.fail(FailureReason::LegRejected { leg: 1 }),
        };

        if !self
            .check_balance(record, &buy_venue, &buy_leg.pair.quote, investment)
            .await
        {
            return;
        }

        // Confirm the sell venue can receive the asset before any leg is
        // placed; failing here needs no compensation.
        let address = match sell_venue.deposit_address(&asset).await {
            Ok(a) => a,
            Err(err) => {
                error!(venue = %sell_leg.venue, %err, "sell venue cannot receive the asset");
                return record.fail(FailureReason::WithdrawalRejected);
            }
        };

        if record.dry_run {
            info!(
                expected_net = %record.opportunity.expected_net,
                "dry run, no orders placed"
            );
            record.transition(ExecutionState::FirstLegFilled);
            record.transition(ExecutionState::Transferring);
            record.transition(ExecutionState::DepositConfirmed);
            record.transition(ExecutionState::SecondLegFilled);
            record.complete(record.opportunity.expected_net);
            return;
        }

        // First leg: market buy on the cheaper venue.
        let fill = match buy_venue
            .place_market_order(&buy_leg.pair, Side::Buy, investment)
            .await
        {
            Ok(fill) => fill,
            Err(err) => {
                error!(venue = %buy_leg.venue, %err, "first leg rejected");
                return record.fail(FailureReason::LegRejected { leg: 0 });
            }
        };
        record.fills.push(fill.clone());
        if !fill.status.is_closed() {
            // Nothing to reverse when nothing filled.
            if fill.filled_amount > Decimal::ZERO {
                warn!(
                    filled = %fill.filled_amount,
                    "first leg filled partially, selling the fill back"
                );
                self.compensate(record, &buy_venue, &buy_leg.pair, fill.filled_amount)
                    .await;
            } else {
                warn!("first leg did not fill");
            }
            return record.fail(FailureReason::PartialFill { leg: 0 });
        }
        record.transition(ExecutionState::FirstLegFilled);

        // Transfer: withdraw from the buy venue to the sell venue.
        let withdrawal = match buy_venue
            .withdraw(&asset, fill.filled_amount, &address)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                error!(venue = %buy_leg.venue, %err, "withdrawal rejected, reversing");
                self.compensate(record, &buy_venue, &buy_leg.pair, fill.filled_amount)
                    .await;
                return record.fail(FailureReason::WithdrawalRejected);
            }
        };
        record.withdrawal = Some(withdrawal);
        record.transition(ExecutionState::Transferring);

        // Wait for the deposit to be credited on the sell venue.
        let expected =
            fill.filled_amount - buy_venue.profile().withdrawal_fee(&asset);
        let deposited = match self
            .await_deposit(&sell_venue, &asset, expected)
            .await
        {
            DepositOutcome::Credited(amount) => amount,
            DepositOutcome::TimedOut => {
                // Funds are in flight; a reversing order would double the
                // exposure, so the operator resolves this one by hand.
                error!(asset = %asset, "deposit not credited in time");
                return record.fail(FailureReason::DepositTimeout);
            }
            DepositOutcome::Interrupted => {
                warn!(asset = %asset, "shutdown during transfer wait");
                return record.fail(FailureReason::Interrupted);
            }
        };
        record.transition(ExecutionState::DepositConfirmed);

        // Second leg: market sell on the richer venue.
        let sell_fill = match sell_venue
            .place_market_order(&sell_leg.pair, Side::Sell, deposited)
            .await
        {
            Ok(fill) => fill,
            Err(err) => {
                error!(venue = %sell_leg.venue, %err, "second leg rejected");
                return record.fail(FailureReason::LegRejected { leg: 1 });
            }
        };
        record.fills.push(sell_fill.clone());
        record.transition(ExecutionState::SecondLegFilled);

        let sell_fee = sell_venue.profile().taker_fee_for(&sell_leg.pair);
        let proceeds = sell_fill.notional() * (Decimal::ONE - sell_fee);
        info!(
            proceeds = %proceeds,
            profit = %(proceeds - investment),
            "execution complete"
        );
        record.complete(proceeds);
    }

    async fn run_cyclic(&self, record: &mut Execution) {
        let legs = record.opportunity.legs.clone();
        let venue_id = legs[0].venue.clone();
        let investment = record.opportunity.investment;

        let venue = match self.venues.get(&venue_id) {
            Some(v) => v,
            None => return record.fail(FailureReason::LegRejected { leg: 0 }),
        };

        let anchor = legs[0].pair.quote.clone();
        if !self.check_balance(record, &venue, &anchor, investment).await {
            return;
        }

        if record.dry_run {
            info!(
                expected_net = %record.opportunity.expected_net,
                "dry run, no orders placed"
            );
            record.transition(ExecutionState::FirstLegFilled);
            record.transition(ExecutionState::SecondLegFilled);
            record.complete(record.opportunity.expected_net);
            return;
        }

        // Run the legs in order, carrying the produced amount forward.
        let mut held = investment;
        for (index, leg) in legs.iter().enumerate() {
            let fill = match venue.place_market_order(&leg.pair, leg.side, held).await {
                Ok(fill) => fill,
                Err(err) => {
                    // Mid-cycle the position is stuck in an intermediate
                    // currency; there is no clean reversal, only the audit
                    // trail for the operator.
                    error!(leg = index, pair = %leg.pair, %err, "cycle leg rejected");
                    return record.fail(FailureReason::LegRejected { leg: index });
                }
            };
            record.fills.push(fill.clone());
            if !fill.status.is_closed() {
                error!(leg = index, filled = %fill.filled_amount, "cycle leg partial");
                // The first leg still holds a disposable position on this
                // venue; later legs sit in an intermediate currency with no
                // clean reversal.
                if index == 0 && fill.filled_amount > Decimal::ZERO {
                    self.compensate(record, &venue, &leg.pair, fill.filled_amount)
                        .await;
                }
                return record.fail(FailureReason::PartialFill { leg: index });
            }

            let fee = venue.profile().taker_fee_for(&leg.pair);
            held = match leg.side {
                // Buys report the base amount net of fees in the fill.
                Side::Buy => fill.filled_amount,
                Side::Sell => fill.notional() * (Decimal::ONE - fee),
            };

            if index == 0 {
                record.transition(ExecutionState::FirstLegFilled);
            } else if index == legs.len() - 1 {
                record.transition(ExecutionState::SecondLegFilled);
            }
        }

        info!(proceeds = %held, profit = %(held - investment), "cycle complete");
        record.complete(held);
    }

    /// Check free balance; fail the record when short. Returns whether the
    /// saga may proceed.
    async fn check_balance(
        &self,
        record: &mut Execution,
        venue: &Arc<dyn VenueGateway>,
        currency: &str,
        required: Decimal,
    ) -> bool {
        let available = match venue.balance(currency).await {
            Ok(b) => b,
            Err(err) => {
                error!(venue = %venue.id(), %err, "balance check failed");
                record.fail(FailureReason::BalanceUnavailable);
                return false;
            }
        };
        if available < required {
            warn!(
                venue = %venue.id(),
                %required,
                %available,
                "insufficient balance"
            );
            record.fail(FailureReason::InsufficientBalance);
            return false;
        }
        record.transition(ExecutionState::BalanceChecked);
        true
    }

    /// Sell a stranded fill back on the venue it was bought on.
    async fn compensate(
        &self,
        record: &mut Execution,
        venue: &Arc<dyn VenueGateway>,
        pair: &crate::venue::types::Pair,
        amount: Decimal,
    ) {
        record.transition(ExecutionState::CompensationAttempted);
        metrics::inc_compensations();

        let fill = match venue.place_market_order(pair, Side::Sell, amount).await {
            Ok(fill) => {
                info!(venue = %venue.id(), %amount, "reversing order filled");
                Some(fill)
            }
            Err(err) => {
                error!(venue = %venue.id(), %amount, %err, "reversing order failed");
                None
            }
        };
        record.compensation = Some(CompensationRecord {
            venue: venue.id().clone(),
            pair: pair.clone(),
            amount,
            fill,
        });
    }

    /// Poll the sell venue's deposit history until a credited deposit of at
    /// least `expected * (1 - tolerance)` appears, the timeout lapses, or
    /// shutdown is signalled.
    async fn await_deposit(
        &self,
        venue: &Arc<dyn VenueGateway>,
        currency: &str,
        expected: Decimal,
    ) -> DepositOutcome {
        let floor = expected * (Decimal::ONE - self.settings.deposit_tolerance);
        let deadline = Instant::now() + self.settings.deposit_timeout;
        let mut shutdown = self.shutdown.clone();
        let mut ticker = tokio::time::interval(self.settings.deposit_poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if Instant::now() >= deadline {
                        return DepositOutcome::TimedOut;
                    }
                    match venue.recent_deposits(currency).await {
                        Ok(deposits) => {
                            let credited = deposits.iter().find(|d| {
                                d.status == DepositStatus::Ok && d.amount >= floor
                            });
                            if let Some(deposit) = credited {
                                info!(
                                    venue = %venue.id(),
                                    amount = %deposit.amount,
                                    "deposit credited"
                                );
                                return DepositOutcome::Credited(deposit.amount);
                            }
                        }
                        Err(err) => {
                            // Transient history failures just mean another poll.
                            warn!(venue = %venue.id(), %err, "deposit history unavailable");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender is treated as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        return DepositOutcome::Interrupted;
                    }
                }
            }
        }
    }
}

enum DepositOutcome {
    Credited(Decimal),
    TimedOut,
    Interrupted,
}
