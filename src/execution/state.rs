//! Execution saga state and the per-execution record.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::arbitrage::Opportunity;
use crate::venue::types::{OrderFill, Pair, VenueId, WithdrawalId};

/// Saga states. Transitions are append-only: an execution never moves
/// backwards, and `Completed` / `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Created,
    BalanceChecked,
    FirstLegFilled,
    Transferring,
    DepositConfirmed,
    SecondLegFilled,
    Completed,
    CompensationAttempted,
    Failed,
}

impl ExecutionState {
    /// Whether the execution can move from `self` to `next`.
    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        match (self, next) {
            (Created, BalanceChecked) => true,
            (BalanceChecked, FirstLegFilled) => true,
            // Cyclic executions skip the transfer stage.
            (FirstLegFilled, Transferring) | (FirstLegFilled, SecondLegFilled) => true,
            (Transferring, DepositConfirmed) => true,
            (DepositConfirmed, SecondLegFilled) => true,
            (SecondLegFilled, Completed) => true,
            // Any non-terminal state may fail, optionally via compensation.
            (s, CompensationAttempted) if !s.is_terminal() && s != CompensationAttempted => true,
            (s, Failed) if !s.is_terminal() => true,
            _ => false,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Completed | ExecutionState::Failed)
    }
}

/// Why an execution ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FailureReason {
    InsufficientBalance,
    /// The balance query itself failed; funds may well be there.
    BalanceUnavailable,
    LegRejected { leg: usize },
    PartialFill { leg: usize },
    WithdrawalRejected,
    DepositTimeout,
    Interrupted,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::InsufficientBalance => write!(f, "insufficient_balance"),
            FailureReason::BalanceUnavailable => write!(f, "balance_unavailable"),
            FailureReason::LegRejected { leg } => write!(f, "leg_{leg}_rejected"),
            FailureReason::PartialFill { leg } => write!(f, "leg_{leg}_partial_fill"),
            FailureReason::WithdrawalRejected => write!(f, "withdrawal_rejected"),
            FailureReason::DepositTimeout => write!(f, "deposit_timeout"),
            FailureReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// A reversing order placed after a leg failed mid-saga.
#[derive(Debug, Clone, Serialize)]
pub struct CompensationRecord {
    /// Venue the reversing order was placed on.
    pub venue: VenueId,
    /// Pair sold back.
    pub pair: Pair,
    /// Base amount sold back.
    pub amount: Decimal,
    /// The fill, when the reversing order itself went through.
    pub fill: Option<OrderFill>,
}

impl CompensationRecord {
    /// Whether the reversing order filled.
    pub fn succeeded(&self) -> bool {
        self.fill.as_ref().is_some_and(|f| f.status.is_closed())
    }
}

/// Full audit record of one execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    /// The opportunity this execution acts on.
    pub opportunity: Opportunity,
    /// Current state.
    pub state: ExecutionState,
    /// Every state visited, in order, with timestamps.
    pub history: Vec<Transition>,
    /// Fills per leg, in leg order.
    pub fills: Vec<OrderFill>,
    /// Withdrawal handle, for cross-venue executions that reached it.
    pub withdrawal: Option<WithdrawalId>,
    /// Reversing order, when one was attempted.
    pub compensation: Option<CompensationRecord>,
    /// Populated when `state` is `Failed`.
    pub failure: Option<FailureReason>,
    /// Realized proceeds minus investment, once terminal and successful.
    pub actual_profit: Option<Decimal>,
    /// True when no real orders were placed.
    pub dry_run: bool,
}

/// One recorded state change.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub state: ExecutionState,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl Execution {
    /// Start a new record in `Created`.
    pub fn new(opportunity: Opportunity, dry_run: bool) -> Self {
        Self {
            opportunity,
            state: ExecutionState::Created,
            history: vec![Transition {
                state: ExecutionState::Created,
                at: OffsetDateTime::now_utc(),
            }],
            fills: Vec::new(),
            withdrawal: None,
            compensation: None,
            failure: None,
            actual_profit: None,
            dry_run,
        }
    }

    /// Record a state change. Illegal transitions are a logic bug and are
    /// rejected in debug builds; in release the record still appends so the
    /// audit trail shows what actually happened.
    pub fn transition(&mut self, next: ExecutionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.history.push(Transition {
            state: next,
            at: OffsetDateTime::now_utc(),
        });
    }

    /// Mark failed with a reason.
    pub fn fail(&mut self, reason: FailureReason) {
        self.failure = Some(reason);
        self.transition(ExecutionState::Failed);
    }

    /// Mark completed with realized proceeds.
    pub fn complete(&mut self, proceeds: Decimal) {
        self.actual_profit = Some(proceeds - self.opportunity.investment);
        self.transition(ExecutionState::Completed);
    }
}
