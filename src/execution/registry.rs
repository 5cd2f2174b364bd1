//! In-flight execution slots.
//!
//! At most one execution may run per (asset, buy venue, sell venue) at a
//! time. Slots are held by RAII guards so a panicking or cancelled task
//! still releases its slot.

use std::sync::Arc;

use dashmap::DashSet;

use crate::arbitrage::Opportunity;
use crate::error::ExecutionError;
use crate::venue::types::VenueId;

/// Identity of an execution slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionKey {
    pub asset: String,
    pub buy_venue: VenueId,
    pub sell_venue: VenueId,
}

impl ExecutionKey {
    pub fn for_opportunity(opportunity: &Opportunity) -> Self {
        Self {
            asset: opportunity.asset().to_string(),
            buy_venue: opportunity.buy_venue().clone(),
            sell_venue: opportunity.sell_venue().clone(),
        }
    }
}

/// Shared set of occupied slots.
#[derive(Debug, Default)]
pub struct ExecutionSlots {
    occupied: Arc<DashSet<ExecutionKey>>,
}

impl ExecutionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `key`, or report who holds it.
    pub fn try_acquire(&self, key: ExecutionKey) -> Result<SlotGuard, ExecutionError> {
        if self.occupied.insert(key.clone()) {
            Ok(SlotGuard {
                occupied: Arc::clone(&self.occupied),
                key,
            })
        } else {
            Err(ExecutionError::SlotBusy {
                asset: key.asset,
                buy_venue: key.buy_venue,
                sell_venue: key.sell_venue,
            })
        }
    }

    /// Number of executions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.occupied.len()
    }
}

/// Releases its slot on drop.
#[derive(Debug)]
pub struct SlotGuard {
    occupied: Arc<DashSet<ExecutionKey>>,
    key: ExecutionKey,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.occupied.remove(&self.key);
    }
}
