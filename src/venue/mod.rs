//! Venue gateways and per-venue configuration.
//!
//! This module covers:
//! - Venue and pair types, fee schedules and transfer estimates
//! - The [`gateway::VenueGateway`] capability interface
//! - A REST-backed gateway and a mock gateway for tests
//! - Central per-venue rate limiting
//! - Explicit venue registration at startup

pub mod gateway;
pub mod limiter;
pub mod mock;
pub mod registry;
pub mod rest;
pub mod types;

pub use gateway::VenueGateway;
pub use limiter::{RateLimiter, Throttled};
pub use mock::MockVenue;
pub use registry::VenueRegistry;
pub use rest::RestVenue;
pub use types::{
    DepositAddress, DepositRecord, DepositStatus, OrderFill, OrderStatus, Pair, Side, VenueId,
    VenueProfile, WithdrawalId,
};
