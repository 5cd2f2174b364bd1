//! Cross-venue and cyclic crypto arbitrage engine.
//!
//! Scans a set of registered venues for two kinds of opportunity:
//!
//! - Cross-venue: the same pair quoted cheaper on one venue than another,
//!   net of taker fees, the withdrawal fee and the inter-venue transfer.
//! - Cyclic: a chain of trades on a single venue (e.g. USDT -> BTC -> ETH
//!   -> USDT) whose net yield exceeds 1.
//!
//! All money math uses [`rust_decimal::Decimal`]. Scoring is pure; every
//! side effect lives in the venue gateways and the execution orchestrator.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment and the venues file
//! - [`error`]: Unified error types
//! - [`venue`]: Gateway trait, REST/mock gateways, rate limiting, registry
//! - [`quotes`]: Concurrent quote fan-out
//! - [`arbitrage`]: Opportunity scoring
//! - [`execution`]: The execution saga
//! - [`scan`]: The scan loop
//! - [`notify`]: Outbound notifications
//! - [`api`]: HTTP API for health/metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod config;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod notify;
pub mod quotes;
pub mod scan;
pub mod utils;
pub mod venue;

pub use config::Config;
pub use error::{BotError, Result};
