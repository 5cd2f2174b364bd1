//! Quote aggregation across venues.
//!
//! One aggregation round fans out a quote request to every connected venue,
//! bounds each request with a timeout, and returns whatever subset answered.

pub mod aggregator;
pub mod types;

pub use aggregator::aggregate_quotes;
pub use types::{Quote, QuoteSet};
