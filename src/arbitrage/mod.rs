//! Opportunity detection: pure scoring of quotes into ranked opportunities.

pub mod cross;
pub mod cyclic;
pub mod types;

pub use cross::{rank, score_cross_venue};
pub use cyclic::{build_triangles, score_cycles, Cycle, CycleLeg};
pub use types::{CostModel, Leg, Opportunity, OpportunityKind};
