//! Explicit venue registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::gateway::VenueGateway;
use super::types::{VenueId, VenueProfile};

/// Registry of connected venues, built once at startup.
///
/// Lookup is by id; iteration order is the ids' lexical order so scan
/// rounds are deterministic.
#[derive(Default)]
pub struct VenueRegistry {
    venues: BTreeMap<VenueId, Arc<dyn VenueGateway>>,
}

impl VenueRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a venue gateway. Replaces any previous gateway for the id.
    pub fn register(&mut self, gateway: Arc<dyn VenueGateway>) {
        let id = gateway.id().clone();
        info!(venue = %id, "Registered venue");
        self.venues.insert(id, gateway);
    }

    /// Gateway for a venue id.
    pub fn get(&self, id: &VenueId) -> Option<Arc<dyn VenueGateway>> {
        self.venues.get(id).cloned()
    }

    /// Profile for a venue id.
    pub fn profile(&self, id: &VenueId) -> Option<&VenueProfile> {
        self.venues.get(id).map(|g| g.profile())
    }

    /// All gateways, in lexical venue-id order.
    pub fn all(&self) -> Vec<Arc<dyn VenueGateway>> {
        self.venues.values().cloned().collect()
    }

    /// All profiles, in lexical venue-id order.
    pub fn profiles(&self) -> Vec<&VenueProfile> {
        self.venues.values().map(|g| g.profile()).collect()
    }

    /// Number of registered venues.
    pub fn len(&self) -> usize {
        self.venues.len()
    }

    /// Whether no venue is registered.
    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}
