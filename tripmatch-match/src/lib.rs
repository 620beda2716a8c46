pub mod cascade;
pub mod coordinator;
pub mod effects;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod views;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tripmatch_core::cache::Cache;
use tripmatch_core::events::EventSink;
use tripmatch_core::identity::IdentityResolver;
use tripmatch_core::repository::{CascadeRepository, MatchRepository, TripRepository};

pub use cascade::CascadeInvalidator;
pub use coordinator::MatchCoordinator;
pub use effects::SideEffects;
pub use error::{ErrorKind, TravelError, TravelResult};
pub use ledger::MatchLedger;
pub use registry::TripRegistry;
pub use views::{CascadeSummary, MatchState, MyTrip, ReceivedRequest, TripSummary};

/// The travel services wired over one set of repositories and collaborators
#[derive(Clone)]
pub struct TravelServices {
    pub registry: TripRegistry,
    pub coordinator: MatchCoordinator,
    pub cascade: CascadeInvalidator,
}

pub struct CacheTtls {
    pub public_seconds: u64,
    pub received_seconds: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            public_seconds: 60,
            received_seconds: 60,
        }
    }
}

impl TravelServices {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        matches: Arc<dyn MatchRepository>,
        cascades: Arc<dyn CascadeRepository>,
        identity: Arc<dyn IdentityResolver>,
        cache: Arc<dyn Cache>,
        events: Arc<dyn EventSink>,
        ttls: CacheTtls,
    ) -> Self {
        let effects = SideEffects::new(cache, events);
        let ledger = MatchLedger::new(matches);
        let cascade = CascadeInvalidator::new(cascades, identity.clone(), effects.clone());
        let registry = TripRegistry::new(
            trips.clone(),
            identity.clone(),
            ledger.clone(),
            cascade.clone(),
            effects.clone(),
        )
        .with_public_ttl(ttls.public_seconds);
        let coordinator = MatchCoordinator::new(trips, identity, ledger, effects)
            .with_received_ttl(ttls.received_seconds);

        Self {
            registry,
            coordinator,
            cascade,
        }
    }
}
