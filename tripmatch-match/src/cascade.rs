use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tripmatch_core::cache::keys;
use tripmatch_core::identity::IdentityResolver;
use tripmatch_core::repository::{CascadeRepository, TripCancellation};
use tripmatch_core::{HostId, TripId};
use tripmatch_shared::{Actor, DomainEvent, EntityRef, EventType, Severity};

use crate::effects::SideEffects;
use crate::error::{TravelError, TravelResult};
use crate::views::CascadeSummary;

const DEFAULT_BLOCK_REASON: &str = "Blocked by admin";

/// Administrative cancellations that fan out from one trip or one host to
/// everything depending on it. Each data change commits as a single unit;
/// cache invalidation follows once it has.
#[derive(Clone)]
pub struct CascadeInvalidator {
    cascades: Arc<dyn CascadeRepository>,
    identity: Arc<dyn IdentityResolver>,
    effects: SideEffects,
}

impl CascadeInvalidator {
    pub fn new(
        cascades: Arc<dyn CascadeRepository>,
        identity: Arc<dyn IdentityResolver>,
        effects: SideEffects,
    ) -> Self {
        Self {
            cascades,
            identity,
            effects,
        }
    }

    /// Cancel every live match touching a trip. Safe to repeat: matches already
    /// in a terminal state are skipped, so a second run cancels nothing.
    pub async fn cascade_from_trip(&self, trip_id: TripId) -> TravelResult<usize> {
        let cancelled = self.cascades.cancel_trip_matches(trip_id).await?;
        if !cancelled.is_empty() {
            info!("Trip {} cascade cancelled {} matches", trip_id, cancelled.len());
            self.invalidate_all().await;
        }
        Ok(cancelled.len())
    }

    /// Cancel an active trip together with its live matches.
    /// Unlike the cascade, a repeated direct cancel is an error.
    pub async fn cancel_trip(&self, admin: &Actor, trip_id: TripId) -> TravelResult<CascadeSummary> {
        let outcome = match self.cascades.cancel_trip(trip_id).await? {
            TripCancellation::Cancelled(outcome) => outcome,
            TripCancellation::AlreadyCancelled => {
                return Err(TravelError::AlreadyCancelled { entity: "trip", id: trip_id })
            }
            TripCancellation::NotFound => return Err(TravelError::TripNotFound),
        };

        let summary = CascadeSummary {
            cancelled_trips: outcome.cancelled_trips.len(),
            cancelled_matches: outcome.cancelled_matches.len(),
        };

        self.invalidate_all().await;
        self.effects
            .emit(
                DomainEvent::new(EventType::AdminCancelledTrip, admin.clone())
                    .entity(EntityRef::trip(trip_id))
                    .metadata(json!({ "cancelled_matches": summary.cancelled_matches }))
                    .audit(Severity::High),
            )
            .await;

        Ok(summary)
    }

    /// Block a host, then cancel all of their active trips and every live match
    /// on those trips in one transaction. Re-running is harmless.
    pub async fn cascade_from_host_block(
        &self,
        admin: &Actor,
        host_id: HostId,
        reason: Option<&str>,
    ) -> TravelResult<CascadeSummary> {
        if self.identity.find_host(host_id).await?.is_none() {
            return Err(TravelError::HostNotFound(host_id));
        }

        let reason = reason.unwrap_or(DEFAULT_BLOCK_REASON);
        self.identity.block_host(host_id, reason).await?;

        let outcome = self.cascades.cancel_host_trips(host_id).await?;
        let summary = CascadeSummary {
            cancelled_trips: outcome.cancelled_trips.len(),
            cancelled_matches: outcome.cancelled_matches.len(),
        };
        info!(
            "Host {} blocked: {} trips, {} matches cancelled",
            host_id, summary.cancelled_trips, summary.cancelled_matches
        );

        self.invalidate_all().await;
        self.effects
            .emit(
                DomainEvent::new(EventType::AdminBlockedHost, admin.clone())
                    .entity(EntityRef::host(host_id))
                    .metadata(json!({
                        "reason": reason,
                        "cancelled_trips": summary.cancelled_trips,
                        "cancelled_matches": summary.cancelled_matches,
                    }))
                    .audit(Severity::Critical),
            )
            .await;

        Ok(summary)
    }

    async fn invalidate_all(&self) {
        self.effects
            .invalidate(&[keys::TRAVEL, keys::HOST, keys::ADMIN])
            .await;
    }
}
