use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tripmatch_core::cache::keys;
use tripmatch_core::identity::{Host, IdentityResolver};
use tripmatch_core::matching::{Match, MatchAction, MatchStatus};
use tripmatch_core::repository::TripRepository;
use tripmatch_core::search::Page;
use tripmatch_core::trip::Trip;
use tripmatch_core::{HostId, MatchId, TripId};
use tripmatch_shared::{Actor, DomainEvent, EntityRef, EventType, Severity};

use crate::effects::SideEffects;
use crate::error::{TravelError, TravelResult};
use crate::ledger::MatchLedger;
use crate::views::{ReceivedRequest, TripSummary};

/// The request/accept/reject/cancel protocol between two hosts' trips.
///
/// Every action resolves the acting host, checks it against the trips on
/// both sides of the match and then writes through [`MatchLedger`], whose
/// guarded transition is what serializes racing callers. Cache eviction and
/// event emission follow the write and cannot undo it.
#[derive(Clone)]
pub struct MatchCoordinator {
    trips: Arc<dyn TripRepository>,
    identity: Arc<dyn IdentityResolver>,
    ledger: MatchLedger,
    effects: SideEffects,
    received_ttl_seconds: u64,
}

/// A match together with the trips on both ends
struct MatchContext {
    travel_match: Match,
    requester: Trip,
    receiver: Trip,
}

impl MatchCoordinator {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        identity: Arc<dyn IdentityResolver>,
        ledger: MatchLedger,
        effects: SideEffects,
    ) -> Self {
        Self {
            trips,
            identity,
            ledger,
            effects,
            received_ttl_seconds: 60,
        }
    }

    pub fn with_received_ttl(mut self, ttl_seconds: u64) -> Self {
        self.received_ttl_seconds = ttl_seconds;
        self
    }

    /// Ask to pair the actor's trip with another host's trip
    pub async fn request_match(
        &self,
        actor_id: &str,
        trip_id: TripId,
        matched_trip_id: TripId,
    ) -> TravelResult<Match> {
        if trip_id == matched_trip_id {
            return Err(TravelError::SelfMatch);
        }

        let host = self.resolve(actor_id).await?.ok_or(TravelError::NotOwner)?;

        let source = self
            .trips
            .get_trip(trip_id)
            .await?
            .filter(|t| t.is_owned_by(host.id))
            .ok_or(TravelError::NotOwner)?;
        let target = self
            .trips
            .get_trip(matched_trip_id)
            .await?
            .ok_or(TravelError::TripNotFound)?;
        if target.is_owned_by(host.id) {
            return Err(TravelError::SelfMatch);
        }

        // an existing row wins over trip state: rejected or cascaded pairs stay closed
        if self.ledger.find_pair(trip_id, matched_trip_id).await?.is_some() {
            return Err(TravelError::DuplicateMatch);
        }
        if !source.is_active() {
            return Err(TravelError::AlreadyCancelled { entity: "trip", id: trip_id });
        }
        if !target.is_active() {
            return Err(TravelError::TripNotFound);
        }

        let created = self.ledger.create(trip_id, matched_trip_id).await?;

        self.evict_received(&[source.host_id, target.host_id]).await;
        self.effects
            .emit(
                DomainEvent::new(EventType::TravelMatchRequested, Actor::host(actor_id, host.id))
                    .entity(EntityRef::travel_match(created.id))
                    .metadata(json!({
                        "trip_id": trip_id,
                        "matched_trip_id": matched_trip_id,
                    }))
                    .audit(Severity::Low),
            )
            .await;

        Ok(created)
    }

    /// Accept or reject a pending request. Only the receiving trip's host may answer.
    pub async fn respond_match(
        &self,
        actor_id: &str,
        match_id: MatchId,
        action: MatchAction,
    ) -> TravelResult<Match> {
        if action == MatchAction::Cancel {
            return Err(TravelError::Validation(
                "action must be accept or reject".to_string(),
            ));
        }

        let host = self.resolve(actor_id).await?.ok_or(TravelError::NotAuthorized)?;
        let ctx = self.load(match_id).await?.ok_or(TravelError::NotAuthorized)?;
        if !ctx.receiver.is_owned_by(host.id) {
            return Err(TravelError::NotAuthorized);
        }

        let updated = self.ledger.transition(&ctx.travel_match, action).await?;
        let event_type = match action {
            MatchAction::Accept => EventType::TravelMatchAccepted,
            _ => EventType::TravelMatchRejected,
        };
        self.after_transition(actor_id, host.id, &ctx, &updated, event_type).await;

        Ok(updated)
    }

    /// Withdraw from an accepted match. Either side may cancel.
    pub async fn cancel_match(&self, actor_id: &str, match_id: MatchId) -> TravelResult<Match> {
        let host = self.resolve(actor_id).await?.ok_or(TravelError::NotAuthorized)?;
        let ctx = self.load(match_id).await?.ok_or(TravelError::NotAuthorized)?;
        if !ctx.requester.is_owned_by(host.id) && !ctx.receiver.is_owned_by(host.id) {
            return Err(TravelError::NotAuthorized);
        }

        let updated = self.ledger.transition(&ctx.travel_match, MatchAction::Cancel).await?;
        self.after_transition(actor_id, host.id, &ctx, &updated, EventType::TravelMatchCancelled)
            .await;

        Ok(updated)
    }

    /// Pending requests addressed to the actor's trips, newest first
    pub async fn list_received(&self, actor_id: &str) -> TravelResult<Vec<ReceivedRequest>> {
        let Some(host) = self.resolve(actor_id).await? else {
            return Ok(Vec::new());
        };

        let key = keys::received(host.id);
        if let Some(hit) = self.effects.cached::<Vec<ReceivedRequest>>(&key).await {
            return Ok(hit);
        }

        let read_at = self.effects.generation();
        let received: Vec<_> = self
            .ledger
            .received(host.id)
            .await?
            .into_iter()
            .filter(|r| r.requester_trip.host_id != host.id)
            .collect();

        let mut requester_hosts: Vec<HostId> = received.iter().map(|r| r.requester_trip.host_id).collect();
        requester_hosts.sort_unstable();
        requester_hosts.dedup();
        let profiles = if requester_hosts.is_empty() {
            Default::default()
        } else {
            self.identity.public_profiles(&requester_hosts).await?
        };

        let requests: Vec<ReceivedRequest> = received
            .into_iter()
            .map(|r| ReceivedRequest {
                match_id: r.travel_match.id,
                status: r.travel_match.status,
                requested_at: r.travel_match.created_at,
                receiver_trip: TripSummary::from(&r.receiver_trip),
                requester_host: profiles.get(&r.requester_trip.host_id).cloned(),
                requester_trip: TripSummary::from(&r.requester_trip),
            })
            .collect();

        self.effects
            .remember(&key, &requests, self.received_ttl_seconds, read_at)
            .await;
        Ok(requests)
    }

    /// Administrative cancel of a live match. Terminal matches are left as they are.
    pub async fn admin_cancel_match(&self, admin: &Actor, match_id: MatchId) -> TravelResult<Match> {
        let current = self
            .ledger
            .get(match_id)
            .await?
            .ok_or(TravelError::MatchNotFound)?;
        let previous = current.status;
        let updated = self.ledger.force_cancel(&current).await?;

        self.effects.invalidate(&[keys::TRAVEL, keys::HOST]).await;
        self.effects
            .emit(
                DomainEvent::new(EventType::AdminCancelledMatch, admin.clone())
                    .entity(EntityRef::travel_match(match_id))
                    .metadata(json!({ "previous_status": previous }))
                    .audit(Severity::Medium),
            )
            .await;

        Ok(updated)
    }

    pub async fn admin_list_matches(&self, status: Option<MatchStatus>, page: Page) -> TravelResult<Vec<Match>> {
        self.ledger.list(status, page).await
    }

    async fn resolve(&self, actor_id: &str) -> TravelResult<Option<Host>> {
        Ok(self.identity.resolve_host(actor_id).await?)
    }

    async fn load(&self, match_id: MatchId) -> TravelResult<Option<MatchContext>> {
        let Some(travel_match) = self.ledger.get(match_id).await? else {
            return Ok(None);
        };
        let requester = self.trips.get_trip(travel_match.trip_id).await?;
        let receiver = self.trips.get_trip(travel_match.matched_trip_id).await?;

        Ok(requester.zip(receiver).map(|(requester, receiver)| MatchContext {
            travel_match,
            requester,
            receiver,
        }))
    }

    async fn after_transition(
        &self,
        actor_id: &str,
        host_id: HostId,
        ctx: &MatchContext,
        updated: &Match,
        event_type: EventType,
    ) {
        info!(
            "Match {} is now {} (host {})",
            updated.id, updated.status, host_id
        );
        self.evict_received(&[ctx.requester.host_id, ctx.receiver.host_id]).await;
        self.effects
            .emit(
                DomainEvent::new(event_type, Actor::host(actor_id, host_id))
                    .entity(EntityRef::travel_match(updated.id))
                    .metadata(json!({
                        "trip_id": ctx.travel_match.trip_id,
                        "matched_trip_id": ctx.travel_match.matched_trip_id,
                    })),
            )
            .await;
    }

    async fn evict_received(&self, host_ids: &[HostId]) {
        let stale: Vec<String> = host_ids.iter().map(|id| keys::received(*id)).collect();
        self.effects.evict(&stale).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use tripmatch_core::repository::MatchRepository;
    use tripmatch_shared::EventType;

    async fn two_hosts() -> (Fixture, Trip, Trip) {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        fx.approved_host(2, "user-y").await;
        let x = fx.trip("user-x", "2025-06-01").await;
        let y = fx.trip("user-y", "2025-06-01").await;
        (fx, x, y)
    }

    #[tokio::test]
    async fn test_request_accept_cancel_scenario() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;

        let requested = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        assert_eq!(requested.status, MatchStatus::Pending);

        let accepted = coordinator
            .respond_match("user-y", requested.id, MatchAction::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.status, MatchStatus::Accepted);
        assert!(accepted.consent_given);

        let cancelled = coordinator.cancel_match("user-x", requested.id).await.unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
        assert!(!cancelled.consent_given);

        let again = coordinator.cancel_match("user-x", requested.id).await.unwrap_err();
        assert!(matches!(again, TravelError::AlreadyCancelled { entity: "match", .. }));

        assert_eq!(
            fx.sink.event_types().await,
            vec![
                EventType::TravelTripCreated,
                EventType::TravelTripCreated,
                EventType::TravelMatchRequested,
                EventType::TravelMatchAccepted,
                EventType::TravelMatchCancelled,
            ]
        );
    }

    #[tokio::test]
    async fn test_protocol_holds_without_a_cache() {
        let fx = Fixture::without_cache();
        fx.approved_host(1, "user-x").await;
        fx.approved_host(2, "user-y").await;
        let x = fx.trip("user-x", "2025-06-01").await;
        let y = fx.trip("user-y", "2025-06-01").await;
        let later = fx.trip("user-y", "2025-06-02").await;
        let coordinator = &fx.services.coordinator;

        let found = fx
            .services
            .registry
            .search(
                &tripmatch_core::search::TripSearch {
                    from_country: "IN".into(),
                    to_country: "US".into(),
                    travel_date: y.travel_date,
                },
                Page::new(None, None, 10, 50),
            )
            .await
            .unwrap();
        let ids: Vec<TripId> = found.iter().map(|l| l.id).collect();
        assert!(ids.contains(&y.id) && !ids.contains(&later.id));

        let requested = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        assert_eq!(coordinator.list_received("user-y").await.unwrap().len(), 1);

        let accepted = coordinator
            .respond_match("user-y", requested.id, MatchAction::Accept)
            .await
            .unwrap();
        assert!(accepted.consent_given);
        assert!(coordinator.list_received("user-y").await.unwrap().is_empty());

        coordinator.cancel_match("user-x", requested.id).await.unwrap();
        let again = coordinator.cancel_match("user-x", requested.id).await.unwrap_err();
        assert!(matches!(again, TravelError::AlreadyCancelled { .. }));
    }

    #[tokio::test]
    async fn test_self_match_is_always_refused() {
        let (fx, x, _) = two_hosts().await;
        let coordinator = &fx.services.coordinator;

        // same id is refused before anything is looked up, even for strangers
        for actor in ["user-x", "user-y", "nobody"] {
            let err = coordinator.request_match(actor, x.id, x.id).await.unwrap_err();
            assert!(matches!(err, TravelError::SelfMatch));
        }

        let other_own_trip = fx.trip("user-x", "2025-06-01").await;
        let err = coordinator
            .request_match("user-x", x.id, other_own_trip.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TravelError::SelfMatch));
    }

    #[tokio::test]
    async fn test_request_from_foreign_or_missing_trip_is_not_owner() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;

        let err = coordinator.request_match("user-x", y.id, x.id).await.unwrap_err();
        assert!(matches!(err, TravelError::NotOwner));
        let err = coordinator.request_match("user-x", 999, y.id).await.unwrap_err();
        assert!(matches!(err, TravelError::NotOwner));
        let err = coordinator.request_match("nobody", x.id, y.id).await.unwrap_err();
        assert!(matches!(err, TravelError::NotOwner));
        let err = coordinator.request_match("user-x", x.id, 999).await.unwrap_err();
        assert!(matches!(err, TravelError::TripNotFound));
    }

    #[tokio::test]
    async fn test_duplicate_pair_refused_whatever_its_status() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;

        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        let err = coordinator.request_match("user-x", x.id, y.id).await.unwrap_err();
        assert!(matches!(err, TravelError::DuplicateMatch));

        coordinator
            .respond_match("user-y", m.id, MatchAction::Reject)
            .await
            .unwrap();
        let err = coordinator.request_match("user-x", x.id, y.id).await.unwrap_err();
        assert!(matches!(err, TravelError::DuplicateMatch));

        // the opposite direction is its own pair
        let reverse = coordinator.request_match("user-y", y.id, x.id).await.unwrap();
        assert_eq!(reverse.status, MatchStatus::Pending);
    }

    #[tokio::test]
    async fn test_request_against_cancelled_trips() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        let admin = Actor::admin("admin-1");
        let z = fx.trip("user-y", "2025-06-01").await;

        fx.services.registry.cancel(&admin, y.id).await.unwrap();
        let err = coordinator.request_match("user-x", x.id, y.id).await.unwrap_err();
        assert!(matches!(err, TravelError::TripNotFound));

        fx.services.registry.cancel(&admin, x.id).await.unwrap();
        let err = coordinator.request_match("user-x", x.id, z.id).await.unwrap_err();
        assert!(matches!(err, TravelError::AlreadyCancelled { entity: "trip", .. }));
    }

    #[tokio::test]
    async fn test_only_receiver_may_respond() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        fx.approved_host(3, "user-z").await;
        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();

        for actor in ["user-x", "user-z", "nobody"] {
            let err = coordinator
                .respond_match(actor, m.id, MatchAction::Accept)
                .await
                .unwrap_err();
            assert!(matches!(err, TravelError::NotAuthorized));
        }
        let err = coordinator
            .respond_match("user-y", 999, MatchAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, TravelError::NotAuthorized));

        let err = coordinator
            .respond_match("user-y", m.id, MatchAction::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TravelError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_needs_accepted_match_and_a_party() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        fx.approved_host(3, "user-z").await;
        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();

        let err = coordinator.cancel_match("user-x", m.id).await.unwrap_err();
        assert!(matches!(
            err,
            TravelError::InvalidTransition { from: MatchStatus::Pending, action: "cancel" }
        ));

        coordinator
            .respond_match("user-y", m.id, MatchAction::Accept)
            .await
            .unwrap();
        let err = coordinator.cancel_match("user-z", m.id).await.unwrap_err();
        assert!(matches!(err, TravelError::NotAuthorized));

        // the receiver may cancel too
        let cancelled = coordinator.cancel_match("user-y", m.id).await.unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_rejected_is_terminal() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        coordinator
            .respond_match("user-y", m.id, MatchAction::Reject)
            .await
            .unwrap();

        for action in [MatchAction::Accept, MatchAction::Reject] {
            let err = coordinator.respond_match("user-y", m.id, action).await.unwrap_err();
            assert!(matches!(
                err,
                TravelError::InvalidTransition { from: MatchStatus::Rejected, .. }
            ));
        }
        let err = coordinator.cancel_match("user-x", m.id).await.unwrap_err();
        assert!(matches!(err, TravelError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_exactly_one_wins() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = fx.services.coordinator.clone();
        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();

        let first = coordinator.clone();
        let second = coordinator.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.respond_match("user-y", m.id, MatchAction::Accept).await }),
            tokio::spawn(async move { second.respond_match("user-y", m.id, MatchAction::Accept).await }),
        );
        let results = [a.unwrap(), b.unwrap()];

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(
            loser,
            TravelError::InvalidTransition { from: MatchStatus::Accepted, .. }
        ));
    }

    #[tokio::test]
    async fn test_consent_only_on_accepted() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        fx.approved_host(3, "user-z").await;
        let z = fx.trip("user-z", "2025-06-01").await;

        let accepted = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        coordinator
            .respond_match("user-y", accepted.id, MatchAction::Accept)
            .await
            .unwrap();
        let rejected = coordinator.request_match("user-x", x.id, z.id).await.unwrap();
        coordinator
            .respond_match("user-z", rejected.id, MatchAction::Reject)
            .await
            .unwrap();
        coordinator.request_match("user-y", y.id, z.id).await.unwrap();

        let all = fx.store.list_for_trips(&[x.id, y.id, z.id]).await.unwrap();
        assert_eq!(all.len(), 3);
        for m in all {
            assert_eq!(m.consent_given, m.status == MatchStatus::Accepted, "match {}", m.id);
        }
    }

    #[tokio::test]
    async fn test_received_view_is_cached_and_evicted() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();

        let received = coordinator.list_received("user-y").await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].match_id, m.id);
        assert_eq!(received[0].requester_trip.id, x.id);
        assert_eq!(received[0].requester_host.as_ref().unwrap().id, 1);
        assert!(fx.cache.contains(&keys::received(2)).await);

        assert!(coordinator.list_received("user-x").await.unwrap().is_empty());
        assert!(coordinator.list_received("nobody").await.unwrap().is_empty());

        coordinator
            .respond_match("user-y", m.id, MatchAction::Accept)
            .await
            .unwrap();
        assert!(!fx.cache.contains(&keys::received(2)).await);
        assert!(coordinator.list_received("user-y").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_cache_and_sink_do_not_fail_transitions() {
        let fx = Fixture::with_broken_collaborators();
        fx.approved_host(1, "user-x").await;
        fx.approved_host(2, "user-y").await;
        let x = fx.trip("user-x", "2025-06-01").await;
        let y = fx.trip("user-y", "2025-06-01").await;
        let coordinator = &fx.services.coordinator;

        let m = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        assert_eq!(coordinator.list_received("user-y").await.unwrap().len(), 1);
        let accepted = coordinator
            .respond_match("user-y", m.id, MatchAction::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.status, MatchStatus::Accepted);

        let stored = fx.store.get_match(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Accepted);
    }

    #[tokio::test]
    async fn test_admin_cancel_match() {
        let (fx, x, y) = two_hosts().await;
        let coordinator = &fx.services.coordinator;
        let admin = Actor::admin("admin-1");

        let pending = coordinator.request_match("user-x", x.id, y.id).await.unwrap();
        let cancelled = coordinator.admin_cancel_match(&admin, pending.id).await.unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);

        let err = coordinator.admin_cancel_match(&admin, pending.id).await.unwrap_err();
        assert!(matches!(err, TravelError::AlreadyCancelled { .. }));
        let err = coordinator.admin_cancel_match(&admin, 999).await.unwrap_err();
        assert!(matches!(err, TravelError::MatchNotFound));

        let events = fx.sink.events().await;
        let audit = events
            .iter()
            .find(|e| e.event_type == EventType::AdminCancelledMatch)
            .unwrap();
        assert_eq!(audit.severity, Some(Severity::Medium));
        assert_eq!(audit.metadata["previous_status"], "pending");
    }
}
