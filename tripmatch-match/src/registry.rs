use chrono::{Days, NaiveDate};
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use tripmatch_core::cache::keys;
use tripmatch_core::identity::{HostProfile, IdentityResolver};
use tripmatch_core::repository::TripRepository;
use tripmatch_core::search::{Page, TripListing, TripSearch};
use tripmatch_core::trip::{Trip, TripDraft, TripStatus};
use tripmatch_core::TripId;
use tripmatch_shared::{Actor, DomainEvent, EntityRef, EventType, Location};

use crate::cascade::CascadeInvalidator;
use crate::effects::SideEffects;
use crate::error::{TravelError, TravelResult};
use crate::ledger::MatchLedger;
use crate::views::{CascadeSummary, MyTrip};

/// Owns trips: creation by approved hosts, cancellation, and the public reads
#[derive(Clone)]
pub struct TripRegistry {
    trips: Arc<dyn TripRepository>,
    identity: Arc<dyn IdentityResolver>,
    ledger: MatchLedger,
    cascade: CascadeInvalidator,
    effects: SideEffects,
    public_ttl_seconds: u64,
}

impl TripRegistry {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        identity: Arc<dyn IdentityResolver>,
        ledger: MatchLedger,
        cascade: CascadeInvalidator,
        effects: SideEffects,
    ) -> Self {
        Self {
            trips,
            identity,
            ledger,
            cascade,
            effects,
            public_ttl_seconds: 60,
        }
    }

    pub fn with_public_ttl(mut self, ttl_seconds: u64) -> Self {
        self.public_ttl_seconds = ttl_seconds;
        self
    }

    /// Publish a trip for the acting host. The host must be approved.
    pub async fn create(&self, actor_id: &str, draft: TripDraft) -> TravelResult<Trip> {
        let host = self
            .identity
            .resolve_host(actor_id)
            .await?
            .filter(|h| h.is_approved())
            .ok_or(TravelError::HostNotApproved)?;

        let new_trip = draft.validate()?;
        // the host may have been blocked since it was resolved
        let trip = self
            .trips
            .create_trip(host.id, &new_trip)
            .await?
            .ok_or(TravelError::HostNotApproved)?;
        info!("Trip {} created by host {}", trip.id, host.id);

        self.effects
            .invalidate(&[keys::PUBLIC_BROWSE, keys::PUBLIC_SEARCH])
            .await;
        self.effects
            .emit(
                DomainEvent::new(EventType::TravelTripCreated, Actor::host(actor_id, host.id))
                    .entity(EntityRef::trip(trip.id))
                    .location(Location {
                        country: Some(trip.from_country.clone()),
                        state: trip.from_state.clone(),
                        city: Some(trip.from_city.clone()),
                    })
                    .metadata(json!({
                        "to_country": trip.to_country,
                        "to_city": trip.to_city,
                        "travel_date": trip.travel_date,
                    })),
            )
            .await;

        Ok(trip)
    }

    /// Administrative cancel of one trip and its live matches
    pub async fn cancel(&self, admin: &Actor, trip_id: TripId) -> TravelResult<CascadeSummary> {
        self.cascade.cancel_trip(admin, trip_id).await
    }

    /// One page of active trips on the exact route and date, oldest date first
    pub async fn search(&self, query: &TripSearch, page: Page) -> TravelResult<Vec<TripListing>> {
        let key = format!(
            "{}{}:{}:{}:{}:{}",
            keys::PUBLIC_SEARCH,
            query.from_country,
            query.to_country,
            query.travel_date,
            page.page,
            page.limit
        );

        let listings = match self.effects.cached::<Vec<TripListing>>(&key).await {
            Some(hit) => hit,
            None => {
                let read_at = self.effects.generation();
                let trips = self.trips.search_trips(query, page).await?;
                let listings = self.enrich(&trips).await?;
                self.effects
                    .remember(&key, &listings, self.public_ttl_seconds, read_at)
                    .await;
                listings
            }
        };

        self.effects
            .emit(
                DomainEvent::new(EventType::TravelTripSearched, Actor::anonymous()).metadata(json!({
                    "from_country": query.from_country,
                    "to_country": query.to_country,
                    "date": query.travel_date,
                    "page": page.page,
                    "results": listings.len(),
                })),
            )
            .await;

        Ok(listings)
    }

    /// Every matching trip, fetched one page at a time as the stream is polled.
    /// Each call starts over from the first page.
    pub fn search_stream(
        &self,
        query: TripSearch,
        page_size: u32,
    ) -> impl Stream<Item = TravelResult<TripListing>> + Send + 'static {
        let registry = self.clone();
        let first = Page::new(Some(1), Some(page_size), page_size, page_size);

        let pages = stream::unfold(Some(first), move |cursor| {
            let registry = registry.clone();
            let query = query.clone();
            async move {
                let page = cursor?;
                match registry.search_page_uncached(&query, page).await {
                    Ok(listings) => {
                        let next = (listings.len() as u32 == page.limit).then(|| page.next());
                        Some((Ok(listings), next))
                    }
                    Err(e) => Some((Err(e), None)),
                }
            }
        });

        pages.flat_map(|batch| {
            let items: Vec<TravelResult<TripListing>> = match batch {
                Ok(listings) => listings.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
    }

    /// Active trips departing in `[today, today + horizon_days]`
    pub async fn browse_window(
        &self,
        today: NaiveDate,
        horizon_days: u32,
        page: Page,
    ) -> TravelResult<Vec<TripListing>> {
        let until = today
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        let key = format!(
            "{}{}:{}:{}:{}",
            keys::PUBLIC_BROWSE,
            today,
            horizon_days,
            page.page,
            page.limit
        );

        if let Some(hit) = self.effects.cached::<Vec<TripListing>>(&key).await {
            return Ok(hit);
        }

        let read_at = self.effects.generation();
        let trips = self.trips.browse_trips(today, until, page).await?;
        let listings = self.enrich(&trips).await?;
        self.effects
            .remember(&key, &listings, self.public_ttl_seconds, read_at)
            .await;
        Ok(listings)
    }

    /// The actor's trips in any status, each with its matches in both directions.
    /// An actor without a host record simply has no trips.
    pub async fn my_trips(&self, actor_id: &str) -> TravelResult<Vec<MyTrip>> {
        let Some(host) = self.identity.resolve_host(actor_id).await? else {
            return Ok(Vec::new());
        };

        let trips = self.trips.list_host_trips(host.id).await?;
        let trip_ids: Vec<TripId> = trips.iter().map(|t| t.id).collect();
        let matches = self.ledger.for_trips(&trip_ids).await?;

        Ok(trips.iter().map(|trip| MyTrip::new(trip, &matches)).collect())
    }

    /// Public view of a single active trip
    pub async fn preview(&self, trip_id: TripId) -> TravelResult<TripListing> {
        let trip = self
            .trips
            .get_trip(trip_id)
            .await?
            .filter(Trip::is_active)
            .ok_or(TravelError::TripNotFound)?;

        let mut profiles = self.identity.public_profiles(&[trip.host_id]).await?;
        let listing = TripListing::new(&trip, profiles.remove(&trip.host_id));

        self.effects
            .emit(
                DomainEvent::new(EventType::TravelTripViewed, Actor::anonymous())
                    .entity(EntityRef::trip(trip.id))
                    .location(Location {
                        country: Some(trip.from_country.clone()),
                        state: None,
                        city: Some(trip.from_city.clone()),
                    }),
            )
            .await;

        Ok(listing)
    }

    pub async fn admin_list_trips(&self, status: Option<TripStatus>, page: Page) -> TravelResult<Vec<Trip>> {
        Ok(self.trips.list_trips(status, page).await?)
    }

    async fn search_page_uncached(&self, query: &TripSearch, page: Page) -> TravelResult<Vec<TripListing>> {
        let trips = self.trips.search_trips(query, page).await?;
        self.enrich(&trips).await
    }

    async fn enrich(&self, trips: &[Trip]) -> TravelResult<Vec<TripListing>> {
        let mut host_ids: Vec<_> = trips.iter().map(|t| t.host_id).collect();
        host_ids.sort_unstable();
        host_ids.dedup();

        let profiles: HashMap<_, HostProfile> = if host_ids.is_empty() {
            HashMap::new()
        } else {
            self.identity.public_profiles(&host_ids).await?
        };

        Ok(trips
            .iter()
            .map(|trip| TripListing::new(trip, profiles.get(&trip.host_id).cloned()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mumbai_to_miami, Fixture};
    use crate::views::MatchState;
    use futures_util::TryStreamExt;
    use serde_json::json;
    use tripmatch_core::identity::HostStatus;
    use tripmatch_core::matching::MatchAction;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn in_to_us(day: &str) -> TripSearch {
        TripSearch {
            from_country: "IN".into(),
            to_country: "US".into(),
            travel_date: date(day),
        }
    }

    #[tokio::test]
    async fn test_create_requires_approved_host() {
        let fx = Fixture::new();
        fx.host(1, "user-p", HostStatus::Pending).await;
        let registry = &fx.services.registry;

        let err = registry.create("user-p", mumbai_to_miami("2025-06-01")).await.unwrap_err();
        assert!(matches!(err, TravelError::HostNotApproved));
        let err = registry.create("nobody", mumbai_to_miami("2025-06-01")).await.unwrap_err();
        assert!(matches!(err, TravelError::HostNotApproved));
    }

    #[tokio::test]
    async fn test_create_refused_when_host_blocked_before_insert() {
        let fx = Fixture::with_host_blocked_at_insert();
        fx.approved_host(1, "user-x").await;

        let err = fx
            .services
            .registry
            .create("user-x", mumbai_to_miami("2025-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, TravelError::HostNotApproved));
        assert!(fx.store.list_host_trips(1).await.unwrap().is_empty());
        assert!(fx.sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        let registry = &fx.services.registry;

        let mut missing = mumbai_to_miami("2025-06-01");
        missing.from_city = None;
        let err = registry.create("user-x", missing).await.unwrap_err();
        assert!(matches!(err, TravelError::Validation(_)));

        let err = registry
            .create("user-x", mumbai_to_miami("2025-06-01").languages(json!("Hindi")))
            .await
            .unwrap_err();
        assert!(matches!(err, TravelError::LanguagesType));

        let trip = registry
            .create("user-x", mumbai_to_miami("2025-06-01").languages(json!(["Hindi"])))
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Active);
        assert_eq!(trip.host_id, 1);
    }

    #[tokio::test]
    async fn test_search_matches_exact_date_only() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        fx.approved_host(2, "user-y").await;
        fx.trip("user-x", "2025-06-01").await;
        let y = fx.trip("user-y", "2025-06-01").await;
        let later = fx.trip("user-y", "2025-06-02").await;

        let page = Page::new(None, None, 10, 50);
        let results = fx.services.registry.search(&in_to_us("2025-06-01"), page).await.unwrap();
        let ids: Vec<_> = results.iter().map(|l| l.id).collect();
        assert!(ids.contains(&y.id));
        assert!(!ids.contains(&later.id));

        let listing = results.iter().find(|l| l.id == y.id).unwrap();
        assert_eq!(listing.destination, "Miami, US");
        assert_eq!(listing.host.as_ref().unwrap().full_name, "Host 2");
        assert!(fx.sink.event_types().await.contains(&EventType::TravelTripSearched));
    }

    #[tokio::test]
    async fn test_search_cache_is_dropped_on_new_trip() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        fx.trip("user-x", "2025-06-01").await;
        let registry = &fx.services.registry;
        let page = Page::new(None, None, 10, 50);

        assert_eq!(registry.search(&in_to_us("2025-06-01"), page).await.unwrap().len(), 1);
        fx.trip("user-x", "2025-06-01").await;
        assert_eq!(registry.search(&in_to_us("2025-06-01"), page).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_stream_walks_every_page() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        for _ in 0..5 {
            fx.trip("user-x", "2025-06-01").await;
        }
        fx.trip("user-x", "2025-06-02").await;

        let stream = fx.services.registry.search_stream(in_to_us("2025-06-01"), 2);
        let all: Vec<TripListing> = stream.try_collect().await.unwrap();
        assert_eq!(all.iter().map(|l| l.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        // a fresh stream starts from the top again
        let again: Vec<TripListing> = fx
            .services
            .registry
            .search_stream(in_to_us("2025-06-01"), 10)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(again.len(), 5);
    }

    #[tokio::test]
    async fn test_browse_window_bounds_are_inclusive() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        let before = fx.trip("user-x", "2025-05-31").await;
        let today = fx.trip("user-x", "2025-06-01").await;
        let edge = fx.trip("user-x", "2025-07-01").await;
        let beyond = fx.trip("user-x", "2025-07-02").await;

        let page = Page::new(None, None, 10, 10);
        let ids: Vec<_> = fx
            .services
            .registry
            .browse_window(date("2025-06-01"), 30, page)
            .await
            .unwrap()
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![today.id, edge.id]);
        assert!(!ids.contains(&before.id) && !ids.contains(&beyond.id));
    }

    #[tokio::test]
    async fn test_my_trips_match_state() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        fx.approved_host(2, "user-y").await;
        let connected = fx.trip("user-x", "2025-06-03").await;
        let waiting = fx.trip("user-x", "2025-06-02").await;
        let idle = fx.trip("user-x", "2025-06-01").await;
        let y = fx.trip("user-y", "2025-06-01").await;
        let coordinator = &fx.services.coordinator;

        let m = coordinator.request_match("user-y", y.id, connected.id).await.unwrap();
        coordinator
            .respond_match("user-x", m.id, MatchAction::Accept)
            .await
            .unwrap();
        coordinator.request_match("user-x", waiting.id, y.id).await.unwrap();

        let mine = fx.services.registry.my_trips("user-x").await.unwrap();
        let states: Vec<_> = mine.iter().map(|t| (t.id, t.match_state)).collect();
        assert_eq!(
            states,
            vec![
                (connected.id, MatchState::Connected),
                (waiting.id, MatchState::Pending),
                (idle.id, MatchState::None),
            ]
        );
        assert_eq!(mine[0].received_matches[0].other_trip_id, y.id);
        assert_eq!(mine[1].sent_matches[0].other_trip_id, y.id);

        assert!(fx.services.registry.my_trips("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_hides_cancelled_trips() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        let trip = fx.trip("user-x", "2025-06-01").await;
        let registry = &fx.services.registry;

        let listing = registry.preview(trip.id).await.unwrap();
        assert_eq!(listing.id, trip.id);

        let events = fx.sink.events().await;
        let viewed = events
            .iter()
            .find(|e| e.event_type == EventType::TravelTripViewed)
            .unwrap();
        // views are reported at the trip's origin
        let location = viewed.location.as_ref().unwrap();
        assert_eq!(location.country.as_deref(), Some("IN"));
        assert_eq!(location.city.as_deref(), Some("Mumbai"));
        assert_eq!(location.state, None);

        registry.cancel(&Actor::admin("admin-1"), trip.id).await.unwrap();
        assert!(matches!(registry.preview(trip.id).await, Err(TravelError::TripNotFound)));
        assert!(matches!(registry.preview(999).await, Err(TravelError::TripNotFound)));
    }

    #[tokio::test]
    async fn test_admin_listing_filters_by_status() {
        let fx = Fixture::new();
        fx.approved_host(1, "user-x").await;
        let kept = fx.trip("user-x", "2025-06-01").await;
        let dropped = fx.trip("user-x", "2025-06-01").await;
        fx.services
            .registry
            .cancel(&Actor::admin("admin-1"), dropped.id)
            .await
            .unwrap();

        let page = Page::new(None, None, 50, 50);
        let registry = &fx.services.registry;
        assert_eq!(registry.admin_list_trips(None, page).await.unwrap().len(), 2);
        let active = registry
            .admin_list_trips(Some(TripStatus::Active), page)
            .await
            .unwrap();
        assert_eq!(active.iter().map(|t| t.id).collect::<Vec<_>>(), vec![kept.id]);
    }
}
