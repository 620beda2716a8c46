//! In-process backends for tests. Every store operation runs under one write
//! lock, so each call is atomic the same way a Postgres transaction is. The
//! server always runs on the Postgres and Redis backends.
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tripmatch_core::cache::Cache;
use tripmatch_core::events::EventSink;
use tripmatch_core::identity::{Host, HostProfile, HostStatus, IdentityResolver};
use tripmatch_core::matching::{Match, MatchInsert, MatchStatus, ReceivedMatch};
use tripmatch_core::repository::{
    CascadeOutcome, CascadeRepository, MatchRepository, TripCancellation, TripRepository,
};
use tripmatch_core::search::{Page, TripSearch};
use tripmatch_core::trip::{NewTrip, Trip, TripStatus};
use tripmatch_core::{CoreResult, HostId, MatchId, TripId};
use tripmatch_shared::{DomainEvent, EventType};

#[derive(Default)]
struct TravelTables {
    trips: BTreeMap<TripId, Trip>,
    matches: BTreeMap<MatchId, Match>,
    next_trip_id: TripId,
    next_match_id: MatchId,
}

impl TravelTables {
    fn cancel_live_matches(&mut self, trip_ids: &[TripId]) -> Vec<Match> {
        let mut cancelled = Vec::new();
        for m in self.matches.values_mut() {
            if m.status.is_live() && trip_ids.iter().any(|id| m.touches(*id)) {
                m.set_status(MatchStatus::Cancelled);
                cancelled.push(m.clone());
            }
        }
        cancelled
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

fn newest_first_trips(trips: &mut [Trip]) {
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn newest_first_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Trip and match tables behind a single lock
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<TravelTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    // host approval is not tracked here; the registry checks it before inserting
    async fn create_trip(&self, host_id: HostId, trip: &NewTrip) -> CoreResult<Option<Trip>> {
        let mut tables = self.tables.write().await;
        tables.next_trip_id += 1;
        let now = Utc::now();
        let stored = Trip {
            id: tables.next_trip_id,
            host_id,
            from_country: trip.from_country.clone(),
            from_state: trip.from_state.clone(),
            from_city: trip.from_city.clone(),
            to_country: trip.to_country.clone(),
            to_city: trip.to_city.clone(),
            travel_date: trip.travel_date,
            departure_time: trip.departure_time,
            arrival_date: trip.arrival_date,
            arrival_time: trip.arrival_time,
            airline: trip.airline.clone(),
            flight_number: trip.flight_number.clone(),
            age: trip.age,
            languages: trip.languages.clone(),
            status: TripStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.trips.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn get_trip(&self, id: TripId) -> CoreResult<Option<Trip>> {
        Ok(self.tables.read().await.trips.get(&id).cloned())
    }

    async fn search_trips(&self, query: &TripSearch, page: Page) -> CoreResult<Vec<Trip>> {
        let tables = self.tables.read().await;
        // BTreeMap iteration is id-ascending; the stable sort keeps that as tiebreak
        let mut found: Vec<Trip> = tables
            .trips
            .values()
            .filter(|t| {
                t.is_active()
                    && t.from_country == query.from_country
                    && t.to_country == query.to_country
                    && t.travel_date == query.travel_date
            })
            .cloned()
            .collect();
        found.sort_by_key(|t| t.travel_date);
        Ok(paginate(found, page))
    }

    async fn browse_trips(&self, from: NaiveDate, to: NaiveDate, page: Page) -> CoreResult<Vec<Trip>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Trip> = tables
            .trips
            .values()
            .filter(|t| t.is_active() && t.travel_date >= from && t.travel_date <= to)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.travel_date);
        Ok(paginate(found, page))
    }

    async fn list_host_trips(&self, host_id: HostId) -> CoreResult<Vec<Trip>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Trip> = tables
            .trips
            .values()
            .filter(|t| t.host_id == host_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.travel_date.cmp(&a.travel_date).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn list_trips(&self, status: Option<TripStatus>, page: Page) -> CoreResult<Vec<Trip>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Trip> = tables
            .trips
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        newest_first_trips(&mut found);
        Ok(paginate(found, page))
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn create_match(&self, trip_id: TripId, matched_trip_id: TripId) -> CoreResult<MatchInsert> {
        let mut tables = self.tables.write().await;

        let both_active = [trip_id, matched_trip_id]
            .iter()
            .all(|id| tables.trips.get(id).is_some_and(Trip::is_active));
        if trip_id == matched_trip_id || !both_active {
            return Ok(MatchInsert::TripUnavailable);
        }

        let duplicate = tables
            .matches
            .values()
            .any(|m| m.trip_id == trip_id && m.matched_trip_id == matched_trip_id);
        if duplicate {
            return Ok(MatchInsert::Duplicate);
        }

        tables.next_match_id += 1;
        let now = Utc::now();
        let created = Match {
            id: tables.next_match_id,
            trip_id,
            matched_trip_id,
            status: MatchStatus::Pending,
            consent_given: false,
            created_at: now,
            updated_at: now,
        };
        tables.matches.insert(created.id, created.clone());
        Ok(MatchInsert::Created(created))
    }

    async fn get_match(&self, id: MatchId) -> CoreResult<Option<Match>> {
        Ok(self.tables.read().await.matches.get(&id).cloned())
    }

    async fn find_pair(&self, trip_id: TripId, matched_trip_id: TripId) -> CoreResult<Option<Match>> {
        let tables = self.tables.read().await;
        Ok(tables
            .matches
            .values()
            .find(|m| m.trip_id == trip_id && m.matched_trip_id == matched_trip_id)
            .cloned())
    }

    async fn transition_match(
        &self,
        id: MatchId,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> CoreResult<Option<Match>> {
        let mut tables = self.tables.write().await;
        match tables.matches.get_mut(&id) {
            Some(m) if from.contains(&m.status) => {
                m.set_status(to);
                Ok(Some(m.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_received(&self, host_id: HostId) -> CoreResult<Vec<ReceivedMatch>> {
        let tables = self.tables.read().await;
        let mut pending: Vec<Match> = tables
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Pending)
            .cloned()
            .collect();
        newest_first_matches(&mut pending);

        Ok(pending
            .into_iter()
            .filter_map(|m| {
                let receiver_trip = tables.trips.get(&m.matched_trip_id)?.clone();
                let requester_trip = tables.trips.get(&m.trip_id)?.clone();
                (receiver_trip.host_id == host_id && requester_trip.host_id != host_id).then(|| {
                    ReceivedMatch {
                        travel_match: m,
                        receiver_trip,
                        requester_trip,
                    }
                })
            })
            .collect())
    }

    async fn list_for_trips(&self, trip_ids: &[TripId]) -> CoreResult<Vec<Match>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Match> = tables
            .matches
            .values()
            .filter(|m| trip_ids.iter().any(|id| m.touches(*id)))
            .cloned()
            .collect();
        newest_first_matches(&mut found);
        Ok(found)
    }

    async fn list_matches(&self, status: Option<MatchStatus>, page: Page) -> CoreResult<Vec<Match>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Match> = tables
            .matches
            .values()
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect();
        newest_first_matches(&mut found);
        Ok(paginate(found, page))
    }
}

#[async_trait]
impl CascadeRepository for MemoryStore {
    async fn cancel_trip(&self, trip_id: TripId) -> CoreResult<TripCancellation> {
        let mut tables = self.tables.write().await;
        let trip = match tables.trips.get_mut(&trip_id) {
            None => return Ok(TripCancellation::NotFound),
            Some(t) if t.status == TripStatus::Cancelled => return Ok(TripCancellation::AlreadyCancelled),
            Some(t) => {
                t.status = TripStatus::Cancelled;
                t.updated_at = Utc::now();
                t.clone()
            }
        };
        let cancelled_matches = tables.cancel_live_matches(&[trip_id]);

        Ok(TripCancellation::Cancelled(CascadeOutcome {
            cancelled_trips: vec![trip],
            cancelled_matches,
        }))
    }

    async fn cancel_trip_matches(&self, trip_id: TripId) -> CoreResult<Vec<Match>> {
        Ok(self.tables.write().await.cancel_live_matches(&[trip_id]))
    }

    async fn cancel_host_trips(&self, host_id: HostId) -> CoreResult<CascadeOutcome> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut cancelled_trips = Vec::new();
        for trip in tables.trips.values_mut() {
            if trip.host_id == host_id && trip.is_active() {
                trip.status = TripStatus::Cancelled;
                trip.updated_at = now;
                cancelled_trips.push(trip.clone());
            }
        }
        let trip_ids: Vec<TripId> = cancelled_trips.iter().map(|t| t.id).collect();
        let cancelled_matches = tables.cancel_live_matches(&trip_ids);

        Ok(CascadeOutcome {
            cancelled_trips,
            cancelled_matches,
        })
    }
}

/// TTL-aware map standing in for Redis
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (serde_json::Value, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.ok().flatten().is_some()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CoreResult<Option<serde_json::Value>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &serde_json::Value, ttl_seconds: u64) -> CoreResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.clone(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> CoreResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

/// Host records keyed by id
#[derive(Clone, Default)]
pub struct MemoryHostDirectory {
    hosts: Arc<RwLock<HashMap<HostId, Host>>>,
}

impl MemoryHostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, host: Host) {
        self.hosts.write().await.insert(host.id, host);
    }
}

#[async_trait]
impl IdentityResolver for MemoryHostDirectory {
    async fn resolve_host(&self, actor_id: &str) -> CoreResult<Option<Host>> {
        let hosts = self.hosts.read().await;
        Ok(hosts.values().find(|h| h.user_id == actor_id).cloned())
    }

    async fn find_host(&self, host_id: HostId) -> CoreResult<Option<Host>> {
        Ok(self.hosts.read().await.get(&host_id).cloned())
    }

    async fn public_profiles(&self, host_ids: &[HostId]) -> CoreResult<HashMap<HostId, HostProfile>> {
        let hosts = self.hosts.read().await;
        Ok(host_ids
            .iter()
            .filter_map(|id| hosts.get(id).map(|h| (h.id, h.profile())))
            .collect())
    }

    async fn block_host(&self, host_id: HostId, _reason: &str) -> CoreResult<()> {
        if let Some(host) = self.hosts.write().await.get_mut(&host_id) {
            host.status = HostStatus::Blocked;
        }
        Ok(())
    }
}

/// Keeps every emitted event for inspection
#[derive(Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn event_types(&self) -> Vec<EventType> {
        self.events.lock().await.iter().map(|e| e.event_type).collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: &DomainEvent) -> CoreResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
