//! Services wired over the in-memory backends.
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tripmatch_core::cache::{Cache, NoopCache};
use tripmatch_core::events::EventSink;
use tripmatch_core::identity::{Host, HostStatus};
use tripmatch_core::repository::TripRepository;
use tripmatch_core::search::{Page, TripSearch};
use tripmatch_core::trip::{NewTrip, Trip, TripDraft, TripStatus};
use tripmatch_core::{CoreError, CoreResult, HostId, TripId};
use tripmatch_shared::DomainEvent;
use tripmatch_store::{MemoryCache, MemoryHostDirectory, MemoryStore, RecordingEventSink};

use crate::{CacheTtls, TravelServices};

pub struct Fixture {
    pub store: MemoryStore,
    pub cache: MemoryCache,
    pub hosts: MemoryHostDirectory,
    pub sink: RecordingEventSink,
    pub services: TravelServices,
}

impl Fixture {
    pub fn new() -> Self {
        let cache = MemoryCache::new();
        let sink = RecordingEventSink::new();
        Self::build(cache.clone(), sink.clone(), Arc::new(cache), Arc::new(sink), false)
    }

    /// Cache and event sink that fail every call
    pub fn with_broken_collaborators() -> Self {
        Self::build(
            MemoryCache::new(),
            RecordingEventSink::new(),
            Arc::new(BrokenCache),
            Arc::new(BrokenSink),
            false,
        )
    }

    /// No cache at all; every read goes to the store
    pub fn without_cache() -> Self {
        let sink = RecordingEventSink::new();
        Self::build(MemoryCache::new(), sink.clone(), Arc::new(NoopCache), Arc::new(sink), false)
    }

    /// Trip inserts find the host blocked, as after a block that landed
    /// between host resolution and the insert
    pub fn with_host_blocked_at_insert() -> Self {
        let cache = MemoryCache::new();
        let sink = RecordingEventSink::new();
        Self::build(cache.clone(), sink.clone(), Arc::new(cache), Arc::new(sink), true)
    }

    fn build(
        cache: MemoryCache,
        sink: RecordingEventSink,
        cache_impl: Arc<dyn Cache>,
        sink_impl: Arc<dyn EventSink>,
        refuse_trip_inserts: bool,
    ) -> Self {
        let store = MemoryStore::new();
        let hosts = MemoryHostDirectory::new();
        let trips: Arc<dyn TripRepository> = if refuse_trip_inserts {
            Arc::new(RefusingTrips(store.clone()))
        } else {
            Arc::new(store.clone())
        };
        let services = TravelServices::new(
            trips,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(hosts.clone()),
            cache_impl,
            sink_impl,
            CacheTtls::default(),
        );

        Self {
            store,
            cache,
            hosts,
            sink,
            services,
        }
    }

    pub async fn host(&self, id: HostId, user_id: &str, status: HostStatus) {
        self.hosts
            .insert(Host {
                id,
                user_id: user_id.to_string(),
                status,
                full_name: format!("Host {}", id),
                country: Some("IN".to_string()),
                city: Some("Mumbai".to_string()),
                email: Some(format!("{}@example.com", user_id).into()),
                profile_image: None,
                verified: true,
            })
            .await;
    }

    pub async fn approved_host(&self, id: HostId, user_id: &str) {
        self.host(id, user_id, HostStatus::Approved).await;
    }

    /// Mumbai to Miami on `date`, created through the registry
    pub async fn trip(&self, user_id: &str, date: &str) -> Trip {
        self.services
            .registry
            .create(user_id, mumbai_to_miami(date))
            .await
            .unwrap()
    }
}

pub fn mumbai_to_miami(date: &str) -> TripDraft {
    TripDraft::new()
        .route("IN", "Mumbai", "US", "Miami")
        .departing(date, "09:30")
}

/// Delegates every read to the store but refuses every insert
pub struct RefusingTrips(MemoryStore);

#[async_trait]
impl TripRepository for RefusingTrips {
    async fn create_trip(&self, _host_id: HostId, _trip: &NewTrip) -> CoreResult<Option<Trip>> {
        Ok(None)
    }

    async fn get_trip(&self, id: TripId) -> CoreResult<Option<Trip>> {
        self.0.get_trip(id).await
    }

    async fn search_trips(&self, query: &TripSearch, page: Page) -> CoreResult<Vec<Trip>> {
        self.0.search_trips(query, page).await
    }

    async fn browse_trips(&self, from: NaiveDate, to: NaiveDate, page: Page) -> CoreResult<Vec<Trip>> {
        self.0.browse_trips(from, to, page).await
    }

    async fn list_host_trips(&self, host_id: HostId) -> CoreResult<Vec<Trip>> {
        self.0.list_host_trips(host_id).await
    }

    async fn list_trips(&self, status: Option<TripStatus>, page: Page) -> CoreResult<Vec<Trip>> {
        self.0.list_trips(status, page).await
    }
}

pub struct BrokenCache;

#[async_trait]
impl Cache for BrokenCache {
    async fn get(&self, _key: &str) -> CoreResult<Option<serde_json::Value>> {
        Err(CoreError::CacheError("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &serde_json::Value, _ttl_seconds: u64) -> CoreResult<()> {
        Err(CoreError::CacheError("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> CoreResult<()> {
        Err(CoreError::CacheError("connection refused".into()))
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> CoreResult<u64> {
        Err(CoreError::CacheError("connection refused".into()))
    }
}

pub struct BrokenSink;

#[async_trait]
impl EventSink for BrokenSink {
    async fn emit(&self, _event: &DomainEvent) -> CoreResult<()> {
        Err(CoreError::EventError("broker unavailable".into()))
    }
}
