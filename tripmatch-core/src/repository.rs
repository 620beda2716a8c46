use async_trait::async_trait;
use chrono::NaiveDate;

use crate::matching::{Match, MatchInsert, MatchStatus, ReceivedMatch};
use crate::search::{Page, TripSearch};
use crate::trip::{NewTrip, Trip, TripStatus};
use crate::{CoreResult, HostId, MatchId, TripId};

/// Repository trait for trip data access
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Insert an `active` trip. `None` when the host is no longer approved at
    /// the moment the row is written.
    async fn create_trip(&self, host_id: HostId, trip: &NewTrip) -> CoreResult<Option<Trip>>;

    async fn get_trip(&self, id: TripId) -> CoreResult<Option<Trip>>;

    /// Active trips on the exact route and date, ascending by date then id
    async fn search_trips(&self, query: &TripSearch, page: Page) -> CoreResult<Vec<Trip>>;

    /// Active trips with `travel_date` in `[from, to]` inclusive, ascending by date then id
    async fn browse_trips(&self, from: NaiveDate, to: NaiveDate, page: Page) -> CoreResult<Vec<Trip>>;

    /// Every trip of a host regardless of status, newest travel date first
    async fn list_host_trips(&self, host_id: HostId) -> CoreResult<Vec<Trip>>;

    /// Admin listing, newest first
    async fn list_trips(&self, status: Option<TripStatus>, page: Page) -> CoreResult<Vec<Trip>>;
}

/// Repository trait for match data access
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Insert a `pending` match. Both trips must exist and be active for the
    /// duration of the insert; the ordered pair must be unused.
    async fn create_match(&self, trip_id: TripId, matched_trip_id: TripId) -> CoreResult<MatchInsert>;

    async fn get_match(&self, id: MatchId) -> CoreResult<Option<Match>>;

    async fn find_pair(&self, trip_id: TripId, matched_trip_id: TripId) -> CoreResult<Option<Match>>;

    /// Compare-and-set: moves the match to `to` only if its current status is
    /// one of `from`. Returns `None` when the guard did not hold.
    async fn transition_match(
        &self,
        id: MatchId,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> CoreResult<Option<Match>>;

    /// Pending matches whose receiver trip belongs to `host_id` and whose
    /// requester trip does not, newest first
    async fn list_received(&self, host_id: HostId) -> CoreResult<Vec<ReceivedMatch>>;

    /// Matches touching any of the trips, in either direction
    async fn list_for_trips(&self, trip_ids: &[TripId]) -> CoreResult<Vec<Match>>;

    /// Admin listing, newest first
    async fn list_matches(&self, status: Option<MatchStatus>, page: Page) -> CoreResult<Vec<Match>>;
}

/// Everything a cascade changed, committed as one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    pub cancelled_trips: Vec<Trip>,
    pub cancelled_matches: Vec<Match>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripCancellation {
    Cancelled(CascadeOutcome),
    AlreadyCancelled,
    NotFound,
}

/// Multi-row cancellations. Each method is a single transaction.
#[async_trait]
pub trait CascadeRepository: Send + Sync {
    /// Cancel an active trip and every live match touching it
    async fn cancel_trip(&self, trip_id: TripId) -> CoreResult<TripCancellation>;

    /// Cancel every live match touching the trip. Already terminal matches are
    /// left alone, so re-running cancels nothing new.
    async fn cancel_trip_matches(&self, trip_id: TripId) -> CoreResult<Vec<Match>>;

    /// Cancel every active trip of the host and every live match touching them
    async fn cancel_host_trips(&self, host_id: HostId) -> CoreResult<CascadeOutcome>;
}
