use std::sync::Arc;
use tracing::info;
use tripmatch_core::matching::{Match, MatchAction, MatchInsert, MatchStatus, ReceivedMatch};
use tripmatch_core::repository::MatchRepository;
use tripmatch_core::search::Page;
use tripmatch_core::{HostId, MatchId, TripId};

use crate::error::{TravelError, TravelResult};

/// Owns match rows: creation under the pair constraints and guarded status writes
#[derive(Clone)]
pub struct MatchLedger {
    matches: Arc<dyn MatchRepository>,
}

impl MatchLedger {
    pub fn new(matches: Arc<dyn MatchRepository>) -> Self {
        Self { matches }
    }

    /// Create a `pending` match for the ordered pair
    pub async fn create(&self, trip_id: TripId, matched_trip_id: TripId) -> TravelResult<Match> {
        if trip_id == matched_trip_id {
            return Err(TravelError::SelfMatch);
        }

        match self.matches.create_match(trip_id, matched_trip_id).await? {
            MatchInsert::Created(created) => {
                info!("Match {} created: trip {} -> trip {}", created.id, trip_id, matched_trip_id);
                Ok(created)
            }
            MatchInsert::Duplicate => Err(TravelError::DuplicateMatch),
            MatchInsert::TripUnavailable => Err(TravelError::TripNotFound),
        }
    }

    pub async fn get(&self, id: MatchId) -> TravelResult<Option<Match>> {
        Ok(self.matches.get_match(id).await?)
    }

    pub async fn find_pair(&self, trip_id: TripId, matched_trip_id: TripId) -> TravelResult<Option<Match>> {
        Ok(self.matches.find_pair(trip_id, matched_trip_id).await?)
    }

    /// Apply a protocol action. The write only lands if the row is still in the
    /// action's source state, so of two racing calls exactly one succeeds.
    pub async fn transition(&self, current: &Match, action: MatchAction) -> TravelResult<Match> {
        if current.status != action.source() {
            return Err(refusal(current.id, current.status, action));
        }

        match self
            .matches
            .transition_match(current.id, &[action.source()], action.target())
            .await?
        {
            Some(updated) => {
                info!("Match {} {} -> {}", updated.id, current.status, updated.status);
                Ok(updated)
            }
            None => Err(self.lost_race(current, action).await?),
        }
    }

    /// Administrative cancel from any live state
    pub async fn force_cancel(&self, current: &Match) -> TravelResult<Match> {
        match current.status {
            MatchStatus::Cancelled => return Err(already_cancelled(current.id)),
            MatchStatus::Rejected => {
                return Err(TravelError::InvalidTransition {
                    from: MatchStatus::Rejected,
                    action: MatchAction::Cancel.as_str(),
                })
            }
            MatchStatus::Pending | MatchStatus::Accepted => {}
        }

        match self
            .matches
            .transition_match(current.id, &MatchStatus::LIVE, MatchStatus::Cancelled)
            .await?
        {
            Some(updated) => {
                info!("Match {} force-cancelled from {}", updated.id, current.status);
                Ok(updated)
            }
            None => Err(self.lost_race(current, MatchAction::Cancel).await?),
        }
    }

    pub async fn received(&self, host_id: HostId) -> TravelResult<Vec<ReceivedMatch>> {
        Ok(self.matches.list_received(host_id).await?)
    }

    pub async fn for_trips(&self, trip_ids: &[TripId]) -> TravelResult<Vec<Match>> {
        if trip_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.matches.list_for_trips(trip_ids).await?)
    }

    pub async fn list(&self, status: Option<MatchStatus>, page: Page) -> TravelResult<Vec<Match>> {
        Ok(self.matches.list_matches(status, page).await?)
    }

    // The guard failed under us: report the state the winner left behind
    async fn lost_race(&self, current: &Match, action: MatchAction) -> TravelResult<TravelError> {
        let observed = self
            .matches
            .get_match(current.id)
            .await?
            .map_or(current.status, |m| m.status);
        Ok(refusal(current.id, observed, action))
    }
}

fn already_cancelled(id: MatchId) -> TravelError {
    TravelError::AlreadyCancelled { entity: "match", id }
}

fn refusal(id: MatchId, from: MatchStatus, action: MatchAction) -> TravelError {
    if action == MatchAction::Cancel && from == MatchStatus::Cancelled {
        already_cancelled(id)
    } else {
        TravelError::InvalidTransition {
            from,
            action: action.as_str(),
        }
    }
}
