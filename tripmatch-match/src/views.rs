//! Read models handed to callers and stored in the cache.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tripmatch_core::identity::HostProfile;
use tripmatch_core::matching::{Match, MatchStatus};
use tripmatch_core::trip::{Trip, TripStatus};
use tripmatch_core::{HostId, MatchId, TripId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripSummary {
    pub id: TripId,
    pub host_id: HostId,
    pub from_country: String,
    pub from_city: String,
    pub to_country: String,
    pub to_city: String,
    pub travel_date: NaiveDate,
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            host_id: trip.host_id,
            from_country: trip.from_country.clone(),
            from_city: trip.from_city.clone(),
            to_country: trip.to_country.clone(),
            to_city: trip.to_city.clone(),
            travel_date: trip.travel_date,
        }
    }
}

/// A pending request waiting on the receiving host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceivedRequest {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub requested_at: DateTime<Utc>,
    pub receiver_trip: TripSummary,
    pub requester_trip: TripSummary,
    pub requester_host: Option<HostProfile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Connected,
    Pending,
    None,
}

impl MatchState {
    /// `connected` wins over `pending`; both directions count
    pub fn derive<'a>(matches: impl IntoIterator<Item = &'a MatchLink>) -> Self {
        let mut state = MatchState::None;
        for link in matches {
            match link.status {
                MatchStatus::Accepted => return MatchState::Connected,
                MatchStatus::Pending => state = MatchState::Pending,
                _ => {}
            }
        }
        state
    }
}

/// One side of a match as seen from a given trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchLink {
    pub id: MatchId,
    pub status: MatchStatus,
    pub other_trip_id: TripId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MyTrip {
    pub id: TripId,
    pub from_city: String,
    pub to_city: String,
    pub travel_date: NaiveDate,
    pub status: TripStatus,
    pub match_state: MatchState,
    pub sent_matches: Vec<MatchLink>,
    pub received_matches: Vec<MatchLink>,
}

impl MyTrip {
    pub fn new(trip: &Trip, matches: &[Match]) -> Self {
        let sent_matches: Vec<MatchLink> = matches
            .iter()
            .filter(|m| m.trip_id == trip.id)
            .map(|m| MatchLink {
                id: m.id,
                status: m.status,
                other_trip_id: m.matched_trip_id,
            })
            .collect();
        let received_matches: Vec<MatchLink> = matches
            .iter()
            .filter(|m| m.matched_trip_id == trip.id)
            .map(|m| MatchLink {
                id: m.id,
                status: m.status,
                other_trip_id: m.trip_id,
            })
            .collect();

        Self {
            id: trip.id,
            from_city: trip.from_city.clone(),
            to_city: trip.to_city.clone(),
            travel_date: trip.travel_date,
            status: trip.status,
            match_state: MatchState::derive(sent_matches.iter().chain(received_matches.iter())),
            sent_matches,
            received_matches,
        }
    }
}

/// Totals reported by an administrative cascade
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CascadeSummary {
    pub cancelled_trips: usize,
    pub cancelled_matches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(status: MatchStatus) -> MatchLink {
        MatchLink {
            id: 1,
            status,
            other_trip_id: 2,
        }
    }

    #[test]
    fn test_match_state_precedence() {
        let none: [MatchLink; 0] = [];
        assert_eq!(MatchState::derive(&none), MatchState::None);
        assert_eq!(
            MatchState::derive(&[link(MatchStatus::Rejected), link(MatchStatus::Cancelled)]),
            MatchState::None
        );
        assert_eq!(
            MatchState::derive(&[link(MatchStatus::Pending), link(MatchStatus::Rejected)]),
            MatchState::Pending
        );
        assert_eq!(
            MatchState::derive(&[link(MatchStatus::Pending), link(MatchStatus::Accepted)]),
            MatchState::Connected
        );
    }
}
