//! Match entity and its transition rules.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::trip::Trip;
use crate::{MatchId, TripId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a cascade may still move to `Cancelled`
    pub fn is_live(&self) -> bool {
        matches!(self, MatchStatus::Pending | MatchStatus::Accepted)
    }

    pub const LIVE: [MatchStatus; 2] = [MatchStatus::Pending, MatchStatus::Accepted];
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "accepted" => Ok(MatchStatus::Accepted),
            "rejected" => Ok(MatchStatus::Rejected),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// Actions on an existing match. Creating one (`request`) is handled separately
/// because its guard is on the pair, not on a row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchAction {
    Accept,
    Reject,
    Cancel,
}

impl MatchAction {
    /// The only status this action may start from
    pub fn source(&self) -> MatchStatus {
        match self {
            MatchAction::Accept | MatchAction::Reject => MatchStatus::Pending,
            MatchAction::Cancel => MatchStatus::Accepted,
        }
    }

    pub fn target(&self) -> MatchStatus {
        match self {
            MatchAction::Accept => MatchStatus::Accepted,
            MatchAction::Reject => MatchStatus::Rejected,
            MatchAction::Cancel => MatchStatus::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchAction::Accept => "accept",
            MatchAction::Reject => "reject",
            MatchAction::Cancel => "cancel",
        }
    }
}

impl FromStr for MatchAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(MatchAction::Accept),
            "reject" => Ok(MatchAction::Reject),
            "cancel" => Ok(MatchAction::Cancel),
            other => Err(format!("unknown match action: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: MatchId,
    /// requester side
    pub trip_id: TripId,
    /// receiver side
    pub matched_trip_id: TripId,
    pub status: MatchStatus,
    pub consent_given: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn touches(&self, trip_id: TripId) -> bool {
        self.trip_id == trip_id || self.matched_trip_id == trip_id
    }

    /// Applies a status change in place, keeping `consent_given` in step with it
    pub fn set_status(&mut self, status: MatchStatus) {
        self.status = status;
        self.consent_given = status == MatchStatus::Accepted;
        self.updated_at = Utc::now();
    }
}

/// Result of trying to insert a new `pending` match
#[derive(Debug, Clone, PartialEq)]
pub enum MatchInsert {
    Created(Match),
    /// a row already exists for the ordered pair, whatever its status
    Duplicate,
    /// one of the trips is missing or no longer active
    TripUnavailable,
}

/// A pending request as seen by the receiving host
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMatch {
    pub travel_match: Match,
    pub receiver_trip: Trip,
    pub requester_trip: Trip,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Match {
        let now = Utc::now();
        Match {
            id: 1,
            trip_id: 10,
            matched_trip_id: 20,
            status: MatchStatus::Pending,
            consent_given: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_action_guards() {
        assert_eq!(MatchAction::Accept.source(), MatchStatus::Pending);
        assert_eq!(MatchAction::Reject.source(), MatchStatus::Pending);
        assert_eq!(MatchAction::Cancel.source(), MatchStatus::Accepted);
        assert_eq!(MatchAction::Reject.target(), MatchStatus::Rejected);
    }

    #[test]
    fn test_consent_tracks_accepted() {
        let mut m = pending();
        m.set_status(MatchStatus::Accepted);
        assert!(m.consent_given);
        m.set_status(MatchStatus::Cancelled);
        assert!(!m.consent_given);
    }

    #[test]
    fn test_live_statuses() {
        assert!(MatchStatus::Pending.is_live());
        assert!(MatchStatus::Accepted.is_live());
        assert!(!MatchStatus::Rejected.is_live());
        assert!(!MatchStatus::Cancelled.is_live());
    }

    #[test]
    fn test_touches_both_directions() {
        let m = pending();
        assert!(m.touches(10));
        assert!(m.touches(20));
        assert!(!m.touches(30));
    }
}
