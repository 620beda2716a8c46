use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analytics / audit event types produced by the travel domain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TravelTripCreated,
    TravelTripSearched,
    TravelTripViewed,
    TravelMatchRequested,
    TravelMatchAccepted,
    TravelMatchRejected,
    TravelMatchCancelled,
    AdminCancelledTrip,
    AdminCancelledMatch,
    AdminBlockedHost,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TravelTripCreated => "TRAVEL_TRIP_CREATED",
            EventType::TravelTripSearched => "TRAVEL_TRIP_SEARCHED",
            EventType::TravelTripViewed => "TRAVEL_TRIP_VIEWED",
            EventType::TravelMatchRequested => "TRAVEL_MATCH_REQUESTED",
            EventType::TravelMatchAccepted => "TRAVEL_MATCH_ACCEPTED",
            EventType::TravelMatchRejected => "TRAVEL_MATCH_REJECTED",
            EventType::TravelMatchCancelled => "TRAVEL_MATCH_CANCELLED",
            EventType::AdminCancelledTrip => "ADMIN_CANCELLED_TRIP",
            EventType::AdminCancelledMatch => "ADMIN_CANCELLED_MATCH",
            EventType::AdminBlockedHost => "ADMIN_BLOCKED_HOST",
        }
    }
}

/// Audit severity. Events without one are analytics-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub host_id: Option<i64>,
    pub admin_id: Option<String>,
}

impl Actor {
    pub fn host(user_id: &str, host_id: i64) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            host_id: Some(host_id),
            admin_id: None,
        }
    }

    pub fn admin(admin_id: &str) -> Self {
        Self {
            admin_id: Some(admin_id.to_string()),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
}

impl EntityRef {
    pub fn trip(id: i64) -> Self {
        Self { kind: "travel_trip".to_string(), id }
    }

    pub fn travel_match(id: i64) -> Self {
        Self { kind: "travel_match".to_string(), id }
    }

    pub fn host(id: i64) -> Self {
        Self { kind: "host".to_string(), id }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub actor: Actor,
    pub entity: Option<EntityRef>,
    pub location: Option<Location>,
    pub metadata: serde_json::Value,
    pub severity: Option<Severity>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(event_type: EventType, actor: Actor) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            actor,
            entity: None,
            location: None,
            metadata: serde_json::json!({}),
            severity: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks the event as audit-worthy
    pub fn audit(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn is_audit(&self) -> bool {
        self.severity.is_some()
    }
}
