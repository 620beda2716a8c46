use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::identity::HostProfile;
use crate::trip::Trip;
use crate::TripId;

/// Exact-route search over active trips
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TripSearch {
    pub from_country: String,
    pub to_country: String,
    #[serde(alias = "date")]
    pub travel_date: NaiveDate,
}

/// 1-based page with a bounded page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Clamps `page` to at least 1 and `limit` to `1..=max_limit`
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripMeta {
    pub age: Option<i32>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightDetails {
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    pub from: String,
    pub to: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: Option<NaiveDate>,
    pub arrival_time: Option<NaiveTime>,
}

/// Public view of an active trip, enriched with its host's profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripListing {
    pub id: TripId,
    pub host: Option<HostProfile>,
    pub trip_meta: TripMeta,
    pub destination: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub flight: FlightDetails,
}

impl TripListing {
    pub fn new(trip: &Trip, host: Option<HostProfile>) -> Self {
        Self {
            id: trip.id,
            host,
            trip_meta: TripMeta {
                age: trip.age,
                languages: trip.languages.clone(),
            },
            destination: format!("{}, {}", trip.to_city, trip.to_country),
            date: trip.travel_date,
            time: trip.departure_time,
            flight: FlightDetails {
                airline: trip.airline.clone(),
                flight_number: trip.flight_number.clone(),
                from: trip.from_city.clone(),
                to: trip.to_city.clone(),
                departure_date: trip.travel_date,
                departure_time: trip.departure_time,
                arrival_date: trip.arrival_date,
                arrival_time: trip.arrival_time,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_deserialization_accepts_date_alias() {
        let json = r#"
            {
                "from_country": "IN",
                "to_country": "US",
                "date": "2025-06-01"
            }
        "#;
        let search: TripSearch = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(search.from_country, "IN");
        assert_eq!(search.travel_date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn test_page_clamping() {
        let page = Page::new(Some(0), Some(500), 10, 50);
        assert_eq!(page, Page { page: 1, limit: 50 });
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(3), None, 10, 50);
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.next().page, 4);
    }
}
