//! Row shapes for the travel tables and their conversion into domain types.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tripmatch_core::matching::Match;
use tripmatch_core::trip::Trip;
use tripmatch_core::CoreError;

pub(crate) const TRIP_COLUMNS: &str = "id, host_id, from_country, from_state, from_city, to_country, to_city, \
     travel_date, departure_time, arrival_date, arrival_time, airline, flight_number, age, languages, \
     status, created_at, updated_at";

pub(crate) const MATCH_COLUMNS: &str =
    "id, trip_id, matched_trip_id, status, consent_given, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct TripRow {
    id: i64,
    host_id: i64,
    from_country: String,
    from_state: Option<String>,
    from_city: String,
    to_country: String,
    to_city: String,
    travel_date: NaiveDate,
    departure_time: NaiveTime,
    arrival_date: Option<NaiveDate>,
    arrival_time: Option<NaiveTime>,
    airline: Option<String>,
    flight_number: Option<String>,
    age: Option<i32>,
    languages: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = CoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            host_id: row.host_id,
            from_country: row.from_country,
            from_state: row.from_state,
            from_city: row.from_city,
            to_country: row.to_country,
            to_city: row.to_city,
            travel_date: row.travel_date,
            departure_time: row.departure_time,
            arrival_date: row.arrival_date,
            arrival_time: row.arrival_time,
            airline: row.airline,
            flight_number: row.flight_number,
            age: row.age,
            languages: row.languages,
            status: row.status.parse().map_err(CoreError::StorageError)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MatchRow {
    id: i64,
    trip_id: i64,
    matched_trip_id: i64,
    status: String,
    consent_given: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for Match {
    type Error = CoreError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        Ok(Match {
            id: row.id,
            trip_id: row.trip_id,
            matched_trip_id: row.matched_trip_id,
            status: row.status.parse().map_err(CoreError::StorageError)?,
            consent_given: row.consent_given,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_trips(rows: Vec<TripRow>) -> Result<Vec<Trip>, CoreError> {
    rows.into_iter().map(Trip::try_from).collect()
}

pub(crate) fn into_matches(rows: Vec<MatchRow>) -> Result<Vec<Match>, CoreError> {
    rows.into_iter().map(Match::try_from).collect()
}

/// Bind-ready page bounds
pub(crate) fn limit_offset(page: tripmatch_core::search::Page) -> (i64, i64) {
    (i64::from(page.limit), page.offset() as i64)
}
