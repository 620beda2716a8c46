use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tripmatch_core::repository::TripRepository;
use tripmatch_core::search::{Page, TripSearch};
use tripmatch_core::trip::{NewTrip, Trip, TripStatus};
use tripmatch_core::{CoreResult, HostId, TripId};

use crate::database::storage_error;
use crate::rows::{into_trips, limit_offset, TripRow, TRIP_COLUMNS};

pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn create_trip(&self, host_id: HostId, trip: &NewTrip) -> CoreResult<Option<Trip>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // FOR SHARE holds off a concurrent block until this insert commits
        let approved: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM hosts WHERE id = $1 AND status = 'approved' FOR SHARE")
                .bind(host_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error)?;

        if approved.is_none() {
            return Ok(None);
        }

        let sql = format!(
            r#"
            INSERT INTO travel_trips (host_id, from_country, from_state, from_city, to_country, to_city,
                travel_date, departure_time, arrival_date, arrival_time, airline, flight_number, age, languages)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            TRIP_COLUMNS
        );

        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(host_id)
            .bind(&trip.from_country)
            .bind(&trip.from_state)
            .bind(&trip.from_city)
            .bind(&trip.to_country)
            .bind(&trip.to_city)
            .bind(trip.travel_date)
            .bind(trip.departure_time)
            .bind(trip.arrival_date)
            .bind(trip.arrival_time)
            .bind(&trip.airline)
            .bind(&trip.flight_number)
            .bind(trip.age)
            .bind(&trip.languages)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        Trip::try_from(row).map(Some)
    }

    async fn get_trip(&self, id: TripId) -> CoreResult<Option<Trip>> {
        let sql = format!("SELECT {} FROM travel_trips WHERE id = $1", TRIP_COLUMNS);
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Trip::try_from).transpose()
    }

    async fn search_trips(&self, query: &TripSearch, page: Page) -> CoreResult<Vec<Trip>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            r#"
            SELECT {} FROM travel_trips
            WHERE from_country = $1 AND to_country = $2 AND travel_date = $3 AND status = 'active'
            ORDER BY travel_date ASC, id ASC
            LIMIT $4 OFFSET $5
            "#,
            TRIP_COLUMNS
        );

        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(&query.from_country)
            .bind(&query.to_country)
            .bind(query.travel_date)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        into_trips(rows)
    }

    async fn browse_trips(&self, from: NaiveDate, to: NaiveDate, page: Page) -> CoreResult<Vec<Trip>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            r#"
            SELECT {} FROM travel_trips
            WHERE status = 'active' AND travel_date BETWEEN $1 AND $2
            ORDER BY travel_date ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
            TRIP_COLUMNS
        );

        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(from)
            .bind(to)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        into_trips(rows)
    }

    async fn list_host_trips(&self, host_id: HostId) -> CoreResult<Vec<Trip>> {
        let sql = format!(
            "SELECT {} FROM travel_trips WHERE host_id = $1 ORDER BY travel_date DESC, id DESC",
            TRIP_COLUMNS
        );
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(host_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        into_trips(rows)
    }

    async fn list_trips(&self, status: Option<TripStatus>, page: Page) -> CoreResult<Vec<Trip>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            r#"
            SELECT {} FROM travel_trips
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            TRIP_COLUMNS
        );

        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        into_trips(rows)
    }
}
