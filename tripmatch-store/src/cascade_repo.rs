use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use tripmatch_core::matching::{Match, MatchStatus};
use tripmatch_core::repository::{CascadeOutcome, CascadeRepository, TripCancellation};
use tripmatch_core::trip::Trip;
use tripmatch_core::{CoreResult, HostId, TripId};

use crate::database::storage_error;
use crate::rows::{into_matches, into_trips, MatchRow, TripRow, MATCH_COLUMNS, TRIP_COLUMNS};

/// Transactional cancellations spanning trips and matches
pub struct PgCascadeRepository {
    pool: PgPool,
}

impl PgCascadeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn live_statuses() -> Vec<String> {
    MatchStatus::LIVE.iter().map(|s| s.as_str().to_string()).collect()
}

async fn cancel_live_matches(
    tx: &mut Transaction<'_, Postgres>,
    trip_ids: &[TripId],
) -> CoreResult<Vec<Match>> {
    if trip_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        r#"
        UPDATE travel_matches
        SET status = 'cancelled', consent_given = FALSE, updated_at = NOW()
        WHERE (trip_id = ANY($1) OR matched_trip_id = ANY($1)) AND status = ANY($2)
        RETURNING {}
        "#,
        MATCH_COLUMNS
    );

    let rows = sqlx::query_as::<_, MatchRow>(&sql)
        .bind(trip_ids.to_vec())
        .bind(live_statuses())
        .fetch_all(&mut **tx)
        .await
        .map_err(storage_error)?;

    into_matches(rows)
}

#[async_trait]
impl CascadeRepository for PgCascadeRepository {
    async fn cancel_trip(&self, trip_id: TripId) -> CoreResult<TripCancellation> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM travel_trips WHERE id = $1 FOR UPDATE")
                .bind(trip_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error)?;

        match current {
            None => return Ok(TripCancellation::NotFound),
            Some((status,)) if status == "cancelled" => return Ok(TripCancellation::AlreadyCancelled),
            Some(_) => {}
        }

        let sql = format!(
            r#"
            UPDATE travel_trips SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TRIP_COLUMNS
        );
        let trip = Trip::try_from(
            sqlx::query_as::<_, TripRow>(&sql)
                .bind(trip_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_error)?,
        )?;

        let cancelled_matches = cancel_live_matches(&mut tx, &[trip_id]).await?;

        tx.commit().await.map_err(storage_error)?;

        info!(
            "Trip {} cancelled, {} dependent matches cancelled",
            trip_id,
            cancelled_matches.len()
        );

        Ok(TripCancellation::Cancelled(CascadeOutcome {
            cancelled_trips: vec![trip],
            cancelled_matches,
        }))
    }

    async fn cancel_trip_matches(&self, trip_id: TripId) -> CoreResult<Vec<Match>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let cancelled = cancel_live_matches(&mut tx, &[trip_id]).await?;
        tx.commit().await.map_err(storage_error)?;
        Ok(cancelled)
    }

    async fn cancel_host_trips(&self, host_id: HostId) -> CoreResult<CascadeOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let sql = format!(
            r#"
            UPDATE travel_trips SET status = 'cancelled', updated_at = NOW()
            WHERE host_id = $1 AND status = 'active'
            RETURNING {}
            "#,
            TRIP_COLUMNS
        );
        let cancelled_trips = into_trips(
            sqlx::query_as::<_, TripRow>(&sql)
                .bind(host_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(storage_error)?,
        )?;

        let trip_ids: Vec<TripId> = cancelled_trips.iter().map(|t| t.id).collect();
        let cancelled_matches = cancel_live_matches(&mut tx, &trip_ids).await?;

        tx.commit().await.map_err(storage_error)?;

        info!(
            "Host {} cascade: {} trips, {} matches cancelled",
            host_id,
            cancelled_trips.len(),
            cancelled_matches.len()
        );

        Ok(CascadeOutcome {
            cancelled_trips,
            cancelled_matches,
        })
    }
}
