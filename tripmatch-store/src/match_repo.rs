use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;
use tripmatch_core::matching::{Match, MatchInsert, MatchStatus, ReceivedMatch};
use tripmatch_core::repository::MatchRepository;
use tripmatch_core::search::Page;
use tripmatch_core::trip::Trip;
use tripmatch_core::{CoreError, CoreResult, HostId, MatchId, TripId};

use crate::database::{is_unique_violation, storage_error};
use crate::rows::{into_matches, into_trips, limit_offset, MatchRow, TripRow, MATCH_COLUMNS, TRIP_COLUMNS};

pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_strings(statuses: &[MatchStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn create_match(&self, trip_id: TripId, matched_trip_id: TripId) -> CoreResult<MatchInsert> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // FOR SHARE holds off a concurrent cascade until this insert commits
        let active: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM travel_trips WHERE id = ANY($1) AND status = 'active' FOR SHARE",
        )
        .bind(vec![trip_id, matched_trip_id])
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;

        if active.len() != 2 {
            return Ok(MatchInsert::TripUnavailable);
        }

        let sql = format!(
            r#"
            INSERT INTO travel_matches (trip_id, matched_trip_id, status, consent_given)
            VALUES ($1, $2, 'pending', FALSE)
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );

        let inserted = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(trip_id)
            .bind(matched_trip_id)
            .fetch_one(&mut *tx)
            .await;

        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                debug!("Match pair {} -> {} already exists", trip_id, matched_trip_id);
                return Ok(MatchInsert::Duplicate);
            }
            Err(err) => return Err(storage_error(err)),
        };

        tx.commit().await.map_err(storage_error)?;

        Ok(MatchInsert::Created(Match::try_from(row)?))
    }

    async fn get_match(&self, id: MatchId) -> CoreResult<Option<Match>> {
        let sql = format!("SELECT {} FROM travel_matches WHERE id = $1", MATCH_COLUMNS);
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Match::try_from).transpose()
    }

    async fn find_pair(&self, trip_id: TripId, matched_trip_id: TripId) -> CoreResult<Option<Match>> {
        let sql = format!(
            "SELECT {} FROM travel_matches WHERE trip_id = $1 AND matched_trip_id = $2",
            MATCH_COLUMNS
        );
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(trip_id)
            .bind(matched_trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Match::try_from).transpose()
    }

    async fn transition_match(
        &self,
        id: MatchId,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> CoreResult<Option<Match>> {
        let sql = format!(
            r#"
            UPDATE travel_matches
            SET status = $1, consent_given = $2, updated_at = NOW()
            WHERE id = $3 AND status = ANY($4)
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );

        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(to.as_str())
            .bind(to == MatchStatus::Accepted)
            .bind(id)
            .bind(status_strings(from))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Match::try_from).transpose()
    }

    async fn list_received(&self, host_id: HostId) -> CoreResult<Vec<ReceivedMatch>> {
        let sql = r#"
            SELECT m.id, m.trip_id, m.matched_trip_id, m.status, m.consent_given, m.created_at, m.updated_at
            FROM travel_matches m
            JOIN travel_trips receiver ON receiver.id = m.matched_trip_id
            JOIN travel_trips requester ON requester.id = m.trip_id
            WHERE m.status = 'pending'
              AND receiver.host_id = $1
              AND requester.host_id <> $1
            ORDER BY m.created_at DESC, m.id DESC
        "#;

        let matches = into_matches(
            sqlx::query_as::<_, MatchRow>(sql)
                .bind(host_id)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?,
        )?;

        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let trip_ids: Vec<i64> = matches
            .iter()
            .flat_map(|m| [m.trip_id, m.matched_trip_id])
            .collect();
        let trip_sql = format!("SELECT {} FROM travel_trips WHERE id = ANY($1)", TRIP_COLUMNS);
        let trips: HashMap<TripId, Trip> = into_trips(
            sqlx::query_as::<_, TripRow>(&trip_sql)
                .bind(trip_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?,
        )?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

        matches
            .into_iter()
            .map(|m| {
                let receiver_trip = trips.get(&m.matched_trip_id).cloned();
                let requester_trip = trips.get(&m.trip_id).cloned();
                match (receiver_trip, requester_trip) {
                    (Some(receiver_trip), Some(requester_trip)) => Ok(ReceivedMatch {
                        travel_match: m,
                        receiver_trip,
                        requester_trip,
                    }),
                    _ => Err(CoreError::StorageError(format!(
                        "match {} references a missing trip",
                        m.id
                    ))),
                }
            })
            .collect()
    }

    async fn list_for_trips(&self, trip_ids: &[TripId]) -> CoreResult<Vec<Match>> {
        if trip_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {} FROM travel_matches
            WHERE trip_id = ANY($1) OR matched_trip_id = ANY($1)
            ORDER BY created_at DESC, id DESC
            "#,
            MATCH_COLUMNS
        );

        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(trip_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        into_matches(rows)
    }

    async fn list_matches(&self, status: Option<MatchStatus>, page: Page) -> CoreResult<Vec<Match>> {
        let (limit, offset) = limit_offset(page);
        let sql = format!(
            r#"
            SELECT {} FROM travel_matches
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            MATCH_COLUMNS
        );

        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        into_matches(rows)
    }
}
