use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;
use tripmatch_core::identity::{Host, HostProfile, HostStatus, IdentityResolver};
use tripmatch_core::{CoreError, CoreResult, HostId};
use tripmatch_shared::Masked;

use crate::database::storage_error;

/// Host lookups against the `hosts` table owned by the identity service
pub struct PgHostDirectory {
    pool: PgPool,
}

impl PgHostDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const HOST_COLUMNS: &str = "id, user_id, status, full_name, country, city, email, profile_image, verified";

#[derive(sqlx::FromRow)]
struct HostRow {
    id: i64,
    user_id: String,
    status: String,
    full_name: String,
    country: Option<String>,
    city: Option<String>,
    email: Option<String>,
    profile_image: Option<String>,
    verified: bool,
}

impl TryFrom<HostRow> for Host {
    type Error = CoreError;

    fn try_from(row: HostRow) -> Result<Self, Self::Error> {
        Ok(Host {
            id: row.id,
            user_id: row.user_id,
            status: row.status.parse::<HostStatus>().map_err(CoreError::IdentityError)?,
            full_name: row.full_name,
            country: row.country,
            city: row.city,
            email: row.email.map(Masked),
            profile_image: row.profile_image,
            verified: row.verified,
        })
    }
}

#[async_trait]
impl IdentityResolver for PgHostDirectory {
    async fn resolve_host(&self, actor_id: &str) -> CoreResult<Option<Host>> {
        let sql = format!("SELECT {} FROM hosts WHERE user_id = $1", HOST_COLUMNS);
        let row = sqlx::query_as::<_, HostRow>(&sql)
            .bind(actor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Host::try_from).transpose()
    }

    async fn find_host(&self, host_id: HostId) -> CoreResult<Option<Host>> {
        let sql = format!("SELECT {} FROM hosts WHERE id = $1", HOST_COLUMNS);
        let row = sqlx::query_as::<_, HostRow>(&sql)
            .bind(host_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Host::try_from).transpose()
    }

    async fn public_profiles(&self, host_ids: &[HostId]) -> CoreResult<HashMap<HostId, HostProfile>> {
        if host_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {} FROM hosts WHERE id = ANY($1)", HOST_COLUMNS);
        let rows = sqlx::query_as::<_, HostRow>(&sql)
            .bind(host_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| Host::try_from(row).map(|host| (host.id, host.profile())))
            .collect()
    }

    async fn block_host(&self, host_id: HostId, reason: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE hosts SET status = 'blocked', rejection_reason = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(reason)
        .bind(host_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        info!("Host {} blocked", host_id);
        Ok(())
    }
}
