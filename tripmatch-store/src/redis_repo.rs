use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};
use tripmatch_core::cache::Cache;
use tripmatch_core::{CoreError, CoreResult};

const SCAN_BATCH: usize = 200;

/// JSON cache on top of Redis
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(cache_error)
    }
}

fn cache_error(err: redis::RedisError) -> CoreError {
    CoreError::CacheError(err.to_string())
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CoreResult<Option<serde_json::Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match raw {
            None => Ok(None),
            Some(payload) => match serde_json::from_str(&payload) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    // a corrupt entry is a miss; the next write replaces it
                    warn!("Discarding unreadable cache entry {}: {}", key, e);
                    Ok(None)
                }
            },
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value, ttl_seconds: u64) -> CoreResult<()> {
        let payload = serde_json::to_string(value).map_err(|e| CoreError::CacheError(e.to_string()))?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, payload, ttl_seconds)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(cache_error)?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> CoreResult<u64> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;

            if !keys.is_empty() {
                removed += keys.len() as u64;
                conn.del::<_, ()>(keys).await.map_err(cache_error)?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Deleted {} cache keys under {}", removed, prefix);
        Ok(removed)
    }
}
