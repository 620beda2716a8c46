use async_trait::async_trait;

use crate::CoreResult;

/// Memoization store for derived views. A miss is `Ok(None)`, never an error.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: &serde_json::Value, ttl_seconds: u64) -> CoreResult<()>;

    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// Returns the number of keys removed
    async fn delete_by_prefix(&self, prefix: &str) -> CoreResult<u64>;
}

/// Cache that stores nothing. The domain services must behave identically with it.
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> CoreResult<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &serde_json::Value, _ttl_seconds: u64) -> CoreResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> CoreResult<u64> {
        Ok(0)
    }
}

/// Key layout shared by every writer and reader of the cache
pub mod keys {
    use crate::HostId;

    pub const TRAVEL: &str = "travel:";
    pub const HOST: &str = "host:";
    pub const ADMIN: &str = "admin:";
    pub const PUBLIC_BROWSE: &str = "travel:public:browse:";
    pub const PUBLIC_SEARCH: &str = "travel:public:search:";

    pub fn received(host_id: HostId) -> String {
        format!("travel:matches:received:{}", host_id)
    }
}
