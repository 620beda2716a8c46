use async_trait::async_trait;
use tripmatch_shared::DomainEvent;

use crate::CoreResult;

/// Analytics / audit destination. Callers treat it as fire-and-forget.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &DomainEvent) -> CoreResult<()>;
}
