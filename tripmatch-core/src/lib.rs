pub mod cache;
pub mod events;
pub mod identity;
pub mod matching;
pub mod repository;
pub mod search;
pub mod trip;

pub type TripId = i64;
pub type MatchId = i64;
pub type HostId = i64;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Identity lookup failed: {0}")]
    IdentityError(String),
    #[error("Storage failure: {0}")]
    StorageError(String),
    #[error("Cache failure: {0}")]
    CacheError(String),
    #[error("Event sink failure: {0}")]
    EventError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
