pub mod app_config;
pub mod cascade_repo;
pub mod database;
pub mod events;
pub mod host_repo;
pub mod match_repo;
pub mod memory;
pub mod redis_repo;
mod rows;
pub mod trip_repo;

pub use cascade_repo::PgCascadeRepository;
pub use database::DbClient;
pub use events::TracingEventSink;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
pub use host_repo::PgHostDirectory;
pub use match_repo::PgMatchRepository;
pub use memory::{MemoryCache, MemoryHostDirectory, MemoryStore, RecordingEventSink};
pub use redis_repo::RedisCache;
pub use trip_repo::PgTripRepository;
