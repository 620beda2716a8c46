pub mod models;
pub mod pii;

pub use models::events::{Actor, DomainEvent, EntityRef, EventType, Location, Severity};
pub use pii::Masked;
