//! Entity store adapters.
//!
//! Each entity kind has an adapter trait covering existence checks, reads,
//! inserts, whitelisted updates and deletes. Adapters hold an injected store
//! handle: a Postgres pool in production ([`postgres`]) or a shared in-memory
//! database for tests and local development ([`memory`]).
//!
//! Update and delete methods return the number of documents actually changed
//! so callers can tell a no-op apart from an applied change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    EnrichedTicket, Event, EventUpdate, Ticket, TicketFilter, TicketUpdate, User, UserUpdate,
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryDatabase, MemoryEventStore, MemoryTicketStore, MemoryUserStore};
pub use postgres::{PgEventStore, PgTicketStore, PgUserStore};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn exists(&self, id: Uuid) -> StoreResult<bool>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>>;
    async fn list(&self) -> StoreResult<Vec<Event>>;
    async fn insert(&self, event: &Event) -> StoreResult<()>;
    async fn update(&self, id: Uuid, updates: &[EventUpdate]) -> StoreResult<u64>;
    async fn delete(&self, id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn exists(&self, id: &str) -> StoreResult<bool>;
    async fn student_number_taken(&self, student_number: &str) -> StoreResult<bool>;
    async fn get(&self, id: &str) -> StoreResult<Option<User>>;
    async fn get_by_student_number(&self, student_number: &str) -> StoreResult<Option<User>>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    async fn insert(&self, user: &User) -> StoreResult<()>;
    async fn update(&self, id: &str, updates: &[UserUpdate]) -> StoreResult<u64>;
}

/// Ticket reads come back joined with their event and owner. A ticket whose
/// event or owner cannot be resolved is left out of every read.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Counts raw ticket documents, joinable or not.
    async fn count(&self, filter: &TicketFilter) -> StoreResult<u64>;
    async fn find(&self, filter: &TicketFilter) -> StoreResult<Vec<EnrichedTicket>>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<EnrichedTicket>>;
    /// Fails with [`StoreError::Duplicate`] when the (event, owner) pair
    /// already holds a ticket.
    async fn insert(&self, ticket: &Ticket) -> StoreResult<()>;
    async fn update(&self, id: Uuid, updates: &[TicketUpdate]) -> StoreResult<u64>;
    /// Increments the scan count and stamps `at` as the last scan time, but
    /// only while the count is below the ticket's maximum. Returns 0 when the
    /// ticket is missing or already used up.
    async fn record_scan(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;
    async fn delete(&self, id: Uuid) -> StoreResult<u64>;
    async fn delete_for_event(&self, event_id: Uuid) -> StoreResult<u64>;
}
