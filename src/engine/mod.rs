//! Ticket lifecycle engine.
//!
//! [`Engine`] orchestrates the store adapters: creation with duplicate,
//! referential and schema checks; policy-filtered updates; cascading event
//! deletion; and enriched ticket reads. It holds no state of its own between
//! calls and performs no retries.
//!
//! Multi-step operations are not transactional. The unique index on
//! (event, owner) is the authoritative duplicate guard, and a cascade delete
//! interrupted after its first step is completed by retrying it.

use std::sync::Arc;

use sqlx::PgPool;

use crate::store::{
    EventStore, MemoryDatabase, PgEventStore, PgTicketStore, PgUserStore, TicketStore, UserStore,
};

mod events;
mod tickets;
mod users;

#[derive(Clone)]
pub struct Engine {
    events: Arc<dyn EventStore>,
    users: Arc<dyn UserStore>,
    tickets: Arc<dyn TicketStore>,
}

impl Engine {
    pub fn new(
        events: Arc<dyn EventStore>,
        users: Arc<dyn UserStore>,
        tickets: Arc<dyn TicketStore>,
    ) -> Self {
        Self {
            events,
            users,
            tickets,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgEventStore::new(pool.clone())),
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgTicketStore::new(pool)),
        )
    }

    pub fn in_memory(db: &MemoryDatabase) -> Self {
        Self::new(
            Arc::new(db.event_store()),
            Arc::new(db.user_store()),
            Arc::new(db.ticket_store()),
        )
    }
}
