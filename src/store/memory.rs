//! In-memory store for tests and local development.
//!
//! All three adapters share one [`MemoryDatabase`] handle so tickets can be
//! joined with events and users. The same uniqueness rules as the Postgres
//! indexes are enforced: one ticket per (event, owner) and one user per
//! student number.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EventStore, StoreError, StoreResult, TicketStore, UserStore};
use crate::models::{
    EnrichedTicket, Event, EventUpdate, Ticket, TicketFilter, TicketUpdate, User, UserUpdate,
};

#[derive(Debug, Default)]
struct Collections {
    events: HashMap<Uuid, Event>,
    users: BTreeMap<String, User>,
    tickets: HashMap<Uuid, Ticket>,
}

impl Collections {
    fn enrich(&self, ticket: &Ticket) -> Option<EnrichedTicket> {
        let event_data = self.events.get(&ticket.event_id)?.clone();
        let owner_data = self.users.get(&ticket.owner_id)?.clone();
        Some(EnrichedTicket {
            ticket: ticket.clone(),
            event_data,
            owner_data,
        })
    }
}

/// Shared handle to the in-memory collections. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_store(&self) -> MemoryEventStore {
        MemoryEventStore { db: self.clone() }
    }

    pub fn user_store(&self) -> MemoryUserStore {
        MemoryUserStore { db: self.clone() }
    }

    pub fn ticket_store(&self) -> MemoryTicketStore {
        MemoryTicketStore { db: self.clone() }
    }

    /// Raw ticket documents, ignoring joinability. Useful for assertions.
    pub async fn raw_tickets(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.inner.read().await.tickets.values().cloned().collect();
        tickets.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        tickets
    }

    /// Removes a user without touching their tickets.
    pub async fn remove_user(&self, id: &str) -> Option<User> {
        self.inner.write().await.users.remove(id)
    }
}

/// Applies `updates` to a copy of `doc` and reports whether anything changed.
fn apply_all<T, U>(doc: &T, updates: &[U], apply: impl Fn(&U, &mut T)) -> Option<T>
where
    T: Clone + PartialEq,
{
    let mut next = doc.clone();
    for update in updates {
        apply(update, &mut next);
    }
    (next != *doc).then_some(next)
}

#[derive(Debug, Clone)]
pub struct MemoryEventStore {
    db: MemoryDatabase,
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.db.inner.read().await.events.contains_key(&id))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.db.inner.read().await.events.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Event>> {
        let mut events: Vec<Event> = self.db.inner.read().await.events.values().cloned().collect();
        events.sort_by(|a, b| a.start_timestamp.cmp(&b.start_timestamp).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn insert(&self, event: &Event) -> StoreResult<()> {
        let mut db = self.db.inner.write().await;
        if db.events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(format!("event {}", event.id)));
        }
        db.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, updates: &[EventUpdate]) -> StoreResult<u64> {
        let mut db = self.db.inner.write().await;
        let Some(current) = db.events.get(&id) else {
            return Ok(0);
        };
        match apply_all(current, updates, EventUpdate::apply) {
            Some(next) => {
                db.events.insert(id, next);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<u64> {
        Ok(u64::from(self.db.inner.write().await.events.remove(&id).is_some()))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryUserStore {
    db: MemoryDatabase,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.db.inner.read().await.users.contains_key(id))
    }

    async fn student_number_taken(&self, student_number: &str) -> StoreResult<bool> {
        Ok(self.get_by_student_number(student_number).await?.is_some())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.db.inner.read().await.users.get(id).cloned())
    }

    async fn get_by_student_number(&self, student_number: &str) -> StoreResult<Option<User>> {
        Ok(self
            .db
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.student_number == student_number)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.db.inner.read().await.users.values().cloned().collect())
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut db = self.db.inner.write().await;
        if db.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        if db
            .users
            .values()
            .any(|u| u.student_number == user.student_number)
        {
            return Err(StoreError::Duplicate(format!(
                "student number {}",
                user.student_number
            )));
        }
        db.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(&self, id: &str, updates: &[UserUpdate]) -> StoreResult<u64> {
        let mut db = self.db.inner.write().await;
        let Some(current) = db.users.get(id) else {
            return Ok(0);
        };
        let Some(next) = apply_all(current, updates, UserUpdate::apply) else {
            return Ok(0);
        };
        if db
            .users
            .values()
            .any(|u| u.id != id && u.student_number == next.student_number)
        {
            return Err(StoreError::Duplicate(format!(
                "student number {}",
                next.student_number
            )));
        }
        db.users.insert(id.to_string(), next);
        Ok(1)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTicketStore {
    db: MemoryDatabase,
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn count(&self, filter: &TicketFilter) -> StoreResult<u64> {
        let db = self.db.inner.read().await;
        Ok(db.tickets.values().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn find(&self, filter: &TicketFilter) -> StoreResult<Vec<EnrichedTicket>> {
        let db = self.db.inner.read().await;
        let mut tickets: Vec<EnrichedTicket> = db
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .filter_map(|t| db.enrich(t))
            .collect();
        tickets.sort_by(|a, b| {
            a.ticket
                .timestamp
                .cmp(&b.ticket.timestamp)
                .then(a.ticket.id.cmp(&b.ticket.id))
        });
        Ok(tickets)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EnrichedTicket>> {
        let db = self.db.inner.read().await;
        Ok(db.tickets.get(&id).and_then(|t| db.enrich(t)))
    }

    async fn insert(&self, ticket: &Ticket) -> StoreResult<()> {
        let mut db = self.db.inner.write().await;
        let pair = TicketFilter::for_pair(ticket.event_id, ticket.owner_id.clone());
        if db.tickets.contains_key(&ticket.id) || db.tickets.values().any(|t| pair.matches(t)) {
            return Err(StoreError::Duplicate(format!(
                "ticket for event {} and owner {}",
                ticket.event_id, ticket.owner_id
            )));
        }
        db.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, updates: &[TicketUpdate]) -> StoreResult<u64> {
        let mut db = self.db.inner.write().await;
        let Some(current) = db.tickets.get(&id) else {
            return Ok(0);
        };
        match apply_all(current, updates, TicketUpdate::apply) {
            Some(next) => {
                db.tickets.insert(id, next);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn record_scan(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut db = self.db.inner.write().await;
        match db.tickets.get_mut(&id) {
            Some(ticket) if ticket.scan_count < ticket.max_scan_count => {
                ticket.scan_count += 1;
                ticket.last_scan_time = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<u64> {
        Ok(u64::from(self.db.inner.write().await.tickets.remove(&id).is_some()))
    }

    async fn delete_for_event(&self, event_id: Uuid) -> StoreResult<u64> {
        let mut db = self.db.inner.write().await;
        let before = db.tickets.len();
        db.tickets.retain(|_, t| t.event_id != event_id);
        Ok((before - db.tickets.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map};

    fn event() -> Event {
        Event {
            id: Uuid::new_v4(),
            name: "Semi Formal".into(),
            description: String::new(),
            img_urls: vec![],
            location: "Gym".into(),
            address: String::new(),
            start_timestamp: Utc::now(),
            end_timestamp: Utc::now(),
            custom_fields_schema: json!({}),
        }
    }

    fn user(id: &str, student_number: &str) -> User {
        User {
            id: id.into(),
            admin: false,
            superadmin: false,
            student_number: student_number.into(),
            full_name: id.to_uppercase(),
            pfp_url: String::new(),
        }
    }

    fn ticket(event_id: Uuid, owner: &str) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            owner_id: owner.into(),
            event_id,
            timestamp: Utc::now(),
            scan_count: 0,
            last_scan_time: None,
            max_scan_count: 1,
            custom_fields: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_ticket_pair_is_unique() {
        let db = MemoryDatabase::new();
        let tickets = db.ticket_store();
        let event_id = Uuid::new_v4();

        tickets.insert(&ticket(event_id, "alice")).await.unwrap();
        let err = tickets.insert(&ticket(event_id, "alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        tickets.insert(&ticket(event_id, "bob")).await.unwrap();
        assert_eq!(tickets.count(&TicketFilter::for_event(event_id)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unjoinable_tickets_are_hidden_from_reads() {
        let db = MemoryDatabase::new();
        let ev = event();
        db.event_store().insert(&ev).await.unwrap();
        db.user_store().insert(&user("alice", "1")).await.unwrap();

        let t = ticket(ev.id, "alice");
        db.ticket_store().insert(&t).await.unwrap();
        assert!(db.ticket_store().get(t.id).await.unwrap().is_some());

        db.remove_user("alice").await;
        assert!(db.ticket_store().get(t.id).await.unwrap().is_none());
        assert!(db.ticket_store().find(&TicketFilter::default()).await.unwrap().is_empty());
        assert_eq!(db.ticket_store().count(&TicketFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_identical_update_modifies_nothing() {
        let db = MemoryDatabase::new();
        let t = ticket(Uuid::new_v4(), "alice");
        db.ticket_store().insert(&t).await.unwrap();

        let store = db.ticket_store();
        assert_eq!(store.update(t.id, &[TicketUpdate::ScanCount(0)]).await.unwrap(), 0);
        assert_eq!(store.update(t.id, &[TicketUpdate::ScanCount(1)]).await.unwrap(), 1);
        assert_eq!(store.update(Uuid::new_v4(), &[TicketUpdate::ScanCount(1)]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_student_number_is_unique() {
        let db = MemoryDatabase::new();
        let users = db.user_store();
        users.insert(&user("alice", "100")).await.unwrap();
        users.insert(&user("bob", "200")).await.unwrap();

        assert!(matches!(
            users.insert(&user("carol", "100")).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            users
                .update("bob", &[UserUpdate::StudentNumber("100".into())])
                .await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_for_event_only_touches_that_event() {
        let db = MemoryDatabase::new();
        let tickets = db.ticket_store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        tickets.insert(&ticket(a, "alice")).await.unwrap();
        tickets.insert(&ticket(a, "bob")).await.unwrap();
        tickets.insert(&ticket(b, "alice")).await.unwrap();

        assert_eq!(tickets.delete_for_event(a).await.unwrap(), 2);
        assert_eq!(tickets.delete_for_event(a).await.unwrap(), 0);
        assert_eq!(db.raw_tickets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_record_scan_stops_at_maximum() {
        let db = MemoryDatabase::new();
        let store = db.ticket_store();
        let t = ticket(Uuid::new_v4(), "alice");
        store.insert(&t).await.unwrap();
        let at = Utc::now();

        assert_eq!(store.record_scan(t.id, at).await.unwrap(), 1);
        assert_eq!(store.record_scan(t.id, at).await.unwrap(), 0);
        assert_eq!(store.record_scan(Uuid::new_v4(), at).await.unwrap(), 0);

        let stored = &db.raw_tickets().await[0];
        assert_eq!(stored.scan_count, 1);
        assert_eq!(stored.last_scan_time, Some(at));
    }
}
