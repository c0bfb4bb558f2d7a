//! Postgres adapters.
//!
//! Custom fields and schemas live in JSONB columns. The ticket enrichment
//! join is an inner join, so tickets whose event or owner row is missing drop
//! out of reads. Updates carry an `IS DISTINCT FROM` guard so the affected
//! row count only includes rows whose values actually changed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{EventStore, StoreError, StoreResult, TicketStore, UserStore};
use crate::models::{
    EnrichedTicket, Event, EventUpdate, Ticket, TicketFilter, TicketUpdate, User, UserUpdate,
};

const EVENT_COLUMNS: &str = "id, name, description, img_urls, location, address, \
     start_timestamp, end_timestamp, custom_fields_schema";

const USER_COLUMNS: &str = "id, admin, superadmin, student_number, full_name, pfp_url";

const ENRICHED_TICKETS: &str = "SELECT t.id, t.owner_id, t.event_id, t.created_at, \
     t.scan_count, t.last_scan_time, t.max_scan_count, t.custom_fields, \
     to_jsonb(e) AS event_data, to_jsonb(u) AS owner_data \
     FROM tickets t \
     JOIN events e ON e.id = t.event_id \
     JOIN users u ON u.id = t.owner_id";

/// Maps unique-index violations to [`StoreError::Duplicate`].
fn write_error(what: impl Into<String>) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::Duplicate(what.into())
        }
        other => StoreError::Database(other),
    }
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    description: String,
    img_urls: Vec<String>,
    location: String,
    address: String,
    start_timestamp: DateTime<Utc>,
    end_timestamp: DateTime<Utc>,
    custom_fields_schema: Json<Value>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            name: row.name,
            description: row.description,
            img_urls: row.img_urls,
            location: row.location,
            address: row.address,
            start_timestamp: row.start_timestamp,
            end_timestamp: row.end_timestamp,
            custom_fields_schema: row.custom_fields_schema.0,
        }
    }
}

#[derive(FromRow)]
struct TicketRow {
    id: Uuid,
    owner_id: String,
    event_id: Uuid,
    created_at: DateTime<Utc>,
    scan_count: i32,
    last_scan_time: Option<DateTime<Utc>>,
    max_scan_count: i32,
    custom_fields: Json<Map<String, Value>>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            owner_id: row.owner_id,
            event_id: row.event_id,
            timestamp: row.created_at,
            scan_count: row.scan_count,
            last_scan_time: row.last_scan_time,
            max_scan_count: row.max_scan_count,
            custom_fields: row.custom_fields.0,
        }
    }
}

#[derive(FromRow)]
struct EnrichedRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    event_data: Json<Event>,
    owner_data: Json<User>,
}

impl From<EnrichedRow> for EnrichedTicket {
    fn from(row: EnrichedRow) -> Self {
        EnrichedTicket {
            ticket: row.ticket.into(),
            event_data: row.event_data.0,
            owner_data: row.owner_data.0,
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter, alias: &str) {
    qb.push(" WHERE TRUE");
    if let Some(event) = filter.event {
        qb.push(format!(" AND {alias}event_id = ")).push_bind(event);
    }
    if let Some(owner) = &filter.owner {
        qb.push(format!(" AND {alias}owner_id = ")).push_bind(owner.clone());
    }
}

#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_event_value(qb: &mut QueryBuilder<'_, Postgres>, update: &EventUpdate) {
    match update {
        EventUpdate::Name(v)
        | EventUpdate::Description(v)
        | EventUpdate::Location(v)
        | EventUpdate::Address(v) => qb.push_bind(v.clone()),
        EventUpdate::ImageUrls(v) => qb.push_bind(v.clone()),
        EventUpdate::StartTimestamp(v) | EventUpdate::EndTimestamp(v) => qb.push_bind(*v),
    };
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Event::from))
    }

    async fn list(&self) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY start_timestamp, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn insert(&self, event: &Event) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.img_urls)
        .bind(&event.location)
        .bind(&event.address)
        .bind(event.start_timestamp)
        .bind(event.end_timestamp)
        .bind(Json(&event.custom_fields_schema))
        .execute(&self.pool)
        .await
        .map_err(write_error(format!("event {}", event.id)))?;
        Ok(())
    }

    async fn update(&self, id: Uuid, updates: &[EventUpdate]) -> StoreResult<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE events SET ");
        for (i, update) in updates.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(update.key()).push(" = ");
            push_event_value(&mut qb, update);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" AND (");
        for (i, update) in updates.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(update.key()).push(" IS DISTINCT FROM ");
            push_event_value(&mut qb, update);
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_user_value(qb: &mut QueryBuilder<'_, Postgres>, update: &UserUpdate) {
    match update {
        UserUpdate::Admin(v) | UserUpdate::SuperAdmin(v) => qb.push_bind(*v),
        UserUpdate::StudentNumber(v) | UserUpdate::FullName(v) | UserUpdate::ProfilePicUrl(v) => {
            qb.push_bind(v.clone())
        }
    };
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn exists(&self, id: &str) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn student_number_taken(&self, student_number: &str) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE student_number = $1)",
        )
        .bind(student_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_by_student_number(&self, student_number: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE student_number = $1"
        ))
        .bind(student_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(&user.id)
        .bind(user.admin)
        .bind(user.superadmin)
        .bind(&user.student_number)
        .bind(&user.full_name)
        .bind(&user.pfp_url)
        .execute(&self.pool)
        .await
        .map_err(write_error(format!("user {}", user.id)))?;
        Ok(())
    }

    async fn update(&self, id: &str, updates: &[UserUpdate]) -> StoreResult<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        for (i, update) in updates.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(update.key()).push(" = ");
            push_user_value(&mut qb, update);
        }
        qb.push(" WHERE id = ").push_bind(id.to_string()).push(" AND (");
        for (i, update) in updates.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(update.key()).push(" IS DISTINCT FROM ");
            push_user_value(&mut qb, update);
        }
        qb.push(")");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(write_error("student number"))?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A top-level ticket column written by an update.
enum TicketColumn {
    Count(&'static str, i32),
    Time(&'static str, DateTime<Utc>),
}

impl TicketColumn {
    fn push(&self, qb: &mut QueryBuilder<'_, Postgres>, op: &str) {
        match self {
            TicketColumn::Count(name, v) => qb.push(*name).push(op).push_bind(*v),
            TicketColumn::Time(name, v) => qb.push(*name).push(op).push_bind(*v),
        };
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn count(&self, filter: &TicketFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tickets");
        push_filter(&mut qb, filter, "");
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find(&self, filter: &TicketFilter) -> StoreResult<Vec<EnrichedTicket>> {
        let mut qb = QueryBuilder::<Postgres>::new(ENRICHED_TICKETS);
        push_filter(&mut qb, filter, "t.");
        qb.push(" ORDER BY t.created_at, t.id");
        let rows: Vec<EnrichedRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(EnrichedTicket::from).collect())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EnrichedTicket>> {
        let row: Option<EnrichedRow> =
            sqlx::query_as(&format!("{ENRICHED_TICKETS} WHERE t.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(EnrichedTicket::from))
    }

    async fn insert(&self, ticket: &Ticket) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tickets (id, owner_id, event_id, created_at, scan_count, \
             last_scan_time, max_scan_count, custom_fields) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(ticket.id)
        .bind(&ticket.owner_id)
        .bind(ticket.event_id)
        .bind(ticket.timestamp)
        .bind(ticket.scan_count)
        .bind(ticket.last_scan_time)
        .bind(ticket.max_scan_count)
        .bind(Json(&ticket.custom_fields))
        .execute(&self.pool)
        .await
        .map_err(write_error(format!(
            "ticket for event {} and owner {}",
            ticket.event_id, ticket.owner_id
        )))?;
        Ok(())
    }

    async fn update(&self, id: Uuid, updates: &[TicketUpdate]) -> StoreResult<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut scalar = Vec::new();
        let mut custom = Vec::new();
        for update in updates {
            match update {
                TicketUpdate::ScanCount(v) => scalar.push(TicketColumn::Count("scan_count", *v)),
                TicketUpdate::LastScanTime(v) => {
                    scalar.push(TicketColumn::Time("last_scan_time", *v));
                }
                TicketUpdate::MaxScanCount(v) => {
                    scalar.push(TicketColumn::Count("max_scan_count", *v));
                }
                TicketUpdate::CustomField { key, value } => custom.push((key.as_str(), value)),
            }
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tickets SET ");
        for (i, column) in scalar.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            column.push(&mut qb, " = ");
        }
        // All custom field writes merge into the one JSONB column.
        if !custom.is_empty() {
            if !scalar.is_empty() {
                qb.push(", ");
            }
            qb.push("custom_fields = custom_fields || jsonb_build_object(");
            for (i, (key, value)) in custom.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push_bind(key.to_string())
                    .push("::text, ")
                    .push_bind(Json((*value).clone()))
                    .push("::jsonb");
            }
            qb.push(")");
        }

        qb.push(" WHERE id = ").push_bind(id).push(" AND (");
        for (i, column) in scalar.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            column.push(&mut qb, " IS DISTINCT FROM ");
        }
        for (i, (key, value)) in custom.iter().enumerate() {
            if i > 0 || !scalar.is_empty() {
                qb.push(" OR ");
            }
            qb.push("custom_fields -> ")
                .push_bind(key.to_string())
                .push("::text IS DISTINCT FROM ")
                .push_bind(Json((*value).clone()))
                .push("::jsonb");
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn record_scan(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE tickets SET scan_count = scan_count + 1, last_scan_time = $2 \
             WHERE id = $1 AND scan_count < max_scan_count",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_for_event(&self, event_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tickets WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
