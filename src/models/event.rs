use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub img_urls: Vec<String>,
    /// Name of the venue.
    pub location: String,
    pub address: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    /// JSON Schema describing the extra fields a ticket for this event carries.
    pub custom_fields_schema: Value,
}

/// Body of an event creation request. The id is assigned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub img_urls: Vec<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub address: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    #[serde(default = "empty_schema")]
    pub custom_fields_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl NewEvent {
    pub fn into_event(self, id: Uuid) -> Event {
        Event {
            id,
            name: self.name,
            description: self.description,
            img_urls: self.img_urls,
            location: self.location,
            address: self.address,
            start_timestamp: self.start_timestamp,
            end_timestamp: self.end_timestamp,
            custom_fields_schema: self.custom_fields_schema,
        }
    }
}

/// A single permitted change to an event. The custom fields schema has no
/// variant: tickets already issued against it would stop conforming.
#[derive(Debug, Clone, PartialEq)]
pub enum EventUpdate {
    Name(String),
    Description(String),
    ImageUrls(Vec<String>),
    Location(String),
    Address(String),
    StartTimestamp(DateTime<Utc>),
    EndTimestamp(DateTime<Utc>),
}

impl EventUpdate {
    /// Wire key of the field this update writes.
    pub fn key(&self) -> &'static str {
        match self {
            EventUpdate::Name(_) => "name",
            EventUpdate::Description(_) => "description",
            EventUpdate::ImageUrls(_) => "img_urls",
            EventUpdate::Location(_) => "location",
            EventUpdate::Address(_) => "address",
            EventUpdate::StartTimestamp(_) => "start_timestamp",
            EventUpdate::EndTimestamp(_) => "end_timestamp",
        }
    }

    pub fn apply(&self, event: &mut Event) {
        match self {
            EventUpdate::Name(v) => event.name = v.clone(),
            EventUpdate::Description(v) => event.description = v.clone(),
            EventUpdate::ImageUrls(v) => event.img_urls = v.clone(),
            EventUpdate::Location(v) => event.location = v.clone(),
            EventUpdate::Address(v) => event.address = v.clone(),
            EventUpdate::StartTimestamp(v) => event.start_timestamp = *v,
            EventUpdate::EndTimestamp(v) => event.end_timestamp = *v,
        }
    }
}
