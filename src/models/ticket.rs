use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Event, User};

pub const DEFAULT_MAX_SCAN_COUNT: i32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    #[serde(rename = "eventID")]
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "scanCount")]
    pub scan_count: i32,
    #[serde(rename = "lastScanTime")]
    pub last_scan_time: Option<DateTime<Utc>>,
    #[serde(rename = "maxScanCount")]
    pub max_scan_count: i32,
    #[serde(rename = "customFields")]
    pub custom_fields: Map<String, Value>,
}

/// A ticket joined with copies of its event and owner, as read at query time.
/// The embedded copies are for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    #[serde(rename = "eventData")]
    pub event_data: Event,
    #[serde(rename = "ownerData")]
    pub owner_data: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    #[serde(rename = "eventID")]
    pub event_id: Uuid,
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    #[serde(rename = "maxScanCount", default)]
    pub max_scan_count: Option<i32>,
    #[serde(rename = "customFields", default)]
    pub custom_fields: Map<String, Value>,
}

/// Restricts a ticket listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TicketFilter {
    pub event: Option<Uuid>,
    pub owner: Option<String>,
}

impl TicketFilter {
    pub fn for_event(event: Uuid) -> Self {
        Self {
            event: Some(event),
            owner: None,
        }
    }

    pub fn for_pair(event: Uuid, owner: impl Into<String>) -> Self {
        Self {
            event: Some(event),
            owner: Some(owner.into()),
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.event.map_or(true, |e| e == ticket.event_id)
            && self.owner.as_deref().map_or(true, |o| o == ticket.owner_id)
    }
}

/// Name of a custom field the owning event's schema declares editable.
/// Only the update policy constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomFieldKey(String);

impl CustomFieldKey {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dotted path of the field inside the stored ticket.
    pub fn path(&self) -> String {
        format!("customFields.{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TicketUpdate {
    ScanCount(i32),
    LastScanTime(DateTime<Utc>),
    MaxScanCount(i32),
    CustomField { key: CustomFieldKey, value: Value },
}

impl TicketUpdate {
    pub fn apply(&self, ticket: &mut Ticket) {
        match self {
            TicketUpdate::ScanCount(v) => ticket.scan_count = *v,
            TicketUpdate::LastScanTime(v) => ticket.last_scan_time = Some(*v),
            TicketUpdate::MaxScanCount(v) => ticket.max_scan_count = *v,
            TicketUpdate::CustomField { key, value } => {
                ticket
                    .custom_fields
                    .insert(key.as_str().to_string(), value.clone());
            }
        }
    }
}

/// Result of presenting a ticket at an entry gate.
#[derive(Debug, Clone, Serialize)]
pub struct TicketScan {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ticketData")]
    pub ticket_data: EnrichedTicket,
    pub processed: bool,
    #[serde(rename = "noProcessReason", skip_serializing_if = "Option::is_none")]
    pub no_process_reason: Option<String>,
}
