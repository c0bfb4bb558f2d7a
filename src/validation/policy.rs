//! Field update policy.
//!
//! Incoming partial updates arrive as JSON objects. Each entity kind turns
//! them into its closed set of update variants here; a key with no variant
//! rejects the whole update before anything is written.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{CustomFieldKey, EventUpdate, Ticket, TicketUpdate, UserUpdate};
use crate::utils::error::AppError;
use crate::validation::CustomFieldsSchema;

fn not_allowed(key: &str) -> AppError {
    warn!(key, "rejected update of non-editable field");
    AppError::EditNotAllowed(format!("field '{key}' cannot be edited"))
}

fn string(key: &str, value: &Value) -> Result<String, AppError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| AppError::invalid_field(key, "expected a string"))
}

fn boolean(key: &str, value: &Value) -> Result<bool, AppError> {
    value
        .as_bool()
        .ok_or_else(|| AppError::invalid_field(key, "expected a boolean"))
}

fn count(key: &str, value: &Value) -> Result<i32, AppError> {
    let n = value
        .as_i64()
        .ok_or_else(|| AppError::invalid_field(key, "expected an integer"))?;
    let n = i32::try_from(n).map_err(|_| AppError::invalid_field(key, "integer out of range"))?;
    if n < 0 {
        return Err(AppError::invalid_field(key, "must not be negative"));
    }
    Ok(n)
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, AppError> {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| AppError::invalid_field(key, "expected a list of strings"))
}

/// Parses an RFC 3339 timestamp such as `2024-05-01T18:00:00Z`.
pub fn timestamp(key: &str, value: &Value) -> Result<DateTime<Utc>, AppError> {
    let raw = value.as_str().ok_or_else(|| {
        warn!(key, "could not parse timestamp as string");
        AppError::invalid_field(key, "expected an RFC 3339 timestamp string")
    })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            warn!(key, error = %e, "could not parse timestamp as RFC 3339");
            AppError::invalid_field(key, format!("could not parse timestamp as RFC 3339: {e}"))
        })
}

/// # Errors
///
/// `EditNotAllowed` for keys outside the event whitelist (including
/// `custom_fields_schema`), `InvalidFieldValue` for badly typed values.
pub fn event_updates(updates: &Map<String, Value>) -> Result<Vec<EventUpdate>, AppError> {
    updates
        .iter()
        .map(|(key, value)| {
            Ok(match key.as_str() {
                "name" => EventUpdate::Name(string(key, value)?),
                "description" => EventUpdate::Description(string(key, value)?),
                "img_urls" => EventUpdate::ImageUrls(string_list(key, value)?),
                "location" => EventUpdate::Location(string(key, value)?),
                "address" => EventUpdate::Address(string(key, value)?),
                "start_timestamp" => EventUpdate::StartTimestamp(timestamp(key, value)?),
                "end_timestamp" => EventUpdate::EndTimestamp(timestamp(key, value)?),
                _ => return Err(not_allowed(key)),
            })
        })
        .collect()
}

/// # Errors
///
/// `EditNotAllowed` for keys outside the user whitelist (including `id`),
/// `InvalidFieldValue` for badly typed values.
pub fn user_updates(updates: &Map<String, Value>) -> Result<Vec<UserUpdate>, AppError> {
    updates
        .iter()
        .map(|(key, value)| {
            Ok(match key.as_str() {
                "admin" => UserUpdate::Admin(boolean(key, value)?),
                "superadmin" => UserUpdate::SuperAdmin(boolean(key, value)?),
                "student_number" => UserUpdate::StudentNumber(string(key, value)?),
                "full_name" => UserUpdate::FullName(string(key, value)?),
                "pfp_url" => UserUpdate::ProfilePicUrl(string(key, value)?),
                _ => return Err(not_allowed(key)),
            })
        })
        .collect()
}

/// Resolves a ticket update against the ticket's current state and the
/// custom fields schema of its event.
///
/// Keys outside the static whitelist are accepted only when the schema marks
/// them editable; they are then addressed inside the custom fields object and
/// the resulting object is checked against the full schema.
///
/// # Errors
///
/// `EditNotAllowed` for any other key; `InvalidFieldValue` for badly typed
/// values, custom values that break their declaration, or a resulting scan
/// count above the resulting maximum.
pub fn ticket_updates(
    current: &Ticket,
    schema: &CustomFieldsSchema,
    updates: &Map<String, Value>,
) -> Result<Vec<TicketUpdate>, AppError> {
    let resolved = updates
        .iter()
        .map(|(key, value)| {
            Ok(match key.as_str() {
                "scanCount" => TicketUpdate::ScanCount(count(key, value)?),
                "lastScanTime" => TicketUpdate::LastScanTime(timestamp(key, value)?),
                "maxScanCount" => TicketUpdate::MaxScanCount(count(key, value)?),
                other if schema.is_editable(other) => TicketUpdate::CustomField {
                    key: CustomFieldKey::new(other),
                    value: value.clone(),
                },
                _ => return Err(not_allowed(key)),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let mut projected = current.clone();
    for update in &resolved {
        update.apply(&mut projected);
    }
    schema.check_fields(
        &projected.custom_fields,
        resolved.iter().filter_map(|update| match update {
            TicketUpdate::CustomField { key, .. } => Some(key.as_str()),
            _ => None,
        }),
    )?;
    if projected.scan_count > projected.max_scan_count {
        return Err(AppError::invalid_field(
            "scanCount",
            format!(
                "scan count {} exceeds the maximum of {}",
                projected.scan_count, projected.max_scan_count
            ),
        ));
    }

    Ok(resolved)
}
