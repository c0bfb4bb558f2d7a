use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::Engine;
use crate::models::{
    EnrichedTicket, NewTicket, Ticket, TicketFilter, TicketScan, DEFAULT_MAX_SCAN_COUNT,
};
use crate::utils::error::AppError;
use crate::validation::{policy, schema, CustomFieldsSchema};

fn ticket_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("ticket {id}"))
}

impl Engine {
    /// Issues a ticket for `owner_id` to `event_id`.
    ///
    /// Checks run in a fixed order so the same request always reports the
    /// same error: duplicate pair, then event and owner existence, then the
    /// custom fields schema.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, `NotFound`, `SchemaValidationFailed`, or
    /// `InvalidFieldValue` for a negative `maxScanCount`.
    pub async fn create_ticket(&self, new: NewTicket) -> Result<Uuid, AppError> {
        let NewTicket {
            event_id,
            owner_id,
            max_scan_count,
            custom_fields,
        } = new;

        let pair = TicketFilter::for_pair(event_id, owner_id.clone());
        if self.tickets.count(&pair).await? > 0 {
            return Err(AppError::AlreadyExists(format!(
                "user '{owner_id}' already holds a ticket for event {event_id}"
            )));
        }

        let event = self
            .events
            .get(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;
        if !self.users.exists(&owner_id).await? {
            return Err(AppError::NotFound(format!("user '{owner_id}'")));
        }

        schema::validate(&event.custom_fields_schema, &custom_fields)?;

        let max_scan_count = max_scan_count.unwrap_or(DEFAULT_MAX_SCAN_COUNT);
        if max_scan_count < 0 {
            return Err(AppError::invalid_field(
                "maxScanCount",
                "must not be negative",
            ));
        }

        let ticket = Ticket {
            id: Uuid::new_v4(),
            owner_id,
            event_id,
            timestamp: Utc::now(),
            scan_count: 0,
            last_scan_time: None,
            max_scan_count,
            custom_fields,
        };
        self.tickets.insert(&ticket).await?;

        info!(ticket_id = %ticket.id, event_id = %event_id, owner_id = %ticket.owner_id, "Ticket created");
        Ok(ticket.id)
    }

    /// # Errors
    ///
    /// `NotFound` when the ticket is missing or its event or owner cannot be
    /// joined.
    pub async fn get_ticket(&self, id: Uuid) -> Result<EnrichedTicket, AppError> {
        self.tickets
            .get(id)
            .await?
            .ok_or_else(|| ticket_not_found(id))
    }

    pub async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<EnrichedTicket>, AppError> {
        Ok(self.tickets.find(filter).await?)
    }

    /// Looks up the ticket a user holds for an event.
    ///
    /// # Errors
    ///
    /// `NotFound` when the user holds none.
    pub async fn search_ticket(
        &self,
        event_id: Uuid,
        owner_id: &str,
    ) -> Result<EnrichedTicket, AppError> {
        self.tickets
            .find(&TicketFilter::for_pair(event_id, owner_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "ticket for event {event_id} and user '{owner_id}'"
                ))
            })
    }

    pub async fn count_tickets(&self, filter: &TicketFilter) -> Result<u64, AppError> {
        Ok(self.tickets.count(filter).await?)
    }

    /// Applies a partial update to a ticket.
    ///
    /// # Errors
    ///
    /// `NotFound`, `EditNotAllowed`, `InvalidFieldValue`, or `NoModification`
    /// when the store reports that nothing changed.
    pub async fn update_ticket(
        &self,
        id: Uuid,
        updates: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let current = self.get_ticket(id).await?;

        // The joined event copy carries the schema; it never changes after
        // the event is created.
        let resolved = {
            let schema = CustomFieldsSchema::compile(&current.event_data.custom_fields_schema)?;
            policy::ticket_updates(&current.ticket, &schema, updates)?
        };
        if self.tickets.update(id, &resolved).await? == 0 {
            return Err(AppError::NoModification(format!("ticket {id}")));
        }

        info!(ticket_id = %id, fields = updates.len(), "Ticket updated");
        Ok(())
    }

    /// Records an entry-gate scan.
    ///
    /// The store only applies the scan while the count is below the maximum,
    /// so concurrent scans cannot push a ticket past its allowance. A refused
    /// scan is returned unprocessed with a reason and leaves the ticket
    /// untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` when the ticket is missing or disappears mid-scan.
    pub async fn scan_ticket(&self, id: Uuid) -> Result<TicketScan, AppError> {
        // Existence check first so a missing ticket is not reported as used up.
        self.get_ticket(id).await?;
        let now = Utc::now();

        let processed = self.tickets.record_scan(id, now).await? > 0;
        let ticket_data = self.get_ticket(id).await?;
        let (scans, max) = (ticket_data.ticket.scan_count, ticket_data.ticket.max_scan_count);

        if !processed {
            warn!(ticket_id = %id, scans, max, "Ticket scan refused");
            return Ok(TicketScan {
                timestamp: now,
                ticket_data,
                processed: false,
                no_process_reason: Some(format!(
                    "ticket has already been scanned {scans} of {max} allowed time(s)"
                )),
            });
        }

        info!(ticket_id = %id, scan = scans, max, "Ticket scanned");
        Ok(TicketScan {
            timestamp: now,
            ticket_data,
            processed: true,
            no_process_reason: None,
        })
    }

    /// # Errors
    ///
    /// `NotFound` when nothing was deleted.
    pub async fn delete_ticket(&self, id: Uuid) -> Result<(), AppError> {
        if self.tickets.delete(id).await? == 0 {
            return Err(ticket_not_found(id));
        }
        info!(ticket_id = %id, "Ticket deleted");
        Ok(())
    }
}
