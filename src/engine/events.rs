use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::Engine;
use crate::models::{Event, NewEvent};
use crate::utils::error::AppError;
use crate::validation::{policy, CustomFieldsSchema};

impl Engine {
    /// # Errors
    ///
    /// `SchemaError` when the custom fields schema is malformed; nothing is
    /// stored in that case.
    pub async fn create_event(&self, new: NewEvent) -> Result<Event, AppError> {
        CustomFieldsSchema::compile(&new.custom_fields_schema)?;

        let event = new.into_event(Uuid::new_v4());
        if event.start_timestamp > event.end_timestamp {
            warn!(event_id = %event.id, "Event starts after it ends");
        }
        self.events.insert(&event).await?;

        info!(event_id = %event.id, name = %event.name, "Event created");
        Ok(event)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Event, AppError> {
        self.events
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {id}")))
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.events.list().await?)
    }

    /// # Errors
    ///
    /// `NotFound`, `EditNotAllowed` (including any attempt to change the
    /// schema), `InvalidFieldValue`, or `NoModification`.
    pub async fn update_event(
        &self,
        id: Uuid,
        updates: &Map<String, Value>,
    ) -> Result<(), AppError> {
        if !self.events.exists(id).await? {
            return Err(AppError::NotFound(format!("event {id}")));
        }

        let resolved = policy::event_updates(updates)?;
        if self.events.update(id, &resolved).await? == 0 {
            return Err(AppError::NoModification(format!("event {id}")));
        }

        info!(event_id = %id, fields = updates.len(), "Event updated");
        Ok(())
    }

    /// Deletes every ticket for the event, then the event itself.
    ///
    /// # Errors
    ///
    /// `NotFound` when there was no event to delete. Tickets removed before
    /// that point stay removed.
    pub async fn delete_event(&self, id: Uuid) -> Result<(), AppError> {
        let tickets = self.tickets.delete_for_event(id).await?;
        if self.events.delete(id).await? == 0 {
            return Err(AppError::NotFound(format!("event {id}")));
        }

        info!(event_id = %id, tickets, "Event deleted");
        Ok(())
    }
}
