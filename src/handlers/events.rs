use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use super::{parse_body, parse_id, parse_updates};
use crate::engine::Engine;
use crate::models::NewEvent;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_events(State(engine): State<Engine>) -> Result<Response, AppError> {
    let events = engine.list_events().await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn create_event(
    State(engine): State<Engine>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let new: NewEvent = parse_body(body)?;
    let event = engine.create_event(new).await?;
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let event = engine.get_event(parse_id(&id)?).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn update_event(
    State(engine): State<Engine>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    engine
        .update_event(parse_id(&id)?, &parse_updates(body)?)
        .await?;
    Ok(empty_success("Event updated"))
}

pub async fn delete_event(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    engine.delete_event(parse_id(&id)?).await?;
    Ok(empty_success("Event and its tickets deleted"))
}
