use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{parse_body, parse_id, parse_updates};
use crate::engine::Engine;
use crate::models::{NewTicket, TicketFilter};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Serialize)]
struct CreatedTicket {
    id: Uuid,
}

#[derive(Serialize)]
struct TicketCount {
    count: u64,
}

#[derive(Deserialize)]
pub struct SearchParams {
    event: Uuid,
    owner: String,
}

pub async fn list_tickets(
    State(engine): State<Engine>,
    Query(filter): Query<TicketFilter>,
) -> Result<Response, AppError> {
    let tickets = engine.list_tickets(&filter).await?;
    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn count_tickets(
    State(engine): State<Engine>,
    Query(filter): Query<TicketFilter>,
) -> Result<Response, AppError> {
    let count = engine.count_tickets(&filter).await?;
    Ok(success(TicketCount { count }, "Tickets counted"))
}

pub async fn search_ticket(
    State(engine): State<Engine>,
    Query(params): Query<SearchParams>,
) -> Result<Response, AppError> {
    let ticket = engine.search_ticket(params.event, &params.owner).await?;
    Ok(success(ticket, "Ticket retrieved"))
}

pub async fn create_ticket(
    State(engine): State<Engine>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let new: NewTicket = parse_body(body)?;
    let id = engine.create_ticket(new).await?;
    Ok(created(CreatedTicket { id }, "Ticket created"))
}

pub async fn get_ticket(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let ticket = engine.get_ticket(parse_id(&id)?).await?;
    Ok(success(ticket, "Ticket retrieved"))
}

pub async fn update_ticket(
    State(engine): State<Engine>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    engine
        .update_ticket(parse_id(&id)?, &parse_updates(body)?)
        .await?;
    Ok(empty_success("Ticket updated"))
}

pub async fn scan_ticket(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let scan = engine.scan_ticket(parse_id(&id)?).await?;
    let message = if scan.processed {
        "Ticket scanned"
    } else {
        "Ticket not processed"
    };
    Ok(success(scan, message))
}

pub async fn delete_ticket(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    engine.delete_ticket(parse_id(&id)?).await?;
    Ok(empty_success("Ticket deleted"))
}
