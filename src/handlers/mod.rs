use axum::response::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod events;
pub mod tickets;
pub mod users;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "frasertickets-api",
    };

    success(payload, "Health check successful")
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::ValidationError(format!("'{raw}' is not a valid id")))
}

/// Decodes a request body, reporting failures in the API error envelope.
pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::ValidationError(e.to_string()))
}

pub(crate) fn parse_updates(body: Value) -> Result<serde_json::Map<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::ValidationError(
            "update body must be a JSON object".to_string(),
        )),
    }
}
