use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use super::{parse_body, parse_updates};
use crate::engine::Engine;
use crate::models::User;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_users(State(engine): State<Engine>) -> Result<Response, AppError> {
    let users = engine.list_users().await?;
    Ok(success(users, "Users retrieved"))
}

/// Only run during sign-up. The caller supplies the identity provider subject
/// as the id.
pub async fn create_user(
    State(engine): State<Engine>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let user: User = parse_body(body)?;
    let user = engine.create_user(user).await?;
    Ok(created(user, "User created"))
}

pub async fn get_user(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = engine.get_user(&id).await?;
    Ok(success(user, "User retrieved"))
}

pub async fn get_user_by_student_number(
    State(engine): State<Engine>,
    Path(student_number): Path<String>,
) -> Result<Response, AppError> {
    let user = engine.get_user_by_student_number(&student_number).await?;
    Ok(success(user, "User retrieved"))
}

pub async fn update_user(
    State(engine): State<Engine>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    engine.update_user(&id, &parse_updates(body)?).await?;
    Ok(empty_success("User updated"))
}
