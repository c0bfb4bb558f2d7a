use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use frasertickets_server::config::Config;
use frasertickets_server::engine::Engine;
use frasertickets_server::routes::create_routes;
use frasertickets_server::store::MemoryDatabase;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = Config::from_lookup(|_| None);
    create_routes(Engine::in_memory(&MemoryDatabase::new()), &config)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Creates an event with an editable shirt size and one user, returning the
/// event id.
async fn seed(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/events",
        Some(json!({
            "custom_fields_schema": {
                "properties": {
                    "shirtSize": { "editable": true, "enum": ["S", "M", "L"], "type": "string" }
                },
                "type": "object"
            },
            "end_timestamp": "2024-06-01T23:00:00Z",
            "name": "Grad Night",
            "start_timestamp": "2024-06-01T18:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        app,
        Method::POST,
        "/users",
        Some(json!({ "full_name": "Alice", "id": "alice", "student_number": "100001" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_ticket_flow_over_http() {
    let app = app();
    let event_id = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets",
        Some(json!({
            "customFields": { "shirtSize": "M" },
            "eventID": event_id,
            "ownerID": "alice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let ticket_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/tickets/{ticket_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ownerID"], "alice");
    assert_eq!(body["data"]["ownerData"]["full_name"], "Alice");
    assert_eq!(body["data"]["eventData"]["name"], "Grad Night");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/tickets/{ticket_id}"),
        Some(json!({ "shirtSize": "L" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/tickets/search?event={event_id}&owner=alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["customFields"]["shirtSize"], "L");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/tickets/count?event={event_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);

    let (status, body) = send(&app, Method::POST, &format!("/tickets/{ticket_id}/scan"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], true);

    let (status, body) = send(&app, Method::POST, &format!("/tickets/{ticket_id}/scan"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], false);
    assert!(body["data"]["noProcessReason"].is_string());

    let (status, _) = send(&app, Method::DELETE, &format!("/events/{event_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/tickets/{ticket_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_schema_violations_are_reported() {
    let app = app();
    let event_id = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets",
        Some(json!({
            "customFields": { "shirtSize": "XL" },
            "eventID": event_id,
            "ownerID": "alice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "SCHEMA_VALIDATION_FAILED");
    assert_eq!(body["error"]["details"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app();
    let event_id = seed(&app).await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/tickets",
        Some(json!({ "eventID": event_id, "ownerID": "alice" })),
    )
    .await;
    let ticket_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets",
        Some(json!({ "eventID": event_id, "ownerID": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/tickets/{ticket_id}"),
        Some(json!({ "owner": "other-user" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "EDIT_NOT_ALLOWED");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/tickets/{ticket_id}"),
        Some(json!({ "scanCount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NO_MODIFICATION");

    let (status, body) = send(&app, Method::GET, "/tickets/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, Method::GET, "/users/student-number/100001", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().get("strict-transport-security").is_none());
}
