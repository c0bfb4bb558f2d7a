use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::engine::Engine;
use crate::handlers::{events, health_check, tickets, users};

pub fn create_routes(engine: Engine, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/student-number/:number",
            get(users::get_user_by_student_number),
        )
        .route("/users/:id", get(users::get_user).patch(users::update_user))
        .route(
            "/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route("/tickets/count", get(tickets::count_tickets))
        .route("/tickets/search", get(tickets::search_ticket))
        .route(
            "/tickets/:id",
            get(tickets::get_ticket)
                .patch(tickets::update_ticket)
                .delete(tickets::delete_ticket),
        )
        .route("/tickets/:id/scan", post(tickets::scan_ticket))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config))
        .layer(create_cors_layer(config))
}
