pub mod admin;
pub mod auth;
pub mod availability;
pub mod bookings;
pub mod events;
pub mod health;
pub mod services;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/providers/:id/services",
            get(services::list_for_provider),
        )
        .route(
            "/api/services",
            get(services::list_mine).post(services::create),
        )
        .route(
            "/api/services/:id",
            get(services::get)
                .put(services::update)
                .delete(services::delete),
        )
        .route("/api/availability/generate", post(availability::generate))
        .route(
            "/api/providers/:id/availability",
            get(availability::list_units),
        )
        .route(
            "/api/providers/:id/availability/range",
            get(availability::range),
        )
        .route("/api/availability/:id/toggle", post(availability::toggle))
        .route(
            "/api/availability/:id",
            axum::routing::delete(availability::delete),
        )
        .route("/api/bookings", get(bookings::list).post(bookings::create))
        .route("/api/bookings/:id", get(bookings::get))
        .route("/api/bookings/:id/accept", post(bookings::accept))
        .route("/api/bookings/:id/reject", post(bookings::reject))
        .route("/api/bookings/:id/complete", post(bookings::complete))
        .route("/api/bookings/:id/cancel", post(bookings::cancel))
        .route("/api/events", get(events::stream))
        .route("/api/admin/users", post(admin::upsert_user))
        .route("/api/admin/split-units", post(admin::split_units))
        .with_state(state)
}
