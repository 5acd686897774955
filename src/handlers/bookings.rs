use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus, Transition};
use crate::services::lifecycle::{self, NewBooking};
use crate::state::AppState;

// POST /api/bookings
pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let (booking, event) = {
        let mut db = state.db();
        lifecycle::create_booking(&mut db, &actor, &req, &state.config.scheduling)?
    };
    state.emit(event);
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown booking status {raw:?}")))?,
        ),
        None => None,
    };

    let db = state.db();
    Ok(Json(lifecycle::list_bookings(&db, &actor, status)?))
}

// GET /api/bookings/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db();
    Ok(Json(lifecycle::get_booking(&db, &actor, &id)?))
}

#[derive(Deserialize, Default)]
pub struct NotesBody {
    pub provider_notes: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub booking: Booking,
    pub deleted: bool,
    pub reopened: Vec<String>,
    pub kept_closed: Vec<String>,
}

fn apply(
    state: &AppState,
    actor: &Actor,
    id: &str,
    transition: Transition,
    notes: Option<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = {
        let mut db = state.db();
        lifecycle::transition(&mut db, actor, id, transition, notes.as_deref())?
    };
    state.emit(outcome.event);

    Ok(Json(TransitionResponse {
        booking: outcome.booking,
        deleted: outcome.deleted,
        reopened: outcome.release.reopened,
        kept_closed: outcome.release.kept_closed,
    }))
}

fn notes(body: Option<Json<NotesBody>>) -> Option<String> {
    body.and_then(|Json(b)| b.provider_notes)
}

// POST /api/bookings/:id/accept
pub async fn accept(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<TransitionResponse>, AppError> {
    apply(&state, &actor, &id, Transition::Accept, notes(body))
}

// POST /api/bookings/:id/reject
pub async fn reject(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<TransitionResponse>, AppError> {
    apply(&state, &actor, &id, Transition::Reject, notes(body))
}

// POST /api/bookings/:id/complete
pub async fn complete(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<TransitionResponse>, AppError> {
    apply(&state, &actor, &id, Transition::Complete, notes(body))
}

// POST /api/bookings/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    apply(&state, &actor, &id, Transition::Cancel, None)
}
