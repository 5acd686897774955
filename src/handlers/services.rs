use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::errors::AppError;
use crate::models::{Actor, Service, ServiceDraft};
use crate::services::catalog;
use crate::state::AppState;

// GET /api/providers/:id/services
pub async fn list_for_provider(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.db();
    Ok(Json(catalog::list_active_services(&db, &provider_id)?))
}

// GET /api/services
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.db();
    Ok(Json(catalog::list_services(&db, &actor)?))
}

// POST /api/services
pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(draft): Json<ServiceDraft>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let db = state.db();
    let service = catalog::create_service(&db, &actor, &draft)?;
    Ok((StatusCode::CREATED, Json(service)))
}

// GET /api/services/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let db = state.db();
    Ok(Json(catalog::get_service(&db, &id)?))
}

// PUT /api/services/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(draft): Json<ServiceDraft>,
) -> Result<Json<Service>, AppError> {
    let db = state.db();
    Ok(Json(catalog::update_service(&db, &actor, &id, &draft)?))
}

// DELETE /api/services/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut db = state.db();
    catalog::delete_service(&mut db, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
