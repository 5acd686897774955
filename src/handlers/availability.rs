use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::time::{parse_date, parse_time};
use crate::models::{Actor, AvailabilityRange, AvailabilityUnit, RepeatPattern, UnitFilter};
use crate::services::availability;
use crate::services::slots::{self, GenerateRequest, GenerationReport};
use crate::state::AppState;

// POST /api/availability/generate
#[derive(Deserialize)]
pub struct GenerateBody {
    pub service_id: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(default = "once")]
    pub repeat: RepeatPattern,
    pub window_start: String,
    pub window_end: String,
}

fn once() -> RepeatPattern {
    RepeatPattern::Once
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<GenerationReport>), AppError> {
    let req = GenerateRequest {
        service_id: body.service_id,
        start_date: parse_date(&body.start_date)?,
        end_date: body.end_date.as_deref().map(parse_date).transpose()?,
        repeat: body.repeat,
        window_start: parse_time(&body.window_start)?,
        window_end: parse_time(&body.window_end)?,
    };

    let mut db = state.db();
    let report = slots::generate(&mut db, &actor, &req, &state.config.scheduling)?;
    Ok((StatusCode::CREATED, Json(report)))
}

// GET /api/providers/:id/availability
#[derive(Deserialize)]
pub struct UnitsQuery {
    pub service_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub open_only: bool,
}

pub async fn list_units(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<UnitsQuery>,
) -> Result<Json<Vec<AvailabilityUnit>>, AppError> {
    let filter = UnitFilter {
        service_id: query.service_id,
        from: query.from.as_deref().map(parse_date).transpose()?,
        to: query.to.as_deref().map(parse_date).transpose()?,
        open_only: query.open_only,
    };

    let db = state.db();
    Ok(Json(availability::list_units(&db, &provider_id, &filter)?))
}

// GET /api/providers/:id/availability/range
#[derive(Deserialize)]
pub struct RangeQuery {
    pub service_id: Option<String>,
    pub from: Option<String>,
}

pub async fn range(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<AvailabilityRange>, AppError> {
    let from = match query.from.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => chrono::Local::now().date_naive(),
    };

    let db = state.db();
    Ok(Json(availability::availability_range(
        &db,
        &provider_id,
        query.service_id.as_deref(),
        &from,
    )?))
}

// POST /api/availability/:id/toggle
#[derive(Deserialize)]
pub struct ToggleBody {
    pub is_open: bool,
}

pub async fn toggle(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<ToggleBody>,
) -> Result<Json<AvailabilityUnit>, AppError> {
    let mut db = state.db();
    Ok(Json(availability::set_open(&mut db, &actor, &id, body.is_open)?))
}

// DELETE /api/availability/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut db = state.db();
    availability::delete_unit(&mut db, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
