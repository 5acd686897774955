use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::check_admin;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::services::slots::{self, SplitReport};
use crate::state::AppState;

// POST /api/admin/users
#[derive(Deserialize)]
pub struct UserRequest {
    pub id: Option<String>,
    pub display_name: String,
    pub role: String,
}

pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let role = Role::parse(body.role.trim()).ok_or_else(|| {
        AppError::Validation(format!("unknown role {:?} (customer or provider)", body.role))
    })?;
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::Validation("display_name must not be empty".into()));
    }

    let user = User {
        id: body
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        display_name: display_name.to_string(),
        role,
    };

    {
        let db = state.db();
        queries::save_user(&db, &user)?;
    }

    tracing::info!(user = %user.id, role = user.role.as_str(), "user saved");
    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/admin/split-units
#[derive(Deserialize, Default)]
pub struct SplitRequest {
    pub provider_id: Option<String>,
}

pub async fn split_units(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<SplitRequest>>,
) -> Result<Json<SplitReport>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let report = {
        let mut db = state.db();
        slots::split_legacy_units(
            &mut db,
            body.provider_id.as_deref(),
            &state.config.scheduling,
        )?
    };

    tracing::info!(
        processed = report.processed,
        created = report.created,
        deleted = report.deleted,
        "legacy units split"
    );
    Ok(Json(report))
}
