use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::time::now_timestamp;
use crate::models::{Actor, Service, ServiceDraft};

pub fn create_service(
    conn: &Connection,
    actor: &Actor,
    draft: &ServiceDraft,
) -> Result<Service, AppError> {
    let provider_id = actor.provider_id()?;
    draft.validate()?;

    let now = now_timestamp();
    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        provider_id: provider_id.to_string(),
        name: draft.name.trim().to_string(),
        category: draft.category,
        description: draft.description.clone(),
        price_cents: draft.price_cents,
        duration_minutes: draft.duration_minutes,
        is_active: draft.is_active,
        created_at: now,
        updated_at: now,
    };
    queries::insert_service(conn, &service)?;

    tracing::info!(
        service = %service.id,
        provider = provider_id,
        duration = service.duration_minutes,
        "service created"
    );
    Ok(service)
}

/// Replace a service's editable fields. Existing units keep their bounds even
/// when the duration changes.
pub fn update_service(
    conn: &Connection,
    actor: &Actor,
    service_id: &str,
    draft: &ServiceDraft,
) -> Result<Service, AppError> {
    let existing = owned_service(conn, actor, service_id)?;
    draft.validate()?;

    let service = Service {
        name: draft.name.trim().to_string(),
        category: draft.category,
        description: draft.description.clone(),
        price_cents: draft.price_cents,
        duration_minutes: draft.duration_minutes,
        is_active: draft.is_active,
        updated_at: now_timestamp(),
        ..existing
    };
    queries::update_service(conn, &service)?;

    tracing::info!(service = %service.id, active = service.is_active, "service updated");
    Ok(service)
}

/// Delete a service nobody has booked; its units go with it.
pub fn delete_service(conn: &mut Connection, actor: &Actor, service_id: &str) -> Result<(), AppError> {
    let tx = db::write_tx(conn)?;

    owned_service(&tx, actor, service_id)?;
    let referenced = queries::count_bookings_for_service(&tx, service_id)?;
    if referenced > 0 {
        return Err(AppError::Conflict(format!(
            "service {service_id} has {referenced} booking(s); deactivate it instead"
        )));
    }

    queries::delete_service(&tx, service_id)?;
    tx.commit()?;

    tracing::info!(service = service_id, "service deleted");
    Ok(())
}

pub fn get_service(conn: &Connection, service_id: &str) -> Result<Service, AppError> {
    queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))
}

/// Services a provider currently offers for booking.
pub fn list_active_services(conn: &Connection, provider_id: &str) -> Result<Vec<Service>, AppError> {
    Ok(queries::list_services(conn, provider_id, true)?)
}

/// Every service of the calling provider, inactive ones included.
pub fn list_services(conn: &Connection, actor: &Actor) -> Result<Vec<Service>, AppError> {
    let provider_id = actor.provider_id()?;
    Ok(queries::list_services(conn, provider_id, false)?)
}

fn owned_service(conn: &Connection, actor: &Actor, service_id: &str) -> Result<Service, AppError> {
    let provider_id = actor.provider_id()?;
    let service = get_service(conn, service_id)?;
    if service.provider_id != provider_id {
        return Err(AppError::Permission(format!(
            "service {service_id} belongs to another provider"
        )));
    }
    Ok(service)
}
