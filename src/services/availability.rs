use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Actor, AvailabilityRange, AvailabilityUnit, Booking, UnitFilter};
use crate::services::conflict;

pub fn list_units(
    conn: &Connection,
    provider_id: &str,
    filter: &UnitFilter,
) -> Result<Vec<AvailabilityUnit>, AppError> {
    Ok(queries::list_units(conn, provider_id, filter)?)
}

pub fn get_unit(conn: &Connection, unit_id: &str) -> Result<AvailabilityUnit, AppError> {
    queries::get_unit(conn, unit_id)?
        .ok_or_else(|| AppError::NotFound(format!("availability {unit_id}")))
}

/// The pending or confirmed booking holding a unit, if any.
pub fn find_active_booking(conn: &Connection, unit_id: &str) -> Result<Option<Booking>, AppError> {
    Ok(queries::find_active_booking(conn, unit_id)?)
}

/// Earliest and latest dates from `from` on that still have an open unit.
pub fn availability_range(
    conn: &Connection,
    provider_id: &str,
    service_id: Option<&str>,
    from: &NaiveDate,
) -> Result<AvailabilityRange, AppError> {
    Ok(queries::availability_range(conn, provider_id, service_id, from)?)
}

/// Open or close a unit by hand. Units held closed by a booking's lock cannot
/// be touched until that booking releases them, and a unit never reopens while
/// an active booking overlaps its interval.
pub fn set_open(
    conn: &mut Connection,
    actor: &Actor,
    unit_id: &str,
    is_open: bool,
) -> Result<AvailabilityUnit, AppError> {
    let tx = db::write_tx(conn)?;

    let mut unit = owned_unit(&tx, actor, unit_id)?;
    let locks = queries::count_locks(&tx, unit_id)?;
    if locks > 0 {
        return Err(AppError::Conflict(format!(
            "availability {unit_id} is held by {locks} booking(s)"
        )));
    }
    if is_open {
        let duration = match unit.service_id.as_deref() {
            Some(service_id) => queries::get_service(&tx, service_id)?.map(|s| s.duration_minutes),
            None => None,
        };
        let span = unit.computed_span(duration);
        let active = queries::active_bookings_for_provider_date(&tx, &unit.provider_id, &unit.date)?;
        if let Some(booking) = conflict::find_conflict(&active, &span) {
            return Err(AppError::Conflict(format!(
                "availability {unit_id} overlaps active booking {}",
                booking.id
            )));
        }
    }

    queries::set_unit_open(&tx, unit_id, is_open)?;
    tx.commit()?;

    tracing::info!(unit = unit_id, is_open, "availability toggled");
    unit.is_open = is_open;
    Ok(unit)
}

/// Remove a unit no active booking references. Historic bookings keep their
/// snapshot and lose the link.
pub fn delete_unit(conn: &mut Connection, actor: &Actor, unit_id: &str) -> Result<(), AppError> {
    let tx = db::write_tx(conn)?;

    owned_unit(&tx, actor, unit_id)?;
    if let Some(booking) = queries::find_active_booking(&tx, unit_id)? {
        return Err(AppError::Conflict(format!(
            "availability {unit_id} has active booking {}",
            booking.id
        )));
    }

    queries::delete_unit(&tx, unit_id)?;
    tx.commit()?;

    tracing::info!(unit = unit_id, "availability deleted");
    Ok(())
}

fn owned_unit(conn: &Connection, actor: &Actor, unit_id: &str) -> Result<AvailabilityUnit, AppError> {
    let provider_id = actor.provider_id()?;
    let unit = get_unit(conn, unit_id)?;
    if unit.provider_id != provider_id {
        return Err(AppError::Permission(format!(
            "availability {unit_id} belongs to another provider"
        )));
    }
    Ok(unit)
}
