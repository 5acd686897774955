use rusqlite::Connection;
use serde::Deserialize;

use crate::config::SchedulingConfig;
use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::time::now_timestamp;
use crate::models::{
    Actor, Booking, BookingEvent, BookingEventKind, BookingStatus, Service, Transition,
};
use crate::services::conflict::{self, Release};

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub availability_id: String,
    /// Required when the unit is a general slot; must match the unit's service otherwise.
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub customer_notes: Option<String>,
}

/// Create a `pending` booking for a customer on an availability unit.
///
/// Admission, the booking insert and the sibling lock cascade share one write
/// transaction. A second request for the same unit sees it closed and gets
/// `SlotUnavailable`.
pub fn create_booking(
    conn: &mut Connection,
    actor: &Actor,
    req: &NewBooking,
    cfg: &SchedulingConfig,
) -> Result<(Booking, BookingEvent), AppError> {
    let customer_id = actor.customer_id()?;

    let tx = db::write_tx(conn)?;

    let unit = queries::get_unit(&tx, &req.availability_id)?.ok_or_else(|| {
        AppError::SlotUnavailable(format!("availability {} does not exist", req.availability_id))
    })?;
    let service = resolve_service(&tx, &unit.provider_id, unit.service_id.as_deref(), req)?;

    let candidate = conflict::admit(&tx, &unit, &service, cfg.end_policy)?;

    let now = now_timestamp();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        provider_id: unit.provider_id.clone(),
        service_id: service.id.clone(),
        availability_id: Some(unit.id.clone()),
        date: unit.date,
        start_time: candidate.start,
        end_time: candidate.end,
        price_cents: service.price_cents,
        status: BookingStatus::Pending,
        customer_notes: req.customer_notes.clone(),
        provider_notes: None,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = queries::insert_booking(&tx, &booking) {
        if queries::is_constraint_violation(&e) {
            return Err(AppError::SlotUnavailable(format!(
                "availability {} already has an active booking",
                unit.id
            )));
        }
        return Err(e.into());
    }

    let locked = conflict::lock_cascade(&tx, &booking.id, &unit, &candidate)?;
    tx.commit()?;

    tracing::info!(
        booking = %booking.id,
        customer = %booking.customer_id,
        provider = %booking.provider_id,
        date = %booking.date,
        start = %booking.start_time,
        end = %booking.end_time,
        locked = locked.len(),
        "booking created"
    );

    let event = BookingEvent::new(BookingEventKind::Created, &booking);
    Ok((booking, event))
}

fn resolve_service(
    conn: &Connection,
    provider_id: &str,
    unit_service: Option<&str>,
    req: &NewBooking,
) -> Result<Service, AppError> {
    let service_id = match (unit_service, req.service_id.as_deref()) {
        (Some(on_unit), Some(requested)) if on_unit != requested => {
            return Err(AppError::Validation(format!(
                "availability {} belongs to another service",
                req.availability_id
            )));
        }
        (Some(on_unit), _) => on_unit,
        (None, Some(requested)) => requested,
        (None, None) => {
            return Err(AppError::Validation(
                "service_id is required for a general availability slot".into(),
            ));
        }
    };

    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
    if service.provider_id != provider_id {
        return Err(AppError::Validation(format!(
            "service {service_id} is not offered by this provider"
        )));
    }
    if !service.is_active {
        return Err(AppError::Validation(format!(
            "service {service_id} is not accepting bookings"
        )));
    }
    Ok(service)
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The booking as it stood after the transition. For a customer cancel this is
    /// the last state before the row was removed.
    pub booking: Booking,
    pub deleted: bool,
    pub release: Release,
    pub event: BookingEvent,
}

/// Apply `transition` to a booking on behalf of `actor`.
///
/// Provider transitions (accept, reject, complete) require the owning provider;
/// cancel requires the owning customer. Rejection and cancellation release the
/// units the booking locked. Cancellation then deletes the booking as the final
/// write of the transaction.
pub fn transition(
    conn: &mut Connection,
    actor: &Actor,
    booking_id: &str,
    transition: Transition,
    provider_notes: Option<&str>,
) -> Result<TransitionOutcome, AppError> {
    let tx = db::write_tx(conn)?;

    let mut booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    match transition {
        Transition::Cancel => {
            if actor.customer_id()? != booking.customer_id {
                return Err(AppError::Permission(
                    "only the booking's customer may cancel it".into(),
                ));
            }
        }
        Transition::Accept | Transition::Reject | Transition::Complete => {
            if actor.provider_id()? != booking.provider_id {
                return Err(AppError::Permission(
                    "only the booking's provider may do this".into(),
                ));
            }
        }
    }

    let target = transition.target(booking.status).ok_or_else(|| {
        if booking.status.is_terminal() {
            AppError::IllegalTransition(format!(
                "booking {} is already {}",
                booking.id,
                booking.status.as_str()
            ))
        } else {
            AppError::IllegalTransition(format!(
                "cannot {} a {} booking",
                transition.as_str(),
                booking.status.as_str()
            ))
        }
    })?;

    let now = now_timestamp();
    let notes = match transition {
        Transition::Cancel => None,
        _ => provider_notes,
    };

    let release = match transition {
        Transition::Reject | Transition::Cancel => conflict::release(&tx, &booking)?,
        Transition::Accept | Transition::Complete => Release::default(),
    };

    let deleted = transition == Transition::Cancel;
    if deleted {
        queries::delete_booking(&tx, &booking.id)?;
    } else {
        queries::update_booking_status(&tx, &booking.id, target, notes, &now)?;
    }
    tx.commit()?;

    let from = booking.status;
    booking.status = target;
    booking.updated_at = now;
    if let Some(n) = notes {
        booking.provider_notes = Some(n.to_string());
    }

    tracing::info!(
        booking = %booking.id,
        from = from.as_str(),
        to = target.as_str(),
        deleted,
        reopened = release.reopened.len(),
        kept_closed = release.kept_closed.len(),
        "booking {}",
        transition.as_str()
    );

    let kind = match transition {
        Transition::Accept => BookingEventKind::Accepted,
        Transition::Reject => BookingEventKind::Rejected,
        Transition::Complete => BookingEventKind::Completed,
        Transition::Cancel => BookingEventKind::Cancelled,
    };
    let event = BookingEvent::new(kind, &booking);

    Ok(TransitionOutcome {
        booking,
        deleted,
        release,
        event,
    })
}

/// A booking visible to `actor`: its customer or its provider.
pub fn get_booking(conn: &Connection, actor: &Actor, booking_id: &str) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    let visible = match actor {
        Actor::Customer(id) => *id == booking.customer_id,
        Actor::Provider(id) => *id == booking.provider_id,
    };
    if !visible {
        return Err(AppError::Permission(
            "booking belongs to someone else".into(),
        ));
    }
    Ok(booking)
}

pub fn list_bookings(
    conn: &Connection,
    actor: &Actor,
    status: Option<BookingStatus>,
) -> Result<Vec<Booking>, AppError> {
    let bookings = match actor {
        Actor::Customer(id) => queries::list_bookings_for_customer(conn, id, status)?,
        Actor::Provider(id) => queries::list_bookings_for_provider(conn, id, status)?,
    };
    Ok(bookings)
}
