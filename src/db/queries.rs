use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::time::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};
use crate::models::{
    AvailabilityRange, AvailabilityUnit, Booking, BookingStatus, Category, Role, Service,
    UnitFilter, User,
};

fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn fmt_time(t: &NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_date_col(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("corrupt date column {s:?}: {e}"))
}

fn parse_time_col(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| anyhow::anyhow!("corrupt time column {s:?}: {e}"))
}

fn parse_ts_col(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("corrupt timestamp column {s:?}: {e}"))
}

/// True when `err` is a SQLite UNIQUE/CHECK/FOREIGN KEY violation.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ── Users ──

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, display_name, role FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, display_name, role)) => {
            let role = Role::parse(&role)
                .ok_or_else(|| anyhow::anyhow!("unknown role {role:?} for user {id}"))?;
            Ok(Some(User {
                id,
                display_name,
                role,
            }))
        }
        None => Ok(None),
    }
}

pub fn save_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, display_name, role) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
           display_name = excluded.display_name,
           role = excluded.role",
        params![user.id, user.display_name, user.role.as_str()],
    )?;
    Ok(())
}

// ── Services ──

const SERVICE_COLUMNS: &str = "id, provider_id, name, category, description, price_cents, \
     duration_minutes, is_active, created_at, updated_at";

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let category: String = row.get(3)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(Service {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        category: Category::parse(&category),
        description: row.get(4)?,
        price_cents: row.get(5)?,
        duration_minutes: row.get(6)?,
        is_active: row.get::<_, i32>(7)? != 0,
        created_at: parse_ts_col(&created_at)?,
        updated_at: parse_ts_col(&updated_at)?,
    })
}

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, provider_id, name, category, description, price_cents, duration_minutes, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            service.id,
            service.provider_id,
            service.name,
            service.category.as_str(),
            service.description,
            service.price_cents,
            service.duration_minutes,
            service.is_active as i32,
            fmt_ts(&service.created_at),
            fmt_ts(&service.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET name = ?1, category = ?2, description = ?3, price_cents = ?4,
           duration_minutes = ?5, is_active = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            service.name,
            service.category.as_str(),
            service.description,
            service.price_cents,
            service.duration_minutes,
            service.is_active as i32,
            fmt_ts(&service.updated_at),
            service.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_service(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services(
    conn: &Connection,
    provider_id: &str,
    active_only: bool,
) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services
         WHERE provider_id = ?1 AND (?2 = 0 OR is_active = 1)
         ORDER BY created_at DESC, name ASC"
    ))?;

    let rows = stmt.query_map(params![provider_id, active_only as i32], |row| {
        Ok(parse_service_row(row))
    })?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn count_bookings_for_service(conn: &Connection, service_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE service_id = ?1",
        params![service_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Availability ──

const UNIT_COLUMNS: &str =
    "a.id, a.provider_id, a.service_id, a.date, a.start_time, a.end_time, a.is_open";

fn parse_unit_row(row: &rusqlite::Row) -> anyhow::Result<AvailabilityUnit> {
    let date: String = row.get(3)?;
    let start_time: String = row.get(4)?;
    let end_time: String = row.get(5)?;
    Ok(AvailabilityUnit {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        service_id: row.get(2)?,
        date: parse_date_col(&date)?,
        start_time: parse_time_col(&start_time)?,
        end_time: parse_time_col(&end_time)?,
        is_open: row.get::<_, i32>(6)? != 0,
    })
}

/// Exact-tuple existence check backing idempotent generation.
pub fn unit_exists(
    conn: &Connection,
    provider_id: &str,
    service_id: Option<&str>,
    date: &NaiveDate,
    start_time: &NaiveTime,
    end_time: &NaiveTime,
    exclude_id: Option<&str>,
) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM availability
         WHERE provider_id = ?1 AND service_id IS ?2 AND date = ?3
           AND start_time = ?4 AND end_time = ?5 AND (?6 IS NULL OR id != ?6)",
        params![
            provider_id,
            service_id,
            fmt_date(date),
            fmt_time(start_time),
            fmt_time(end_time),
            exclude_id,
        ],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn insert_unit(conn: &Connection, unit: &AvailabilityUnit) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO availability (id, provider_id, service_id, date, start_time, end_time, is_open)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            unit.id,
            unit.provider_id,
            unit.service_id,
            fmt_date(&unit.date),
            fmt_time(&unit.start_time),
            fmt_time(&unit.end_time),
            unit.is_open as i32,
        ],
    )?;
    Ok(())
}

pub fn get_unit(conn: &Connection, id: &str) -> anyhow::Result<Option<AvailabilityUnit>> {
    let result = conn.query_row(
        &format!("SELECT {UNIT_COLUMNS} FROM availability a WHERE a.id = ?1"),
        params![id],
        |row| Ok(parse_unit_row(row)),
    );

    match result {
        Ok(unit) => Ok(Some(unit?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_units(
    conn: &Connection,
    provider_id: &str,
    filter: &UnitFilter,
) -> anyhow::Result<Vec<AvailabilityUnit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {UNIT_COLUMNS} FROM availability a
         LEFT JOIN services s ON s.id = a.service_id
         WHERE a.provider_id = ?1
           AND (?2 IS NULL OR a.service_id = ?2)
           AND (?3 IS NULL OR a.date >= ?3)
           AND (?4 IS NULL OR a.date <= ?4)
           AND (?5 = 0 OR (a.is_open = 1 AND (a.service_id IS NULL OR s.is_active = 1)))
         ORDER BY a.date ASC, a.start_time ASC, a.end_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            provider_id,
            filter.service_id,
            filter.from.as_ref().map(fmt_date),
            filter.to.as_ref().map(fmt_date),
            filter.open_only as i32,
        ],
        |row| Ok(parse_unit_row(row)),
    )?;

    let mut units = vec![];
    for row in rows {
        units.push(row??);
    }
    Ok(units)
}

/// Every unit of a provider on a date, paired with its service's current duration.
pub fn units_for_provider_date(
    conn: &Connection,
    provider_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Vec<(AvailabilityUnit, Option<u32>)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {UNIT_COLUMNS}, s.duration_minutes FROM availability a
         LEFT JOIN services s ON s.id = a.service_id
         WHERE a.provider_id = ?1 AND a.date = ?2
         ORDER BY a.start_time ASC"
    ))?;

    let rows = stmt.query_map(params![provider_id, fmt_date(date)], |row| {
        let duration: Option<u32> = row.get(7)?;
        Ok(parse_unit_row(row).map(|unit| (unit, duration)))
    })?;

    let mut units = vec![];
    for row in rows {
        units.push(row??);
    }
    Ok(units)
}

/// Open units whose stored length may exceed their service's duration.
pub fn open_units_with_duration(
    conn: &Connection,
    provider_id: Option<&str>,
) -> anyhow::Result<Vec<(AvailabilityUnit, Option<u32>)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {UNIT_COLUMNS}, s.duration_minutes FROM availability a
         LEFT JOIN services s ON s.id = a.service_id
         WHERE a.is_open = 1 AND (?1 IS NULL OR a.provider_id = ?1)
         ORDER BY a.provider_id, a.date, a.start_time"
    ))?;

    let rows = stmt.query_map(params![provider_id], |row| {
        let duration: Option<u32> = row.get(7)?;
        Ok(parse_unit_row(row).map(|unit| (unit, duration)))
    })?;

    let mut units = vec![];
    for row in rows {
        units.push(row??);
    }
    Ok(units)
}

pub fn set_unit_open(conn: &Connection, id: &str, is_open: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE availability SET is_open = ?1 WHERE id = ?2",
        params![is_open as i32, id],
    )?;
    Ok(count > 0)
}

pub fn delete_unit(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM availability WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// Open units of inactive services are not offered, so they do not count.
pub fn availability_range(
    conn: &Connection,
    provider_id: &str,
    service_id: Option<&str>,
    from: &NaiveDate,
) -> anyhow::Result<AvailabilityRange> {
    let (earliest, latest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(a.date), MAX(a.date) FROM availability a
         LEFT JOIN services s ON s.id = a.service_id
         WHERE a.provider_id = ?1 AND (?2 IS NULL OR a.service_id = ?2)
           AND a.date >= ?3 AND a.is_open = 1
           AND (a.service_id IS NULL OR s.is_active = 1)",
        params![provider_id, service_id, fmt_date(from)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(AvailabilityRange {
        earliest_date: earliest.as_deref().map(parse_date_col).transpose()?,
        latest_date: latest.as_deref().map(parse_date_col).transpose()?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer_id, provider_id, service_id, availability_id, date, \
     start_time, end_time, price_cents, status, customer_notes, provider_notes, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date: String = row.get(5)?;
    let start_time: String = row.get(6)?;
    let end_time: String = row.get(7)?;
    let status: String = row.get(9)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        provider_id: row.get(2)?,
        service_id: row.get(3)?,
        availability_id: row.get(4)?,
        date: parse_date_col(&date)?,
        start_time: parse_time_col(&start_time)?,
        end_time: parse_time_col(&end_time)?,
        price_cents: row.get(8)?,
        status: BookingStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status {status:?}"))?,
        customer_notes: row.get(10)?,
        provider_notes: row.get(11)?,
        created_at: parse_ts_col(&created_at)?,
        updated_at: parse_ts_col(&updated_at)?,
    })
}

fn collect_bookings(
    stmt: &mut rusqlite::Statement,
    params: impl rusqlite::Params,
) -> anyhow::Result<Vec<Booking>> {
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;
    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, provider_id, service_id, availability_id, date, start_time, end_time,
           price_cents, status, customer_notes, provider_notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.customer_id,
            booking.provider_id,
            booking.service_id,
            booking.availability_id,
            fmt_date(&booking.date),
            fmt_time(&booking.start_time),
            fmt_time(&booking.end_time),
            booking.price_cents,
            booking.status.as_str(),
            booking.customer_notes,
            booking.provider_notes,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Active bookings holding an availability unit (at most one by index).
pub fn find_active_booking(
    conn: &Connection,
    availability_id: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE availability_id = ?1 AND status IN ('pending', 'confirmed')"
        ),
        params![availability_id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn active_bookings_for_provider_date(
    conn: &Connection,
    provider_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE provider_id = ?1 AND date = ?2 AND status IN ('pending', 'confirmed')
         ORDER BY start_time ASC"
    ))?;
    collect_bookings(&mut stmt, params![provider_id, fmt_date(date)])
}

pub fn list_bookings_for_customer(
    conn: &Connection,
    customer_id: &str,
    status: Option<BookingStatus>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE customer_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY date ASC, start_time ASC"
    ))?;
    collect_bookings(&mut stmt, params![customer_id, status.map(|s| s.as_str())])
}

pub fn list_bookings_for_provider(
    conn: &Connection,
    provider_id: &str,
    status: Option<BookingStatus>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE provider_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY date ASC, start_time ASC"
    ))?;
    collect_bookings(&mut stmt, params![provider_id, status.map(|s| s.as_str())])
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    provider_notes: Option<&str>,
    updated_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, provider_notes = COALESCE(?2, provider_notes), updated_at = ?3
         WHERE id = ?4",
        params![status.as_str(), provider_notes, fmt_ts(updated_at), id],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Slot locks ──

pub fn insert_lock(conn: &Connection, booking_id: &str, availability_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO slot_locks (booking_id, availability_id) VALUES (?1, ?2)",
        params![booking_id, availability_id],
    )?;
    Ok(())
}

pub fn locks_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT availability_id FROM slot_locks WHERE booking_id = ?1 ORDER BY availability_id",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| row.get::<_, String>(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Number of locks on a unit held by bookings other than `exclude_booking`.
pub fn count_other_locks(
    conn: &Connection,
    availability_id: &str,
    exclude_booking: &str,
) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM slot_locks WHERE availability_id = ?1 AND booking_id != ?2",
        params![availability_id, exclude_booking],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_locks(conn: &Connection, availability_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM slot_locks WHERE availability_id = ?1",
        params![availability_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_locks_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM slot_locks WHERE booking_id = ?1",
        params![booking_id],
    )?;
    Ok(count)
}
