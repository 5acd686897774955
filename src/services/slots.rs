use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::SchedulingConfig;
use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Actor, AvailabilityUnit, RepeatPattern, Span};

/// Cut `[start, end)` into back-to-back `duration_minutes` spans. A trailing
/// remainder shorter than the duration is dropped.
pub fn split_window(start: NaiveTime, end: NaiveTime, duration_minutes: u32) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = start;
    while let Some(span) = Span::starting_at(cursor, duration_minutes) {
        if span.end > end {
            break;
        }
        spans.push(span);
        cursor = span.end;
    }
    spans
}

/// Dates in `[start, end]` selected by `pattern`. `Once` yields only `start`.
pub fn qualifying_dates(start: NaiveDate, end: NaiveDate, pattern: &RepeatPattern) -> Vec<NaiveDate> {
    if *pattern == RepeatPattern::Once {
        return vec![start];
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| pattern.includes(*d))
        .collect()
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// `None` emits one general unit spanning the whole window per date.
    pub service_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub repeat: RepeatPattern,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub dates: usize,
    pub created: Vec<AvailabilityUnit>,
    pub skipped_existing: usize,
}

/// Expand a provider's declared window into units. Re-running the same request
/// creates nothing new.
pub fn generate(
    conn: &mut Connection,
    actor: &Actor,
    req: &GenerateRequest,
    cfg: &SchedulingConfig,
) -> Result<GenerationReport, AppError> {
    let provider_id = actor.provider_id()?;

    let end_date = req.end_date.unwrap_or(req.start_date);
    if (end_date - req.start_date).num_days() >= cfg.max_generation_days {
        return Err(AppError::Validation(format!(
            "date range exceeds {} days",
            cfg.max_generation_days
        )));
    }

    let tx = db::write_tx(conn)?;

    let duration = match &req.service_id {
        Some(service_id) => {
            let service = queries::get_service(&tx, service_id)?
                .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
            if service.provider_id != provider_id {
                return Err(AppError::Permission(
                    "cannot publish availability for another provider's service".into(),
                ));
            }
            if !service.is_active {
                return Err(AppError::Validation(format!(
                    "service {service_id} is inactive"
                )));
            }
            Some(service.duration_minutes)
        }
        None => None,
    };

    let spans = match duration {
        Some(d) => split_window(req.window_start, req.window_end, d),
        None if req.window_end > req.window_start => {
            vec![Span::new(req.window_start, req.window_end)]
        }
        None => Vec::new(),
    };

    let dates = qualifying_dates(req.start_date, end_date, &req.repeat);
    let mut report = GenerationReport {
        dates: dates.len(),
        ..Default::default()
    };

    for date in &dates {
        for span in &spans {
            let exists = queries::unit_exists(
                &tx,
                provider_id,
                req.service_id.as_deref(),
                date,
                &span.start,
                &span.end,
                None,
            )?;
            if exists {
                report.skipped_existing += 1;
                continue;
            }

            let unit = AvailabilityUnit {
                id: uuid::Uuid::new_v4().to_string(),
                provider_id: provider_id.to_string(),
                service_id: req.service_id.clone(),
                date: *date,
                start_time: span.start,
                end_time: span.end,
                is_open: true,
            };
            queries::insert_unit(&tx, &unit)?;
            report.created.push(unit);
        }
    }

    tx.commit()?;

    tracing::info!(
        provider = provider_id,
        service = ?req.service_id,
        dates = report.dates,
        created = report.created.len(),
        skipped = report.skipped_existing,
        "generated availability"
    );
    Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    pub processed: usize,
    pub created: usize,
    pub deleted: usize,
}

/// Re-split open units that are longer than their service's duration into
/// duration-aligned units. Each long unit is handled in its own transaction; the
/// original is deleted last, once its replacements exist.
pub fn split_legacy_units(
    conn: &mut Connection,
    provider_id: Option<&str>,
    cfg: &SchedulingConfig,
) -> Result<SplitReport, AppError> {
    let candidates = queries::open_units_with_duration(conn, provider_id)?;
    let mut report = SplitReport::default();

    for (unit, duration) in candidates {
        let duration = duration.unwrap_or(cfg.legacy_slot_minutes);
        if unit.stored_span().minutes() <= i64::from(duration) {
            continue;
        }

        let tx = db::write_tx(conn)?;

        // The unit may have been booked or removed since the scan.
        match queries::get_unit(&tx, &unit.id)? {
            Some(current) if current.is_open => {}
            _ => continue,
        }
        if queries::find_active_booking(&tx, &unit.id)?.is_some() {
            continue;
        }

        let spans = split_window(unit.start_time, unit.end_time, duration);
        let mut created = 0;
        for span in &spans {
            let exists = queries::unit_exists(
                &tx,
                &unit.provider_id,
                unit.service_id.as_deref(),
                &unit.date,
                &span.start,
                &span.end,
                Some(&unit.id),
            )?;
            if exists {
                continue;
            }
            queries::insert_unit(
                &tx,
                &AvailabilityUnit {
                    id: uuid::Uuid::new_v4().to_string(),
                    provider_id: unit.provider_id.clone(),
                    service_id: unit.service_id.clone(),
                    date: unit.date,
                    start_time: span.start,
                    end_time: span.end,
                    is_open: true,
                },
            )?;
            created += 1;
        }

        if spans.is_empty() {
            continue;
        }
        queries::delete_unit(&tx, &unit.id)?;
        tx.commit()?;

        tracing::info!(
            unit = %unit.id,
            date = %unit.date,
            start = %unit.start_time,
            end = %unit.end_time,
            created,
            "split legacy unit"
        );
        report.processed += 1;
        report.created += created;
        report.deleted += 1;
    }

    Ok(report)
}
