use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::booking::{Booking, BookingStatus};
use super::time::hhmm;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingEventKind {
    Created,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl BookingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "created",
            BookingEventKind::Accepted => "accepted",
            BookingEventKind::Rejected => "rejected",
            BookingEventKind::Completed => "completed",
            BookingEventKind::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle event handed to the notification sink after commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub at: NaiveDateTime,
}

impl BookingEvent {
    pub fn new(kind: BookingEventKind, booking: &Booking) -> Self {
        Self {
            kind,
            booking_id: booking.id.clone(),
            customer_id: booking.customer_id.clone(),
            provider_id: booking.provider_id.clone(),
            service_id: booking.service_id.clone(),
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
            at: chrono::Utc::now().naive_utc(),
        }
    }
}
