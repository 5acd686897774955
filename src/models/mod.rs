pub mod actor;
pub mod availability;
pub mod booking;
pub mod event;
pub mod service;
pub mod time;
pub mod user;

pub use actor::Actor;
pub use availability::{AvailabilityRange, AvailabilityUnit, RepeatPattern, UnitFilter};
pub use booking::{Booking, BookingStatus, Transition};
pub use event::{BookingEvent, BookingEventKind};
pub use service::{Category, Service, ServiceDraft, ALLOWED_DURATIONS};
pub use time::Span;
pub use user::{Role, User};
