pub mod availability;
pub mod catalog;
pub mod conflict;
pub mod lifecycle;
pub mod notify;
pub mod slots;
