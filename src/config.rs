use std::env;

/// How a booking's end time is derived from its unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingEndPolicy {
    /// `unit.start + service.duration` at booking time.
    ServiceDuration,
    /// The unit's own stored end time.
    UnitEnd,
}

impl BookingEndPolicy {
    pub fn parse(s: &str) -> Self {
        match s {
            "unit_end" => BookingEndPolicy::UnitEnd,
            _ => BookingEndPolicy::ServiceDuration,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    pub end_policy: BookingEndPolicy,
    /// Upper bound on the date range of a single generation request.
    pub max_generation_days: i64,
    /// Assumed duration when re-splitting general units that have no service.
    pub legacy_slot_minutes: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            end_policy: BookingEndPolicy::ServiceDuration,
            max_generation_days: 366,
            legacy_slot_minutes: 60,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub notify_webhook_url: String,
    pub notify_webhook_secret: String,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
            notify_webhook_secret: env::var("NOTIFY_WEBHOOK_SECRET").unwrap_or_default(),
            scheduling: SchedulingConfig {
                end_policy: env::var("BOOKING_END_POLICY")
                    .map(|v| BookingEndPolicy::parse(&v))
                    .unwrap_or(defaults.end_policy),
                max_generation_days: env::var("MAX_GENERATION_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_generation_days),
                legacy_slot_minutes: env::var("LEGACY_SLOT_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.legacy_slot_minutes),
            },
        }
    }
}
