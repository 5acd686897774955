use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Durations a service may be offered in, in minutes.
pub const ALLOWED_DURATIONS: [u32; 6] = [30, 60, 90, 120, 180, 240];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SalonBeauty,
    HealthWellness,
    Education,
    HomeServices,
    Fitness,
    Technology,
    Business,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SalonBeauty => "salon_beauty",
            Category::HealthWellness => "health_wellness",
            Category::Education => "education",
            Category::HomeServices => "home_services",
            Category::Fitness => "fitness",
            Category::Technology => "technology",
            Category::Business => "business",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "salon_beauty" => Category::SalonBeauty,
            "health_wellness" => Category::HealthWellness,
            "education" => Category::Education,
            "home_services" => Category::HomeServices,
            "fitness" => Category::Fitness,
            "technology" => Category::Technology,
            "business" => Category::Business,
            _ => Category::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub provider_id: String,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub price_cents: i64,
    pub duration_minutes: u32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Provider-editable fields of a service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDraft {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub duration_minutes: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ServiceDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("service name must not be empty".into()));
        }
        if self.price_cents < 0 {
            return Err(AppError::Validation("price must not be negative".into()));
        }
        if !ALLOWED_DURATIONS.contains(&self.duration_minutes) {
            return Err(AppError::Validation(format!(
                "unsupported duration {} (allowed: {:?})",
                self.duration_minutes, ALLOWED_DURATIONS
            )));
        }
        Ok(())
    }
}
