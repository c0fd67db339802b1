use std::collections::HashSet;

use serde::Deserialize;
use time::Date;

use crate::error::AppError;
use crate::store::{iso_date, DayPlan};

/// `?week_start_date=YYYY-MM-DD`; absence is reported by the handler, not the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    #[serde(default, with = "iso_date::option")]
    pub week_start_date: Option<Date>,
}

impl WeekQuery {
    pub fn require(&self) -> Result<Date, AppError> {
        self.week_start_date
            .ok_or_else(|| AppError::validation("week_start_date is required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertPlanRequest {
    #[serde(with = "iso_date")]
    pub week_start_date: Date,
    pub plans: Vec<DayPlan>,
}

impl UpsertPlanRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for day in &self.plans {
            if !(1..=7).contains(&day.day_of_week) {
                return Err(AppError::validation(format!(
                    "day_of_week must be within 1..=7, got {}",
                    day.day_of_week
                )));
            }
            if !seen.insert(day.day_of_week) {
                return Err(AppError::validation(format!(
                    "day_of_week {} given more than once",
                    day.day_of_week
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ShoppingListRequest {
    #[serde(default, with = "iso_date::option")]
    pub week_start_date: Option<Date>,
}
