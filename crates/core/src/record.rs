//! Persisted form of a scenario.
//!
//! Mirrors the `scenarios` table column for column. Handler options stay
//! serialized here; [`ScenarioBuilder`](crate::builder::ScenarioBuilder)
//! parses them when turning a record into a runnable [`Scenario`](crate::scenario::Scenario).

use chrono::NaiveTime;
use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// A row from the `scenarios` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioRecord {
    pub id: DbId,
    pub title: String,
    pub handler: String,
    /// Serialized JSON object; `None` means no options.
    pub handler_options: Option<String>,
    pub priority: i32,
    pub date_start: Option<Timestamp>,
    pub date_end: Option<Timestamp>,
    /// Weekday indices, 0 = Sunday.
    pub week_days: Option<Vec<i16>>,
    pub hour_start: Option<NaiveTime>,
    pub hour_end: Option<NaiveTime>,
    pub display_limit: Option<i32>,
    pub display_count: i32,
    pub display_date_last: Option<Timestamp>,
    pub display_timeout_ms: Option<i64>,
}

/// DTO for inserting a new scenario row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScenarioRecord {
    pub title: String,
    pub handler: String,
    pub handler_options: Option<String>,
    pub priority: i32,
    pub date_start: Option<Timestamp>,
    pub date_end: Option<Timestamp>,
    pub week_days: Option<Vec<i16>>,
    pub hour_start: Option<NaiveTime>,
    pub hour_end: Option<NaiveTime>,
    pub display_limit: Option<i32>,
    pub display_timeout_ms: Option<i64>,
}

impl ScenarioRecord {
    /// Materialize a freshly inserted row: zero displays, never shown.
    pub fn from_new(id: DbId, new: NewScenarioRecord) -> Self {
        Self {
            id,
            title: new.title,
            handler: new.handler,
            handler_options: new.handler_options,
            priority: new.priority,
            date_start: new.date_start,
            date_end: new.date_end,
            week_days: new.week_days,
            hour_start: new.hour_start,
            hour_end: new.hour_end,
            display_limit: new.display_limit,
            display_count: 0,
            display_date_last: None,
            display_timeout_ms: new.display_timeout_ms,
        }
    }
}
