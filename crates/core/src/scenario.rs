//! Runtime scenario value, its schedule window, and the admin draft used to
//! create new scenarios.
//!
//! A [`Scenario`] is what displays receive inside a `runScenario` payload, so
//! its serde shape doubles as the wire format (camelCase, timeout in
//! milliseconds).

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Handler kind whose presentation content is compiled from the message
/// template.
pub const HANDLER_MESSAGE: &str = "message";

/// Handler option key holding the compiled presentation content.
pub const OPTION_CONTENT: &str = "content";

/// Highest valid weekday index (0 = Sunday, 6 = Saturday).
pub const MAX_WEEKDAY: u8 = 6;

/// Display limit applied to admin-created scenarios that do not set one.
pub const DEFAULT_CREATED_DISPLAY_LIMIT: i32 = 1;

/// Kind-specific options of a scenario handler.
pub type HandlerOptions = Map<String, Value>;

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Date, weekday and hour constraints bounding when a scenario is eligible.
///
/// Every bound is optional; an unset bound never excludes a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleWindow {
    #[serde(default)]
    pub start_date: Option<Timestamp>,
    #[serde(default)]
    pub end_date: Option<Timestamp>,
    /// Weekday indices, 0 = Sunday.
    #[serde(default)]
    pub week_days: Option<BTreeSet<u8>>,
    #[serde(default)]
    pub hour_start: Option<NaiveTime>,
    #[serde(default)]
    pub hour_end: Option<NaiveTime>,
}

/// A schedulable content unit, ready to be pushed to displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: DbId,
    #[serde(default)]
    pub title: String,
    pub handler: String,
    #[serde(default)]
    pub handler_options: HandlerOptions,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub schedule: ScheduleWindow,
    #[serde(default)]
    pub display_limit: Option<i32>,
    #[serde(default)]
    pub display_count: i32,
    /// How long the scenario stays on screen; `None` uses the configured
    /// default.
    #[serde(
        default,
        rename = "timeout",
        with = "duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_timeout: Option<Duration>,
}

impl Scenario {
    /// Return a copy with `overrides` merged over the top-level fields.
    ///
    /// Keys use the wire names (`title`, `handlerOptions`, `timeout`, ...);
    /// an override replaces the whole field. The `id` is never overridden.
    pub fn with_overrides(&self, overrides: &Map<String, Value>) -> Result<Scenario, CoreError> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }

        let mut merged = serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("scenario serialization failed: {e}")))?;

        if let Value::Object(fields) = &mut merged {
            for (key, value) in overrides {
                if key != "id" {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }

        serde_json::from_value(merged)
            .map_err(|e| CoreError::Validation(format!("invalid scenario overrides: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Draft (admin creation input)
// ---------------------------------------------------------------------------

/// Scenario fields submitted by an administrator through `createScenario`.
///
/// Accepts camelCase names, and the snake_case column names used by older
/// admin pages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDraft {
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub handler: String,
    #[serde(default, alias = "handler_options")]
    pub handler_options: Option<HandlerOptions>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default, alias = "date_start")]
    pub start_date: Option<Timestamp>,
    #[serde(default, alias = "date_end")]
    pub end_date: Option<Timestamp>,
    #[serde(default, alias = "week_days")]
    pub week_days: Option<BTreeSet<u8>>,
    #[serde(default, alias = "hour_start")]
    pub hour_start: Option<NaiveTime>,
    #[serde(default, alias = "hour_end")]
    pub hour_end: Option<NaiveTime>,
    #[serde(default, alias = "display_limit")]
    pub display_limit: Option<i32>,
    /// Display timeout in milliseconds.
    #[serde(default, alias = "display_timeout_ms")]
    pub timeout: Option<u64>,
}

/// Validate an admin draft before it is persisted.
pub fn validate_draft(draft: &ScenarioDraft) -> Result<(), CoreError> {
    if draft.handler.trim().is_empty() {
        return Err(CoreError::Validation(
            "scenario handler must not be empty".to_string(),
        ));
    }

    if let Some(days) = &draft.week_days {
        validate_week_days(days)?;
    }

    if let (Some(start), Some(end)) = (draft.start_date, draft.end_date) {
        if start > end {
            return Err(CoreError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
    }

    if let Some(limit) = draft.display_limit {
        if limit < 0 {
            return Err(CoreError::Validation(format!(
                "display limit must not be negative, got {limit}"
            )));
        }
    }

    if draft.timeout == Some(0) {
        return Err(CoreError::Validation(
            "display timeout must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validate that every weekday index is within `0..=6`.
pub fn validate_week_days(days: &BTreeSet<u8>) -> Result<(), CoreError> {
    match days.iter().find(|d| **d > MAX_WEEKDAY) {
        Some(day) => Err(CoreError::Validation(format!(
            "weekday {day} is out of range, expected 0 (Sunday) to {MAX_WEEKDAY} (Saturday)"
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// `Option<Duration>` as an optional integer number of milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> Scenario {
        Scenario {
            id: 7,
            title: "Lobby welcome".to_string(),
            handler: "iframe".to_string(),
            handler_options: json!({"url": "https://example.org"})
                .as_object()
                .cloned()
                .unwrap(),
            priority: 2,
            schedule: ScheduleWindow::default(),
            display_limit: Some(3),
            display_count: 1,
            display_timeout: Some(Duration::from_secs(20)),
        }
    }

    #[test]
    fn wire_format_is_camel_case_with_millisecond_timeout() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["handlerOptions"]["url"], "https://example.org");
        assert_eq!(value["displayLimit"], 3);
        assert_eq!(value["timeout"], 20_000);
        assert!(value["schedule"]["weekDays"].is_null());
    }

    #[test]
    fn unset_timeout_is_omitted() {
        let mut scenario = sample();
        scenario.display_timeout = None;
        let value = serde_json::to_value(scenario).unwrap();
        assert!(value.get("timeout").is_none());
    }

    #[test]
    fn overrides_replace_fields_but_keep_id() {
        let overrides = json!({
            "id": 99,
            "title": "Override",
            "timeout": 5000,
            "handlerOptions": {"url": "https://other.example"}
        });
        let merged = sample()
            .with_overrides(overrides.as_object().unwrap())
            .unwrap();

        assert_eq!(merged.id, 7);
        assert_eq!(merged.title, "Override");
        assert_eq!(merged.display_timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.handler_options["url"], "https://other.example");
        assert_eq!(merged.priority, 2);
    }

    #[test]
    fn invalid_override_value_is_a_validation_error() {
        let overrides = json!({"priority": "high"});
        let result = sample().with_overrides(overrides.as_object().unwrap());
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn draft_accepts_snake_case_columns() {
        let draft: ScenarioDraft = serde_json::from_value(json!({
            "handler": "message",
            "handler_options": {"message": "Hello"},
            "week_days": [1, 2],
            "display_limit": 4
        }))
        .unwrap();

        assert_eq!(draft.handler_options.unwrap()["message"], "Hello");
        assert_eq!(draft.week_days, Some(BTreeSet::from([1, 2])));
        assert_eq!(draft.display_limit, Some(4));
    }

    #[test]
    fn draft_requires_handler() {
        let draft = ScenarioDraft::default();
        assert_matches!(validate_draft(&draft), Err(CoreError::Validation(_)));
    }

    #[test]
    fn draft_rejects_inverted_dates() {
        let draft = ScenarioDraft {
            handler: "message".to_string(),
            start_date: Some(Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert_matches!(validate_draft(&draft), Err(CoreError::Validation(_)));
    }

    #[test]
    fn draft_rejects_zero_timeout() {
        let draft = ScenarioDraft {
            handler: "message".to_string(),
            timeout: Some(0),
            ..Default::default()
        };
        assert_matches!(validate_draft(&draft), Err(CoreError::Validation(_)));
    }

    #[test]
    fn week_days_out_of_range_rejected() {
        assert!(validate_week_days(&BTreeSet::from([0, 6])).is_ok());
        assert_matches!(
            validate_week_days(&BTreeSet::from([3, 7])),
            Err(CoreError::Validation(_))
        );
    }
}
