//! Scenario row model.

use chrono::NaiveTime;
use signage_core::record::ScenarioRecord;
use signage_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `scenarios` table.
#[derive(Debug, Clone, FromRow)]
pub struct ScenarioRow {
    pub id: DbId,
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
    pub display_count: i32,
    pub display_date_last: Option<Timestamp>,
    pub display_timeout_ms: Option<i64>,
}

impl From<ScenarioRow> for ScenarioRecord {
    fn from(row: ScenarioRow) -> Self {
        ScenarioRecord {
            id: row.id,
            title: row.title,
            handler: row.handler,
            handler_options: row.handler_options,
            priority: row.priority,
            date_start: row.date_start,
            date_end: row.date_end,
            week_days: row.week_days,
            hour_start: row.hour_start,
            hour_end: row.hour_end,
            display_limit: row.display_limit,
            display_count: row.display_count,
            display_date_last: row.display_date_last,
            display_timeout_ms: row.display_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_field_for_field() {
        let row = ScenarioRow {
            id: 3,
            title: "Menu".to_string(),
            handler: "iframe".to_string(),
            handler_options: Some(r#"{"url":"https://example.org/menu"}"#.to_string()),
            priority: 2,
            date_start: None,
            date_end: None,
            week_days: Some(vec![1, 5]),
            hour_start: NaiveTime::from_hms_opt(11, 0, 0),
            hour_end: NaiveTime::from_hms_opt(14, 0, 0),
            display_limit: Some(8),
            display_count: 5,
            display_date_last: None,
            display_timeout_ms: Some(30_000),
        };

        let record = ScenarioRecord::from(row.clone());
        assert_eq!(record.id, row.id);
        assert_eq!(record.week_days, row.week_days);
        assert_eq!(record.hour_end, row.hour_end);
        assert_eq!(record.display_limit, Some(8));
        assert_eq!(record.display_timeout_ms, Some(30_000));
    }
}
