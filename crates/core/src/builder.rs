//! Conversion between persisted [`ScenarioRecord`]s and runnable
//! [`Scenario`]s.
//!
//! Reading a record parses its serialized handler options and, for the
//! `message` handler, compiles the presentation content from the message
//! template. Writing goes the other way and drops the compiled content.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::CoreError;
use crate::record::{NewScenarioRecord, ScenarioRecord};
use crate::scenario::{
    validate_draft, HandlerOptions, Scenario, ScenarioDraft, ScheduleWindow, HANDLER_MESSAGE,
    MAX_WEEKDAY, OPTION_CONTENT,
};
use crate::types::DbId;

/// Template used when no template file is configured.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = include_str!("../templates/message.html");

const PLACEHOLDER_MESSAGE: &str = "{{message}}";
const PLACEHOLDER_IMAGE: &str = "{{image}}";
const PLACEHOLDER_VIDEO: &str = "{{video}}";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Malformed handler options for scenario {id}: {reason}")]
    MalformedOptions { id: DbId, reason: String },
}

/// Turns records into scenarios and back.
///
/// Holds the message template, loaded once at startup. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    message_template: Arc<str>,
}

impl ScenarioBuilder {
    /// Create a builder around an already loaded template.
    pub fn new(message_template: impl Into<String>) -> Self {
        Self {
            message_template: Arc::from(message_template.into()),
        }
    }

    /// Load the message template from disk.
    pub fn from_template_file(path: &Path) -> std::io::Result<Self> {
        let template = std::fs::read_to_string(path)?;
        Ok(Self::new(template))
    }

    /// Build the runnable scenario for `record`.
    ///
    /// Fails with [`BuildError::MalformedOptions`] when the stored options are
    /// not a JSON object.
    pub fn record_to_scenario(&self, record: &ScenarioRecord) -> Result<Scenario, BuildError> {
        let mut handler_options = parse_options(record)?;

        if record.handler == HANDLER_MESSAGE {
            let content = self.compile_message(&handler_options);
            handler_options.insert(OPTION_CONTENT.to_string(), Value::String(content));
        }

        Ok(Scenario {
            handler_options,
            ..scalar_fields(record)
        })
    }

    /// Like [`record_to_scenario`](Self::record_to_scenario), but a record with
    /// malformed options degrades to a scenario without options or content.
    pub fn build_or_degrade(&self, record: &ScenarioRecord) -> Scenario {
        match self.record_to_scenario(record) {
            Ok(scenario) => scenario,
            Err(e) => {
                tracing::warn!(
                    scenario_id = record.id,
                    error = %e,
                    "Degrading scenario to no content"
                );
                scalar_fields(record)
            }
        }
    }

    /// Inverse of [`record_to_scenario`](Self::record_to_scenario).
    ///
    /// Compiled `message` content is not persisted; the last display date is
    /// not tracked on the scenario and comes back unset.
    pub fn scenario_to_record(scenario: &Scenario) -> ScenarioRecord {
        let mut options = scenario.handler_options.clone();
        if scenario.handler == HANDLER_MESSAGE {
            options.remove(OPTION_CONTENT);
        }

        ScenarioRecord {
            id: scenario.id,
            title: scenario.title.clone(),
            handler: scenario.handler.clone(),
            handler_options: Some(Value::Object(options).to_string()),
            priority: scenario.priority,
            date_start: scenario.schedule.start_date,
            date_end: scenario.schedule.end_date,
            week_days: scenario
                .schedule
                .week_days
                .as_ref()
                .map(|days| days.iter().map(|d| i16::from(*d)).collect()),
            hour_start: scenario.schedule.hour_start,
            hour_end: scenario.schedule.hour_end,
            display_limit: scenario.display_limit,
            display_count: scenario.display_count,
            display_date_last: None,
            display_timeout_ms: scenario
                .display_timeout
                .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
        }
    }

    /// Validate an admin draft and turn it into an insertable record.
    ///
    /// Unset priority becomes 0; an empty weekday set means "any day".
    pub fn draft_to_record(draft: ScenarioDraft) -> Result<NewScenarioRecord, CoreError> {
        validate_draft(&draft)?;

        let display_timeout_ms = draft
            .timeout
            .map(|ms| {
                i64::try_from(ms).map_err(|_| {
                    CoreError::Validation(format!("display timeout {ms}ms is too large"))
                })
            })
            .transpose()?;

        Ok(NewScenarioRecord {
            title: draft.title,
            handler: draft.handler.trim().to_string(),
            handler_options: Some(Value::Object(draft.handler_options.unwrap_or_default()).to_string()),
            priority: draft.priority.unwrap_or(0),
            date_start: draft.start_date,
            date_end: draft.end_date,
            week_days: draft
                .week_days
                .filter(|days| !days.is_empty())
                .map(|days| days.into_iter().map(i16::from).collect()),
            hour_start: draft.hour_start,
            hour_end: draft.hour_end,
            display_limit: draft.display_limit,
            display_timeout_ms,
        })
    }

    /// Render the message template for `options`.
    ///
    /// The media slot holds a video element when a `video` reference is set,
    /// otherwise an image element when an `image` reference is set, otherwise
    /// nothing.
    pub fn compile_message(&self, options: &HandlerOptions) -> String {
        let message = option_str(options, "message").unwrap_or("");

        let (video, image) = match (option_str(options, "video"), option_str(options, "image")) {
            (Some(src), _) => (video_element(src), String::new()),
            (None, Some(src)) => (String::new(), image_element(src)),
            (None, None) => (String::new(), String::new()),
        };

        render(&self.message_template, message, &image, &video)
    }
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_TEMPLATE)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Every scenario field except handler options, which start empty.
fn scalar_fields(record: &ScenarioRecord) -> Scenario {
    Scenario {
        id: record.id,
        title: record.title.clone(),
        handler: record.handler.clone(),
        handler_options: HandlerOptions::new(),
        priority: record.priority,
        schedule: ScheduleWindow {
            start_date: record.date_start,
            end_date: record.date_end,
            week_days: record.week_days.as_ref().map(|days| {
                days.iter()
                    .filter_map(|d| u8::try_from(*d).ok())
                    .filter(|d| *d <= MAX_WEEKDAY)
                    .collect()
            }),
            hour_start: record.hour_start,
            hour_end: record.hour_end,
        },
        display_limit: record.display_limit,
        display_count: record.display_count,
        display_timeout: record
            .display_timeout_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis),
    }
}

fn parse_options(record: &ScenarioRecord) -> Result<HandlerOptions, BuildError> {
    let Some(raw) = record.handler_options.as_deref() else {
        return Ok(HandlerOptions::new());
    };

    let malformed = |reason: String| BuildError::MalformedOptions {
        id: record.id,
        reason,
    };

    match serde_json::from_str::<Value>(raw).map_err(|e| malformed(e.to_string()))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(HandlerOptions::new()),
        other => Err(malformed(format!("expected a JSON object, got {other}"))),
    }
}

fn option_str<'a>(options: &'a HandlerOptions, key: &str) -> Option<&'a str> {
    options
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn video_element(src: &str) -> String {
    format!(
        r#"<video src="{}" autoplay muted loop playsinline></video>"#,
        escape_attr(src)
    )
}

fn image_element(src: &str) -> String {
    format!(r#"<img src="{}" alt="">"#, escape_attr(src))
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Single-pass placeholder substitution, so substituted values are never
/// themselves scanned for placeholders.
fn render(template: &str, message: &str, image: &str, video: &str) -> String {
    let mut out = String::with_capacity(template.len() + message.len() + image.len() + video.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let substitution = [
            (PLACEHOLDER_MESSAGE, message),
            (PLACEHOLDER_IMAGE, image),
            (PLACEHOLDER_VIDEO, video),
        ]
        .into_iter()
        .find(|(placeholder, _)| tail.starts_with(placeholder));

        match substitution {
            Some((placeholder, value)) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push_str("{{");
                rest = &tail[2..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use assert_matches::assert_matches;
    use chrono::{NaiveTime, TimeZone, Utc};
    use serde_json::json;

    fn options(value: Value) -> HandlerOptions {
        value.as_object().cloned().unwrap()
    }

    fn message_record(raw_options: Option<&str>) -> ScenarioRecord {
        ScenarioRecord::from_new(
            12,
            NewScenarioRecord {
                title: "Notice".to_string(),
                handler: HANDLER_MESSAGE.to_string(),
                handler_options: raw_options.map(str::to_string),
                priority: 1,
                date_start: None,
                date_end: None,
                week_days: None,
                hour_start: None,
                hour_end: None,
                display_limit: None,
                display_timeout_ms: None,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Template compilation
    // -----------------------------------------------------------------------

    #[test]
    fn message_with_image_renders_img_and_no_video() {
        let builder = ScenarioBuilder::default();
        let content = builder.compile_message(&options(json!({
            "message": "Hi",
            "image": "//x/a.png"
        })));

        assert!(content.contains(r#"<img src="//x/a.png""#));
        assert!(content.contains("Hi"));
        assert!(!content.contains("<video"));
        assert!(!content.contains("{{"));
    }

    #[test]
    fn video_takes_precedence_over_image() {
        let builder = ScenarioBuilder::new("[{{video}}|{{image}}]");
        let content = builder.compile_message(&options(json!({
            "video": "//x/clip.mp4",
            "image": "//x/a.png"
        })));

        assert!(content.contains(r#"<video src="//x/clip.mp4""#));
        assert!(!content.contains("<img"));
    }

    #[test]
    fn no_media_leaves_slots_empty() {
        let builder = ScenarioBuilder::new("<p>{{message}}</p>{{image}}{{video}}");
        let content = builder.compile_message(&options(json!({"message": "Closed today"})));
        assert_eq!(content, "<p>Closed today</p>");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let builder = ScenarioBuilder::new("{{message}}/{{image}}/{{unknown}}");
        let content = builder.compile_message(&options(json!({"message": "{{image}}"})));
        assert_eq!(content, "{{image}}//{{unknown}}");
    }

    #[test]
    fn media_reference_is_attribute_escaped() {
        let builder = ScenarioBuilder::new("{{image}}");
        let content = builder.compile_message(&options(json!({"image": "a\"onload=\"x"})));
        assert_eq!(content, r#"<img src="a&quot;onload=&quot;x" alt="">"#);
    }

    // -----------------------------------------------------------------------
    // Record -> scenario
    // -----------------------------------------------------------------------

    #[test]
    fn message_record_gets_compiled_content() {
        let builder = ScenarioBuilder::new("{{message}}");
        let scenario = builder
            .record_to_scenario(&message_record(Some(r#"{"message":"Hello"}"#)))
            .unwrap();

        assert_eq!(scenario.handler_options["content"], "Hello");
        assert_eq!(scenario.handler_options["message"], "Hello");
    }

    #[test]
    fn non_message_handler_has_no_content() {
        let mut record = message_record(Some(r#"{"url":"https://example.org"}"#));
        record.handler = "iframe".to_string();
        let scenario = ScenarioBuilder::default().record_to_scenario(&record).unwrap();
        assert!(scenario.handler_options.get("content").is_none());
    }

    #[test]
    fn missing_or_null_options_parse_as_empty() {
        let builder = ScenarioBuilder::new("x");
        for raw in [None, Some("null")] {
            let mut record = message_record(raw);
            record.handler = "iframe".to_string();
            let scenario = builder.record_to_scenario(&record).unwrap();
            assert!(scenario.handler_options.is_empty());
        }
    }

    #[test]
    fn unparsable_options_are_malformed() {
        let builder = ScenarioBuilder::default();
        assert_matches!(
            builder.record_to_scenario(&message_record(Some("{not json"))),
            Err(BuildError::MalformedOptions { id: 12, .. })
        );
        assert_matches!(
            builder.record_to_scenario(&message_record(Some("[1,2]"))),
            Err(BuildError::MalformedOptions { id: 12, .. })
        );
    }

    #[test]
    fn malformed_options_degrade_to_no_content() {
        let scenario = ScenarioBuilder::default().build_or_degrade(&message_record(Some("{oops")));
        assert_eq!(scenario.id, 12);
        assert_eq!(scenario.handler, HANDLER_MESSAGE);
        assert!(scenario.handler_options.is_empty());
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    #[test]
    fn scenario_round_trip_preserves_fields() {
        let scenario = Scenario {
            id: 42,
            title: "Opening hours".to_string(),
            handler: HANDLER_MESSAGE.to_string(),
            handler_options: options(json!({"message": "Open", "content": "stale"})),
            priority: 4,
            schedule: ScheduleWindow {
                start_date: Some(Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()),
                end_date: Some(Utc.with_ymd_and_hms(2026, 12, 31, 20, 0, 0).unwrap()),
                week_days: Some(BTreeSet::from([1, 2, 3, 4, 5])),
                hour_start: NaiveTime::from_hms_opt(8, 0, 0),
                hour_end: NaiveTime::from_hms_opt(18, 0, 0),
            },
            display_limit: Some(10),
            display_count: 3,
            display_timeout: Some(Duration::from_secs(45)),
        };

        let builder = ScenarioBuilder::new("{{message}}");
        let record = ScenarioBuilder::scenario_to_record(&scenario);
        assert!(!record.handler_options.as_deref().unwrap().contains("stale"));

        let back = builder.record_to_scenario(&record).unwrap();
        assert_eq!(back.id, scenario.id);
        assert_eq!(back.title, scenario.title);
        assert_eq!(back.handler, scenario.handler);
        assert_eq!(back.priority, scenario.priority);
        assert_eq!(back.display_limit, scenario.display_limit);
        assert_eq!(back.display_count, scenario.display_count);
        assert_eq!(back.display_timeout, scenario.display_timeout);
        assert_eq!(back.schedule, scenario.schedule);
        assert_eq!(back.handler_options["message"], "Open");
        assert_eq!(back.handler_options["content"], "Open");
    }

    #[test]
    fn unset_display_limit_stays_unset() {
        let mut record = message_record(None);
        record.display_limit = None;
        let scenario = ScenarioBuilder::default().build_or_degrade(&record);
        assert_eq!(ScenarioBuilder::scenario_to_record(&scenario).display_limit, None);
    }

    // -----------------------------------------------------------------------
    // Draft -> record
    // -----------------------------------------------------------------------

    #[test]
    fn draft_defaults_priority_and_serializes_options() {
        let draft = ScenarioDraft {
            handler: "message".to_string(),
            handler_options: Some(options(json!({"message": "Welcome"}))),
            week_days: Some(BTreeSet::new()),
            timeout: Some(15_000),
            ..Default::default()
        };

        let record = ScenarioBuilder::draft_to_record(draft).unwrap();
        assert_eq!(record.priority, 0);
        assert_eq!(record.week_days, None);
        assert_eq!(record.display_limit, None);
        assert_eq!(record.display_timeout_ms, Some(15_000));
        assert_eq!(
            record.handler_options.as_deref(),
            Some(r#"{"message":"Welcome"}"#)
        );
    }

    #[test]
    fn invalid_draft_is_rejected() {
        let draft = ScenarioDraft {
            handler: "  ".to_string(),
            ..Default::default()
        };
        assert_matches!(
            ScenarioBuilder::draft_to_record(draft),
            Err(CoreError::Validation(_))
        );
    }
}
