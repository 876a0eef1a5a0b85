//! Display protocol envelopes and well-known command names.
//!
//! Inbound (display or admin page -> coordinator):
//! `{ "token": "...", "payload": { "command": "...", "params": {...} } }`
//!
//! Outbound (coordinator -> display):
//! `{ "time": <epoch millis>, "payload": { "command": "...", "params": {...} } }`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::scenario::Scenario;
use crate::types::Timestamp;

/// Display the scenario in `params.scenario` (also the reply to
/// `requestCurrentScenario`, and an admin force-run request).
pub const CMD_RUN_SCENARIO: &str = "runScenario";

/// Reload every display.
pub const CMD_RESET: &str = "reset";

/// Ask for the scenario currently on screen.
pub const CMD_REQUEST_CURRENT_SCENARIO: &str = "requestCurrentScenario";

/// Re-select the best candidate immediately.
pub const CMD_RUN_RANDOM_SCENARIO: &str = "runRandomScenario";

/// Persist a new scenario, optionally running it.
pub const CMD_CREATE_SCENARIO: &str = "createScenario";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A command addressed to displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub command: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl Payload {
    pub fn new(command: impl Into<String>, params: Value) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    /// `runScenario` carrying `scenario`, or `null` when nothing is showing.
    pub fn run_scenario(scenario: Option<&Scenario>) -> Self {
        Self::new(CMD_RUN_SCENARIO, json!({ "scenario": scenario }))
    }

    /// `reset` with empty params.
    pub fn reset() -> Self {
        Self::new(CMD_RESET, empty_params())
    }
}

fn empty_params() -> Value {
    Value::Object(Default::default())
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Message sent to a display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Send time, epoch milliseconds.
    pub time: i64,
    pub payload: Payload,
}

impl OutboundEnvelope {
    pub fn new(time: Timestamp, payload: Payload) -> Self {
        Self {
            time: time.timestamp_millis(),
            payload,
        }
    }
}

/// Message received from a display or the admin page.
///
/// Every field is optional at this level; the dispatcher decides which
/// absences are protocol errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub payload: Option<InboundPayload>,
}

/// Command part of an [`InboundEnvelope`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundPayload {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub params: Value,
}
