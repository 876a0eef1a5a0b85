//! Commands sent from the admin page.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use signage_core::builder::ScenarioBuilder;
use signage_core::scenario::{ScenarioDraft, DEFAULT_CREATED_DISPLAY_LIMIT};
use signage_core::types::DbId;

use super::{CommandContext, CommandHandler};
use crate::error::CommandError;

/// Reload every display.
pub struct Reset;

#[async_trait]
impl CommandHandler for Reset {
    async fn run(&self, ctx: CommandContext) -> Result<(), CommandError> {
        ctx.scheduler.reset_displays().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// runScenario
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RunScenarioParams {
    id: Value,
    #[serde(default)]
    options: Option<Map<String, Value>>,
}

/// Display a scenario by id right away, with optional field overrides.
pub struct RunScenario;

#[async_trait]
impl CommandHandler for RunScenario {
    async fn run(&self, ctx: CommandContext) -> Result<(), CommandError> {
        let params: RunScenarioParams = ctx.parse_params()?;
        let id = parse_id(&params.id)?;
        let outcome = ctx.scheduler.force_run(id, params.options).await;
        tracing::info!(scenario_id = id, ?outcome, "Force-run requested");
        Ok(())
    }
}

/// Scenario ids arrive as numbers, or as numeric strings from form inputs.
fn parse_id(value: &Value) -> Result<DbId, CommandError> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| CommandError::InvalidParams(format!("invalid scenario id {value}")))
}

// ---------------------------------------------------------------------------
// runRandomScenario
// ---------------------------------------------------------------------------

/// Re-select the best candidate immediately.
pub struct RunRandomScenario;

#[async_trait]
impl CommandHandler for RunRandomScenario {
    async fn run(&self, ctx: CommandContext) -> Result<(), CommandError> {
        let outcome = ctx.scheduler.run_next().await;
        tracing::info!(?outcome, "Immediate re-selection requested");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// createScenario
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateScenarioParams {
    scenario: ScenarioDraft,
    #[serde(default)]
    run: bool,
}

/// Persist a new scenario, then display it when `run` is set.
///
/// Created scenarios are shown once unless the draft sets a non-zero display
/// limit.
/// A failed insert is returned as an error and nothing is run.
pub struct CreateScenario;

#[async_trait]
impl CommandHandler for CreateScenario {
    async fn run(&self, ctx: CommandContext) -> Result<(), CommandError> {
        let CreateScenarioParams { mut scenario, run } = ctx.parse_params()?;
        if matches!(scenario.display_limit, None | Some(0)) {
            scenario.display_limit = Some(DEFAULT_CREATED_DISPLAY_LIMIT);
        }

        let record = ScenarioBuilder::draft_to_record(scenario)?;
        let id = ctx.store.insert(record).await?;
        tracing::info!(scenario_id = id, run, "Scenario created");

        if run {
            let outcome = ctx.scheduler.force_run(id, None).await;
            tracing::info!(scenario_id = id, ?outcome, "Created scenario run");
        }
        Ok(())
    }
}
