//! Commands any display may send.

use async_trait::async_trait;
use signage_core::protocol::Payload;

use super::{CommandContext, CommandHandler};
use crate::error::CommandError;

/// Reply to the sender with the scenario currently on screen (`null` when
/// nothing is showing), as a `runScenario` payload.
pub struct RequestCurrentScenario;

#[async_trait]
impl CommandHandler for RequestCurrentScenario {
    async fn run(&self, ctx: CommandContext) -> Result<(), CommandError> {
        let Some(origin) = ctx.origin.upgrade() else {
            tracing::debug!("Requester disconnected before reply");
            return Ok(());
        };

        let current = ctx.scheduler.current().await;
        let sent = ctx.hub.send_to(&origin, &Payload::run_scenario(current.as_ref()));
        tracing::debug!(
            conn_id = %origin.id,
            scenario_id = current.as_ref().map(|s| s.id),
            sent,
            "Replied with current scenario"
        );
        Ok(())
    }
}
