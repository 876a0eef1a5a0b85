use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use serde_json::{Map, Value};
use signage_core::protocol::InboundEnvelope;
use signage_core::store::ScenarioStore;

use super::{Access, CommandContext, CommandRegistry};
use crate::engine::Scheduler;
use crate::error::{panic_message, CommandError, DispatchError, ProtocolError};
use crate::ws::{BroadcastHub, DisplayConnection};

/// Routes inbound messages to command handlers.
///
/// Nothing is ever sent back on failure: protocol violations are dropped and
/// handler errors or panics are logged here and go no further.
pub struct CommandDispatcher {
    registry: CommandRegistry,
    request_token: String,
    scheduler: Arc<Scheduler>,
    hub: Arc<BroadcastHub>,
    store: Arc<dyn ScenarioStore>,
}

impl CommandDispatcher {
    pub fn new(
        registry: CommandRegistry,
        request_token: impl Into<String>,
        scheduler: Arc<Scheduler>,
        hub: Arc<BroadcastHub>,
        store: Arc<dyn ScenarioStore>,
    ) -> Self {
        Self {
            registry,
            request_token: request_token.into(),
            scheduler,
            hub,
            store,
        }
    }

    /// Handle one raw inbound message, logging any failure.
    pub async fn handle(&self, origin: Weak<DisplayConnection>, raw: &str) {
        let conn_id = origin.upgrade().map(|c| c.id.clone()).unwrap_or_default();
        match self.dispatch(origin, raw).await {
            Ok(command) => {
                tracing::debug!(conn_id = %conn_id, command = %command, "Command completed");
            }
            Err(DispatchError::Protocol(ProtocolError::UnknownCommand(command))) => {
                tracing::warn!(conn_id = %conn_id, command = %command, "Unknown command dropped");
            }
            Err(DispatchError::Protocol(e)) => {
                tracing::debug!(conn_id = %conn_id, reason = %e, "Message dropped");
            }
            Err(e @ DispatchError::Command { .. }) => {
                tracing::error!(conn_id = %conn_id, error = %e, "Command failed");
            }
        }
    }

    /// Validate `raw` and run its handler.
    ///
    /// Returns the command name on success.
    pub async fn dispatch(
        &self,
        origin: Weak<DisplayConnection>,
        raw: &str,
    ) -> Result<String, DispatchError> {
        let envelope: InboundEnvelope =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if envelope.token.as_deref() != Some(self.request_token.as_str()) {
            return Err(ProtocolError::InvalidToken.into());
        }

        let payload = envelope
            .payload
            .ok_or_else(|| ProtocolError::Malformed("missing payload".to_string()))?;

        let command = payload
            .command
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProtocolError::MissingCommand)?;

        let params = match payload.params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(
                    ProtocolError::Malformed(format!("params must be an object, got {other}"))
                        .into(),
                )
            }
        };

        let (access, handler) = self
            .registry
            .lookup(&command)
            .ok_or_else(|| ProtocolError::UnknownCommand(command.clone()))?;

        if access == Access::Admin {
            tracing::info!(command = %command, "Admin command received");
        }

        let ctx = CommandContext {
            scheduler: Arc::clone(&self.scheduler),
            hub: Arc::clone(&self.hub),
            store: Arc::clone(&self.store),
            origin,
            params,
        };

        let result = match AssertUnwindSafe(handler.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CommandError::Panicked(panic_message(&*panic))),
        };

        match result {
            Ok(()) => Ok(command),
            Err(source) => Err(DispatchError::Command { command, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::time::Duration;

    use chrono::FixedOffset;
    use signage_core::builder::ScenarioBuilder;
    use signage_core::clock::SystemTimeSource;
    use signage_core::store::MemoryScenarioStore;

    use crate::commands::CommandHandler;
    use crate::engine::TimelineConfig;

    struct Panics;

    #[async_trait]
    impl CommandHandler for Panics {
        async fn run(&self, _ctx: CommandContext) -> Result<(), CommandError> {
            panic!("boom");
        }
    }

    fn dispatcher(registry: CommandRegistry) -> CommandDispatcher {
        let store: Arc<dyn ScenarioStore> = Arc::new(MemoryScenarioStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            ScenarioBuilder::default(),
            Arc::clone(&hub),
            Arc::new(SystemTimeSource),
            TimelineConfig {
                default_timeout: Duration::from_secs(60),
                display_offset: FixedOffset::east_opt(0).unwrap(),
            },
        );
        CommandDispatcher::new(registry, "tok", scheduler, hub, store)
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let d = dispatcher(CommandRegistry::with_defaults());
        assert_matches!(
            d.dispatch(Weak::new(), "{not json").await,
            Err(DispatchError::Protocol(ProtocolError::Malformed(_)))
        );
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_token() {
        let d = dispatcher(CommandRegistry::with_defaults());
        for raw in [
            r#"{"payload":{"command":"reset"}}"#,
            r#"{"token":"nope","payload":{"command":"reset"}}"#,
        ] {
            assert_matches!(
                d.dispatch(Weak::new(), raw).await,
                Err(DispatchError::Protocol(ProtocolError::InvalidToken))
            );
        }
    }

    #[tokio::test]
    async fn rejects_missing_and_unknown_commands() {
        let d = dispatcher(CommandRegistry::with_defaults());
        assert_matches!(
            d.dispatch(Weak::new(), r#"{"token":"tok","payload":{"command":""}}"#).await,
            Err(DispatchError::Protocol(ProtocolError::MissingCommand))
        );
        assert_matches!(
            d.dispatch(Weak::new(), r#"{"token":"tok","payload":{"command":"selfDestruct"}}"#)
                .await,
            Err(DispatchError::Protocol(ProtocolError::UnknownCommand(c))) if c == "selfDestruct"
        );
    }

    #[tokio::test]
    async fn rejects_non_object_params() {
        let d = dispatcher(CommandRegistry::with_defaults());
        assert_matches!(
            d.dispatch(Weak::new(), r#"{"token":"tok","payload":{"command":"reset","params":[1]}}"#)
                .await,
            Err(DispatchError::Protocol(ProtocolError::Malformed(_)))
        );
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let mut registry = CommandRegistry::new();
        registry.register(Access::Admin, "explode", Arc::new(Panics));
        let d = dispatcher(registry);

        let result = d
            .dispatch(Weak::new(), r#"{"token":"tok","payload":{"command":"explode"}}"#)
            .await;
        assert_matches!(
            result,
            Err(DispatchError::Command { command, source: CommandError::Panicked(msg) })
                if command == "explode" && msg == "boom"
        );
    }

    #[tokio::test]
    async fn valid_command_returns_its_name() {
        let d = dispatcher(CommandRegistry::with_defaults());
        let result = d
            .dispatch(Weak::new(), r#"{"token":"tok","payload":{"command":"reset"}}"#)
            .await;
        assert_eq!(result.unwrap(), "reset");
    }
}
