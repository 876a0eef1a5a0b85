//! Inbound command handling.
//!
//! Every command name maps to an [`Arc<dyn CommandHandler>`] in a
//! [`CommandRegistry`]. Public commands can be sent by any display; admin
//! commands come from the admin page. Both need the shared request token,
//! checked by the [`dispatcher`] before any lookup.

pub mod admin;
pub mod dispatcher;
pub mod public;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use signage_core::protocol::{
    CMD_CREATE_SCENARIO, CMD_REQUEST_CURRENT_SCENARIO, CMD_RESET, CMD_RUN_RANDOM_SCENARIO,
    CMD_RUN_SCENARIO,
};
use signage_core::store::ScenarioStore;

use crate::engine::Scheduler;
use crate::error::CommandError;
use crate::ws::{BroadcastHub, DisplayConnection};

pub use dispatcher::CommandDispatcher;

/// Everything a handler may touch while running one command.
#[derive(Clone)]
pub struct CommandContext {
    pub scheduler: Arc<Scheduler>,
    pub hub: Arc<BroadcastHub>,
    pub store: Arc<dyn ScenarioStore>,
    /// Connection the command arrived on; only used for replies.
    pub origin: Weak<DisplayConnection>,
    pub params: Map<String, Value>,
}

impl CommandContext {
    /// Deserialize the params into the handler's parameter type.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, CommandError> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|e| CommandError::InvalidParams(e.to_string()))
    }
}

/// A named operation invoked by an inbound message.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: CommandContext) -> Result<(), CommandError>;
}

/// Who may send a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Admin,
}

/// Command name to handler mappings.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    public: HashMap<String, Arc<dyn CommandHandler>>,
    admin: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in command set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            Access::Public,
            CMD_REQUEST_CURRENT_SCENARIO,
            Arc::new(public::RequestCurrentScenario),
        );
        registry.register(Access::Admin, CMD_RESET, Arc::new(admin::Reset));
        registry.register(Access::Admin, CMD_RUN_SCENARIO, Arc::new(admin::RunScenario));
        registry.register(
            Access::Admin,
            CMD_RUN_RANDOM_SCENARIO,
            Arc::new(admin::RunRandomScenario),
        );
        registry.register(
            Access::Admin,
            CMD_CREATE_SCENARIO,
            Arc::new(admin::CreateScenario),
        );
        registry
    }

    /// Register `handler` under `name`, replacing any previous handler in
    /// the same mapping.
    pub fn register(&mut self, access: Access, name: &str, handler: Arc<dyn CommandHandler>) {
        let map = match access {
            Access::Public => &mut self.public,
            Access::Admin => &mut self.admin,
        };
        map.insert(name.to_string(), handler);
    }

    /// Look a command up, public mapping first.
    pub fn lookup(&self, name: &str) -> Option<(Access, Arc<dyn CommandHandler>)> {
        if let Some(handler) = self.public.get(name) {
            return Some((Access::Public, Arc::clone(handler)));
        }
        self.admin
            .get(name)
            .map(|handler| (Access::Admin, Arc::clone(handler)))
    }
}
