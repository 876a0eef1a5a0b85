//! Signage coordinator server library.
//!
//! Exposes the building blocks (config, broadcast hub, scheduler, command
//! dispatch, routes) so integration tests and the binary entrypoint can both
//! access them.

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;
