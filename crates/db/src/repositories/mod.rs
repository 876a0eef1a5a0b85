//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod scenario_repo;

pub use scenario_repo::ScenarioRepo;
