//! Domain core of the signage coordinator.
//!
//! Zero internal dependencies: scenario types, the selection policy, the
//! record/scenario builder, protocol envelopes and the storage contract.

pub mod builder;
pub mod clock;
pub mod error;
pub mod protocol;
pub mod record;
pub mod scenario;
pub mod selection;
pub mod store;
pub mod types;
