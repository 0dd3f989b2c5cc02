// src/services/mod.rs

//! Auxiliary service registry and phase-aware ordering.
//!
//! - [`scheduler`] holds the descriptor registry and computes, per phase,
//!   the order services start in, honouring order hints and `after`
//!   dependencies without ever failing on bad declarations.
//!
//! Execution itself lives in [`crate::exec`]; this module only decides
//! *what* runs and *in which order*.

pub mod scheduler;

pub use scheduler::{Phase, ScheduledPlan, ServiceDescriptor, ServiceScheduler};
