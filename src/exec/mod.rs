// src/exec/mod.rs

//! Process execution layer.
//!
//! Everything that actually spawns a subprocess lives here, using
//! `tokio::process::Command`:
//!
//! - [`command`] defines the [`Builder`](command::Builder) capability the
//!   watch loop rebuilds sources through, plus the shell-backed
//!   implementation.
//! - [`service`] runs scheduled services: short-lived ones to completion,
//!   long-lived ones spawned with an optional stdout readiness gate.

pub mod command;
pub mod service;

pub use command::{BuildOutcome, Builder, ShellBuilder};
pub use service::{RunningService, ServiceRunner};
