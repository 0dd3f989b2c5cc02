// src/errors.rs

//! Crate-wide error types.
//!
//! Most application-level plumbing uses `anyhow` for propagation; the types
//! here cover the failures callers need to tell apart: watch setup,
//! per-source rebuild failures, unknown service lookups, and the
//! warning-level scheduling diagnostic.

use std::path::PathBuf;

use thiserror::Error;

pub use anyhow::{Error, Result};

/// A watch root could not be registered with the OS change-notification
/// facility.
///
/// Raised only when the root itself fails; failures below the root are
/// logged and skipped so one bad directory cannot take down its siblings.
/// Non-fatal to the session unless every configured root fails.
#[derive(Debug, Error)]
#[error("failed to register watch root {}", root.display())]
pub struct WatchSetupError {
    pub root: PathBuf,
    #[source]
    pub source: notify::Error,
}

/// A single source's external build command failed.
///
/// Reported with the source label and a tail of the captured diagnostics;
/// never aborts the watch loop or blocks other sources.
#[derive(Debug, Error)]
#[error("rebuild of '{label}' failed with exit code {code}")]
pub struct RebuildFailure {
    pub label: String,
    pub code: i32,
    pub diagnostics: String,
}

/// A service name was looked up that was never registered.
///
/// Fatal to the lookup only; the scheduler itself stays usable.
#[derive(Debug, Error)]
#[error("unknown service '{0}'")]
pub struct UnknownServiceError(pub String);

/// Warning-level diagnostic: the service order could not be fully resolved
/// because of a dependency cycle or a dependency missing from the planned
/// phase. The plan still contains every enabled service; the ones listed
/// here were appended in their declared relative order without their
/// constraints.
#[derive(Debug, Clone, Error)]
#[error("service order is ambiguous (cycle or missing dependency): {}", names.join(", "))]
pub struct SchedulingAmbiguity {
    pub names: Vec<String>,
}
