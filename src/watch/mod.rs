// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Deciding which directories and files are worth watching ([`filter`]).
//! - Expanding configured source entries into concrete build sources
//!   ([`sources`]).
//! - Wiring up the cross-platform filesystem watcher and normalising its
//!   events ([`engine`]).
//! - Coalescing event bursts into per-source rebuild batches ([`debounce`]).
//!
//! It does **not** know about services or phases; it only turns filesystem
//! changes into dirty build sources.

pub mod debounce;
pub mod engine;
pub mod filter;
pub mod sources;

pub use debounce::RebuildDebouncer;
pub use engine::{WatchEngine, WatchEvent};
pub use filter::PathFilter;
pub use sources::{BuildSource, SourceDiscovery};
