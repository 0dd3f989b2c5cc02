// src/config/mod.rs

//! Configuration loading and validation.
//!
//! The config file is plain TOML mapped onto typed structs once at startup;
//! nothing downstream ever sees a loose key-value tree. `loader` reads and
//! parses, `validate` runs the semantic checks (fatal structural problems
//! vs. warning-level dependency diagnostics).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BuildSection, ConfigFile, DebounceOverride, ServiceConfig, SourceConfig, WatchSection,
};
pub use validate::validate_config;
