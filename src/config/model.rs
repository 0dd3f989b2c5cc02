// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// roots = ["assets", "templates"]
/// exclude = ["vendor"]
/// debounce_ms = 250
///
/// [build]
/// cmd = "tailwindcss -i {input} -o {output}"
///
/// [[source]]
/// input = "assets/app.tailwind.css"
/// output = "public/app.css"
///
/// [service.reload]
/// cmd = "reload-hub --listen"
/// phases = ["watch"]
/// long_lived = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    /// Watch roots, exclusions, and debounce behaviour from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,

    /// Default build command from `[build]`.
    #[serde(default)]
    pub build: BuildSection,

    /// Build sources from `[[source]]`, in declaration order.
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,

    /// All services from `[service.<name>]`.
    ///
    /// Keys are the service names (e.g. `"icons"`, `"reload"`).
    #[serde(default, rename = "service")]
    pub services: BTreeMap<String, ServiceConfig>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Extra root directories to watch for every source, relative to the
    /// config file's directory. A source's own roots are derived from its
    /// input and its `watch` list; these are appended to all of them.
    #[serde(default)]
    pub roots: Vec<String>,

    /// Directory names or glob patterns excluded from watching, on top of
    /// the built-in conventions (dot-directories, dependency caches).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Debounce window in milliseconds: quiet period after the last
    /// relevant change before a rebuild is triggered.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Per-pattern debounce overrides from `[[watch.override]]`.
    #[serde(default, rename = "override")]
    pub overrides: Vec<DebounceOverride>,
}

fn default_debounce_ms() -> u64 {
    250
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            exclude: Vec::new(),
            debounce_ms: default_debounce_ms(),
            overrides: Vec::new(),
        }
    }
}

/// `[[watch.override]]` entry: sources whose input matches `pattern` get a
/// longer (or shorter) debounce window than the global default.
#[derive(Debug, Clone, Deserialize)]
pub struct DebounceOverride {
    /// Glob matched against a source's input path, relative to the config
    /// file's directory.
    pub pattern: String,

    /// Debounce window in milliseconds for matching sources.
    pub debounce_ms: u64,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildSection {
    /// Default build command template for sources that do not declare their
    /// own. `{input}` and `{output}` are replaced with the source's paths.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// `[[source]]` entry: one logical compile unit (or a glob expanding to
/// several).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Input path, relative to the config file's directory. May be a glob
    /// (e.g. `apps/*/assets/app.tailwind.css`); each match becomes its own
    /// source.
    pub input: String,

    /// Output path. For glob inputs this is a template: `{dir}` is the
    /// matched file's directory and `{stem}` its file name up to the first
    /// dot.
    pub output: String,

    /// Extra watch roots for this source, besides the input's directory.
    #[serde(default)]
    pub watch: Vec<String>,

    /// Human label for log output. Defaults to the input path.
    #[serde(default)]
    pub label: Option<String>,

    /// Build command template override for this source.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Debounce window override in milliseconds for this source. Takes
    /// precedence over `[[watch.override]]` patterns.
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

/// `[service.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// The command to execute.
    pub cmd: String,

    /// Numeric execution order hint; lower runs earlier. Ties run in
    /// registration order.
    #[serde(default)]
    pub order: i32,

    /// Names of services that must be started before this one.
    #[serde(default)]
    pub after: Vec<String>,

    /// Phases this service is enabled for ("init", "watch", "build").
    ///
    /// Omitted means enabled for every phase; an explicit empty list parks
    /// the service entirely.
    #[serde(default)]
    pub phases: Option<Vec<String>>,

    /// Whether this is a long-lived command (runs until shutdown).
    #[serde(default)]
    pub long_lived: bool,

    /// Regex matched against stdout lines of a long-lived service; once it
    /// matches, the service counts as started and the next one may run.
    #[serde(default)]
    pub ready_on_stdout: Option<String>,
}
