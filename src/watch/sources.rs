// src/watch/sources.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobMatcher};
use tracing::{debug, warn};

use crate::config::model::{BuildSection, SourceConfig, WatchSection};
use crate::watch::filter::PathFilter;

/// One logical compile unit: an input file, the artifact derived from it,
/// and the directories whose changes make that artifact stale.
///
/// Immutable once discovered; the whole set is recomputed on reload.
#[derive(Debug, Clone)]
pub struct BuildSource {
    /// Absolute input path.
    pub input: PathBuf,
    /// Absolute output path. Changes to this exact path never trigger a
    /// rebuild (the build's own write must not feed back into the watcher).
    pub output: PathBuf,
    /// Absolute directories whose subtrees are watched for this source.
    pub watch_roots: Vec<PathBuf>,
    /// Human label used in log output.
    pub label: String,
    /// Debounce window for events hitting this source.
    pub debounce: Duration,
    /// Build command template; `{input}` / `{output}` are substituted at
    /// execution time.
    pub cmd: String,
}

/// Expands configured `[[source]]` entries against the project tree.
///
/// Concrete inputs map to exactly one source; glob inputs are expanded by
/// walking the tree (explicit worklist, exclusions applied) and produce one
/// source per match. Kept around by the watch loop so the set can be
/// recomputed on reload.
#[derive(Debug, Clone)]
pub struct SourceDiscovery {
    root: PathBuf,
    sources: Vec<SourceConfig>,
    build: BuildSection,
    watch: WatchSection,
    filter: PathFilter,
}

impl SourceDiscovery {
    pub fn new(
        root: impl Into<PathBuf>,
        sources: Vec<SourceConfig>,
        build: BuildSection,
        watch: WatchSection,
        filter: PathFilter,
    ) -> Self {
        Self {
            root: root.into(),
            sources,
            build,
            watch,
            filter,
        }
    }

    /// Enumerate the current set of build sources.
    pub fn discover(&self) -> Result<Vec<BuildSource>> {
        let overrides = self.compile_overrides()?;
        let mut discovered = Vec::new();

        for entry in self.sources.iter() {
            if is_glob(&entry.input) {
                self.expand_glob_entry(entry, &overrides, &mut discovered)?;
            } else {
                discovered.push(self.concrete_entry(entry, &overrides)?);
            }
        }

        debug!(count = discovered.len(), "source discovery complete");
        Ok(discovered)
    }

    fn compile_overrides(&self) -> Result<Vec<(GlobMatcher, u64)>> {
        self.watch
            .overrides
            .iter()
            .map(|ov| {
                let matcher = Glob::new(&ov.pattern)
                    .with_context(|| format!("invalid override pattern: {}", ov.pattern))?
                    .compile_matcher();
                Ok((matcher, ov.debounce_ms))
            })
            .collect()
    }

    fn concrete_entry(
        &self,
        entry: &SourceConfig,
        overrides: &[(GlobMatcher, u64)],
    ) -> Result<BuildSource> {
        let input = self.root.join(&entry.input);
        if !input.is_file() {
            warn!(input = %entry.input, "source input does not exist yet");
        }

        let label = entry
            .label
            .clone()
            .unwrap_or_else(|| entry.input.clone());

        self.build_source(entry, &entry.input, input, self.root.join(&entry.output), label, overrides)
    }

    fn expand_glob_entry(
        &self,
        entry: &SourceConfig,
        overrides: &[(GlobMatcher, u64)],
        out: &mut Vec<BuildSource>,
    ) -> Result<()> {
        let matcher = Glob::new(&entry.input)
            .with_context(|| format!("invalid source glob: {}", entry.input))?
            .compile_matcher();

        let mut matches: Vec<String> = Vec::new();

        // Worklist traversal instead of recursion; keeps very deep trees
        // from exhausting the stack.
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                    continue;
                }
            };

            for dir_entry in entries.flatten() {
                let path = dir_entry.path();
                if path.is_dir() {
                    if !self.filter.excludes_dir(&path) {
                        pending.push(path);
                    }
                } else if let Some(rel) = relative_str(&self.root, &path) {
                    if matcher.is_match(&rel) {
                        matches.push(rel);
                    }
                }
            }
        }

        if matches.is_empty() {
            warn!(glob = %entry.input, "source glob matched no files");
            return Ok(());
        }

        // read_dir order is platform-dependent; sort for a stable set.
        matches.sort();

        for rel in matches {
            let input = self.root.join(&rel);
            let output_rel = render_output_template(&entry.output, &rel)?;
            let output = self.root.join(&output_rel);
            let label = rel.clone();
            out.push(self.build_source(entry, &rel, input, output, label, overrides)?);
        }

        Ok(())
    }

    fn build_source(
        &self,
        entry: &SourceConfig,
        rel_input: &str,
        input: PathBuf,
        output: PathBuf,
        label: String,
        overrides: &[(GlobMatcher, u64)],
    ) -> Result<BuildSource> {
        let cmd = entry
            .cmd
            .as_deref()
            .or(self.build.cmd.as_deref())
            .ok_or_else(|| anyhow!("source '{}' has no build command", rel_input))?
            .to_string();

        let window_ms = entry
            .debounce_ms
            .or_else(|| {
                overrides
                    .iter()
                    .find(|(matcher, _)| matcher.is_match(rel_input))
                    .map(|(_, ms)| *ms)
            })
            .unwrap_or(self.watch.debounce_ms);

        // Watch roots: the input's own directory, the entry's extra roots,
        // and the global roots, deduplicated.
        let mut roots = BTreeSet::new();
        if let Some(parent) = input.parent() {
            roots.insert(parent.to_path_buf());
        }
        for extra in entry.watch.iter() {
            roots.insert(self.root.join(extra));
        }
        for global in self.watch.roots.iter() {
            roots.insert(self.root.join(global));
        }

        Ok(BuildSource {
            input,
            output,
            watch_roots: roots.into_iter().collect(),
            label,
            debounce: Duration::from_millis(window_ms),
            cmd,
        })
    }
}

/// Substitute `{dir}` (matched file's directory, relative) and `{stem}`
/// (file name up to the first dot) into a glob entry's output template.
fn render_output_template(template: &str, rel_input: &str) -> Result<String> {
    let (dir, name) = match rel_input.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", rel_input),
    };
    let stem = name.split('.').next().unwrap_or(name);

    let mut rendered = template.to_string();
    if dir.is_empty() {
        rendered = rendered.replace("{dir}/", "").replace("{dir}", "");
    } else {
        rendered = rendered.replace("{dir}", dir);
    }
    rendered = rendered.replace("{stem}", stem);

    if rendered.is_empty() {
        return Err(anyhow!(
            "output template '{}' rendered to an empty path for '{}'",
            template,
            rel_input
        ));
    }

    Ok(rendered)
}

/// Convert a path into a string relative to `root`, with forward slashes.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}
