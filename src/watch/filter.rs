// src/watch/filter.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Directory names skipped regardless of configuration: dependency caches
/// and build trees that produce event storms without ever holding sources.
const BUILTIN_EXCLUDED_DIRS: &[&str] = &["node_modules", "vendor", "target", "__pycache__"];

/// Pure predicate deciding what is excluded from watching.
///
/// Three layers, checked in order:
/// - convention: dot-directories and dot-files are never watched
/// - built-ins: well-known dependency/build directory names
/// - configuration: `[watch].exclude` names and glob patterns, matched
///   against paths relative to the project root
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    exclude_names: Vec<String>,
    exclude_set: Option<GlobSet>,
}

impl PathFilter {
    /// Compile a filter for the given project root and configured exclude
    /// patterns. Entries without glob metacharacters are treated as plain
    /// directory names; the rest are compiled into one glob set.
    pub fn new(root: impl Into<PathBuf>, exclude: &[String]) -> Result<Self> {
        let mut names = Vec::new();
        let mut builder = GlobSetBuilder::new();
        let mut have_globs = false;

        for pattern in exclude {
            if pattern.contains(['*', '?', '[', '{', '/']) {
                let glob = Glob::new(pattern)
                    .with_context(|| format!("invalid exclude pattern: {pattern}"))?;
                builder.add(glob);
                have_globs = true;
            } else {
                names.push(pattern.clone());
            }
        }

        let exclude_set = if have_globs { Some(builder.build()?) } else { None };

        Ok(Self {
            root: root.into(),
            exclude_names: names,
            exclude_set,
        })
    }

    /// Returns true if the directory at `path` must not be watched (and its
    /// subtree must not be descended into).
    pub fn excludes_dir(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };

        if name.starts_with('.') {
            return true;
        }

        if BUILTIN_EXCLUDED_DIRS.contains(&name) {
            return true;
        }

        if self.exclude_names.iter().any(|n| n == name) {
            return true;
        }

        if let Some(set) = &self.exclude_set {
            if let Some(rel) = self.relative_str(path) {
                if set.is_match(&rel) {
                    return true;
                }
            }
        }

        false
    }

    /// Returns true for files whose changes are never interesting: editor
    /// swap/backup artifacts and dot-files.
    pub fn is_noise_file(path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
            || name.ends_with('~')
            || name.starts_with('.')
    }

    /// Convert a path into a string relative to the project root, with
    /// forward slashes. Returns `None` if the path is not under the root.
    fn relative_str(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        Some(rel.to_string_lossy().replace('\\', "/"))
    }
}
