// src/watch/engine.rs

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::WatchSetupError;
use crate::watch::filter::PathFilter;

/// One normalised filesystem change: the absolute path that was touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
}

/// Owns the OS watcher and every per-directory registration made through it.
///
/// Directories are registered individually (`NonRecursive`) via an explicit
/// worklist walk so that [`PathFilter`] exclusions apply to whole subtrees;
/// the underlying recursive mode would watch dependency caches and build
/// output wholesale.
///
/// The `notify` callback forwards raw events into an unbounded channel; the
/// receiving half doubles as the readiness handle the watch loop suspends
/// on. Exactly one engine may watch a given tree; overlapping engines see
/// duplicate events and are unsupported.
pub struct WatchEngine {
    watcher: Option<RecommendedWatcher>,
    rx: mpsc::UnboundedReceiver<Event>,
    /// Events received by `wait_ready` ahead of the next `poll` drain.
    backlog: VecDeque<Event>,
    watched: BTreeSet<PathBuf>,
    filter: PathFilter,
}

impl WatchEngine {
    pub fn new(filter: PathFilter) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        // Closure called synchronously by notify whenever an event arrives.
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(err) => {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("buildwatch: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher: Some(watcher),
            rx,
            backlog: VecDeque::new(),
            watched: BTreeSet::new(),
            filter,
        })
    }

    /// Register `root` and, via an explicit worklist, every subdirectory the
    /// filter does not reject.
    ///
    /// Returns the number of directories newly registered. Fails only when
    /// the root itself cannot be registered; a failing subdirectory logs a
    /// warning and does not abort its siblings.
    pub fn add_root(&mut self, root: &Path) -> Result<usize, WatchSetupError> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        match self.register_dir(&root) {
            Ok(true) => {}
            Ok(false) => return Ok(0),
            Err(source) => return Err(WatchSetupError { root, source }),
        }

        let mut registered = 1usize;
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(e) => e,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                if self.filter.excludes_dir(&path) {
                    debug!(dir = %path.display(), "directory excluded from watching");
                    continue;
                }

                match self.register_dir(&path) {
                    Ok(newly) => {
                        if newly {
                            registered += 1;
                        }
                        pending.push(path);
                    }
                    Err(err) => {
                        warn!(
                            dir = %path.display(),
                            error = %err,
                            "could not watch directory; continuing with siblings"
                        );
                    }
                }
            }
        }

        info!(root = %root.display(), registered, "watch root registered");
        Ok(registered)
    }

    /// Wait until at least one event is available, bounded by `timeout`.
    ///
    /// This is the loop's sole suspension point. Returns true if an event is
    /// ready to be drained via [`poll`](Self::poll); false on timeout or
    /// after [`close`](Self::close). The first received event is buffered,
    /// not lost.
    pub async fn wait_ready(&mut self, timeout: Duration) -> bool {
        if !self.backlog.is_empty() {
            return true;
        }

        if self.watcher.is_none() {
            // Closed: preserve the caller's pacing without busy-spinning.
            tokio::time::sleep(timeout).await;
            return false;
        }

        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => {
                self.backlog.push_back(event);
                true
            }
            Ok(None) => false,
            Err(_) => false,
        }
    }

    /// Drain all currently available events without blocking.
    ///
    /// Paths are absolute and deduplicated within this call; noise files are
    /// dropped. A directory that appears under a watched root after the
    /// initial scan is registered on the spot, so changes inside it are seen
    /// from then on.
    pub fn poll(&mut self) -> Vec<WatchEvent> {
        if self.watcher.is_none() {
            self.backlog.clear();
            return Vec::new();
        }

        let mut raw: Vec<Event> = self.backlog.drain(..).collect();
        while let Ok(event) = self.rx.try_recv() {
            raw.push(event);
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut events = Vec::new();

        for event in raw {
            for path in event.paths {
                if path.is_dir() {
                    if !self.watched.contains(&path) && !self.filter.excludes_dir(&path) {
                        debug!(dir = %path.display(), "registering directory created after startup");
                        if let Err(err) = self.add_root(&path) {
                            warn!(error = %err, "failed to watch newly created directory");
                        }
                    }
                    // Directory-level events carry no content change of
                    // their own; files inside produce their own events.
                    continue;
                }

                if PathFilter::is_noise_file(&path) {
                    continue;
                }

                if seen.insert(path.clone()) {
                    events.push(WatchEvent { path });
                }
            }
        }

        events
    }

    /// Number of directories currently registered.
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Release every registered watch. Individual release failures are
    /// logged and do not stop the remaining releases. Afterwards `poll` is
    /// a no-op and `wait_ready` reports no readiness.
    pub fn close(&mut self) {
        let Some(mut watcher) = self.watcher.take() else {
            return;
        };

        let mut failed = 0usize;
        for dir in std::mem::take(&mut self.watched) {
            if let Err(err) = watcher.unwatch(&dir) {
                debug!(dir = %dir.display(), error = %err, "failed to release watch");
                failed += 1;
            }
        }

        self.backlog.clear();

        if failed > 0 {
            warn!(failed, "some watches could not be released cleanly");
        }
        info!("watch engine closed");
    }

    fn register_dir(&mut self, dir: &Path) -> notify::Result<bool> {
        if self.watched.contains(dir) {
            return Ok(false);
        }
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(false);
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched.insert(dir.to_path_buf());
        Ok(true)
    }
}
