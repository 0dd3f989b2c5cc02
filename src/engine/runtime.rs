// src/engine/runtime.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::errors::RebuildFailure;
use crate::exec::command::{BuildOutcome, Builder};
use crate::watch::debounce::RebuildDebouncer;
use crate::watch::engine::WatchEngine;
use crate::watch::sources::{BuildSource, SourceDiscovery};

use super::signals::WatchFlags;

/// Upper bound on the readiness wait, so debounce deadlines are checked
/// even when the filesystem is quiet.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// The cooperative core of a watch session.
///
/// One loop task owns the engine, the debouncer, and the source set; its
/// only suspension points are the bounded readiness wait and the rebuild
/// futures it awaits to completion. Rebuilds are serialized: no two builds
/// for the same session run concurrently.
///
/// Per iteration:
/// 1. bounded wait for watcher readiness
/// 2. drain events into the debouncer
/// 3. honour a pending reload-all request
/// 4. flush the debouncer once its quiet period elapsed, rebuilding each
///    flushed source in the order it went dirty
/// 5. stop if shutdown was requested
///
/// Exiting the loop always releases the engine's watches.
pub struct WatchLoop {
    engine: WatchEngine,
    debouncer: RebuildDebouncer,
    discovery: SourceDiscovery,
    sources: Vec<BuildSource>,
    flags: Arc<WatchFlags>,
    builder: Box<dyn Builder>,
}

impl WatchLoop {
    pub fn new(
        engine: WatchEngine,
        discovery: SourceDiscovery,
        sources: Vec<BuildSource>,
        flags: Arc<WatchFlags>,
        builder: Box<dyn Builder>,
    ) -> Self {
        Self {
            engine,
            debouncer: RebuildDebouncer::new(),
            discovery,
            sources,
            flags,
            builder,
        }
    }

    /// Register the watch roots of every current source.
    ///
    /// Per-root failures are logged and skipped; the caller decides whether
    /// ending up with zero watched directories is fatal (it is at startup).
    pub fn register_roots(&mut self) {
        let roots: std::collections::BTreeSet<_> = self
            .sources
            .iter()
            .flat_map(|s| s.watch_roots.iter().cloned())
            .collect();

        for root in roots {
            if let Err(err) = self.engine.add_root(&root) {
                warn!("{err}; continuing with remaining roots");
            }
        }
    }

    /// Number of directories the engine currently watches.
    pub fn watched_count(&self) -> usize {
        self.engine.watched_count()
    }

    /// Rebuild every known source, serially, reporting failures per source.
    pub async fn rebuild_all(&mut self) {
        let sources = self.sources.clone();
        for source in sources.iter() {
            self.rebuild(source).await;
        }
    }

    /// Run until shutdown is requested, then release the watches.
    pub async fn run(mut self) -> Result<()> {
        info!(
            sources = self.sources.len(),
            watched_dirs = self.engine.watched_count(),
            "watch loop started"
        );

        loop {
            self.engine.wait_ready(POLL_TIMEOUT).await;

            for event in self.engine.poll() {
                debug!(path = %event.path.display(), "filesystem event");
                self.debouncer.on_event(&event, &self.sources, Instant::now());
            }

            if self.flags.take_reload() {
                self.reload().await;
            }

            if self.debouncer.should_flush(Instant::now()) {
                let batch = self.debouncer.flush();
                info!(count = batch.len(), "change burst settled; rebuilding");
                for source in batch.iter() {
                    self.rebuild(source).await;
                }
            }

            if self.flags.shutdown_requested() {
                info!("shutdown requested, stopping watch loop");
                break;
            }
        }

        self.engine.close();
        Ok(())
    }

    /// Recompute the source set and rebuild everything unconditionally.
    /// Roots that appeared with the new set are registered on the fly.
    async fn reload(&mut self) {
        info!("reload requested; recomputing sources");

        match self.discovery.discover() {
            Ok(sources) => {
                self.sources = sources;
                self.register_roots();
            }
            Err(err) => {
                warn!(error = %err, "source rediscovery failed; keeping previous set");
            }
        }

        self.rebuild_all().await;
    }

    /// Invoke the builder for one source. A failure is reported with the
    /// source's label and diagnostics; it never stops the loop.
    async fn rebuild(&mut self, source: &BuildSource) {
        let started = Instant::now();

        match self.builder.build(source).await {
            BuildOutcome::Success => {
                info!(
                    label = %source.label,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "rebuilt"
                );
            }
            BuildOutcome::Failed { code, diagnostics } => {
                let failure = RebuildFailure {
                    label: source.label.clone(),
                    code,
                    diagnostics,
                };
                warn!("{failure}");
                if !failure.diagnostics.is_empty() {
                    warn!(label = %failure.label, "stderr tail:\n{}", failure.diagnostics);
                }
            }
        }
    }
}
