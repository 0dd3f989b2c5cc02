// src/watch/debounce.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use crate::watch::engine::WatchEvent;
use crate::watch::sources::BuildSource;

/// Coalesces bursts of filesystem events into one rebuild batch per quiet
/// period.
///
/// A single sliding deadline is shared by all sources: every qualifying
/// event pushes it to `now + window`, so a burst flushes once, one window
/// after its last event. An editor's atomic save produces several events
/// within milliseconds; they all land in the same batch.
///
/// All state is owned and mutated by the watch loop's task; the only data
/// crossing execution contexts in a watch session are the atomic signal
/// flags.
#[derive(Debug, Default)]
pub struct RebuildDebouncer {
    /// Dirty sources in the order they were first marked.
    pending: Vec<BuildSource>,
    pending_inputs: HashSet<PathBuf>,
    deadline: Option<Instant>,
}

impl RebuildDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one normalised event.
    ///
    /// An event whose path equals any known output is discarded outright:
    /// the build writing its artifact must not schedule the next rebuild.
    /// Otherwise every source whose watch roots contain the path is marked
    /// pending and the deadline moves to `now` plus the widest window among
    /// the sources hit.
    pub fn on_event(&mut self, event: &WatchEvent, sources: &[BuildSource], now: Instant) {
        if sources.iter().any(|s| s.output == event.path) {
            debug!(path = %event.path.display(), "ignoring event for build output");
            return;
        }

        let mut window = None;

        for source in sources {
            let hit = source
                .watch_roots
                .iter()
                .any(|root| event.path.starts_with(root));
            if !hit {
                continue;
            }

            window = Some(match window {
                None => source.debounce,
                Some(w) => source.debounce.max(w),
            });

            if self.pending_inputs.insert(source.input.clone()) {
                debug!(label = %source.label, "source marked dirty");
                self.pending.push(source.clone());
            }
        }

        if let Some(window) = window {
            self.deadline = Some(now + window);
        }
    }

    /// True once something is pending and the quiet period has elapsed.
    pub fn should_flush(&self, now: Instant) -> bool {
        !self.pending.is_empty() && self.deadline.is_some_and(|d| now >= d)
    }

    /// Swap out the pending batch and clear the deadline.
    ///
    /// Sources come back in the order they were first marked within the
    /// batch.
    pub fn flush(&mut self) -> Vec<BuildSource> {
        self.deadline = None;
        self.pending_inputs.clear();
        std::mem::take(&mut self.pending)
    }

    /// True if any source is waiting for its quiet period.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
