// src/engine/signals.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

/// Reload/shutdown requests for one watch session.
///
/// Owned by the watch loop and handed to the signal listeners as an `Arc`;
/// the flags are plain booleans so the write side stays signal-safe. The
/// loop polls them once per iteration, which also coalesces repeated
/// hangups into a single reload.
#[derive(Debug, Default)]
pub struct WatchFlags {
    reload: AtomicBool,
    shutdown: AtomicBool,
}

impl WatchFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Consume a pending reload request, if any.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Spawn background listeners mapping process signals onto the flags:
/// Ctrl-C / SIGTERM request shutdown, SIGHUP requests a reload-all.
pub fn spawn_signal_listeners(flags: Arc<WatchFlags>) {
    {
        let flags = Arc::clone(&flags);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("interrupt received, requesting shutdown");
            flags.request_shutdown();
        });
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                let mut term = match signal(SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "failed to listen for SIGTERM");
                        return;
                    }
                };
                if term.recv().await.is_some() {
                    info!("terminate received, requesting shutdown");
                    flags.request_shutdown();
                }
            });
        }

        {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                let mut hangup = match signal(SignalKind::hangup()) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "failed to listen for SIGHUP");
                        return;
                    }
                };
                while hangup.recv().await.is_some() {
                    info!("hangup received, requesting reload");
                    flags.request_reload();
                }
            });
        }
    }
}
