// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod services;
pub mod watch;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{spawn_signal_listeners, WatchFlags, WatchLoop, POLL_TIMEOUT};
use crate::errors::RebuildFailure;
use crate::exec::command::BuildOutcome;
use crate::exec::{Builder, ServiceRunner, ShellBuilder};
use crate::services::{Phase, ServiceScheduler};
use crate::watch::{PathFilter, SourceDiscovery, WatchEngine};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - service scheduling + execution
/// - source discovery
/// - watch engine / watch loop
/// - signal handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = project_root(&config_path)?;

    match args.command {
        Command::Watch => run_watch(&root, &cfg).await,
        Command::Build => run_build(&root, &cfg).await,
        Command::Plan { phase } => print_plan(&cfg, &phase),
        Command::Run { service, phase } => {
            run_single_service(&root, &cfg, &service, &phase).await
        }
    }
}

/// The project root everything else is resolved against: the directory
/// containing the config file, canonicalized so watch events (which come
/// back canonical from the OS) prefix-match discovered paths.
fn project_root(config_path: &Path) -> Result<PathBuf> {
    let dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    dir.canonicalize()
        .with_context(|| format!("resolving project root {:?}", dir))
}

/// `buildwatch watch`: init services, watch services, initial build, then
/// the watch loop until shutdown.
async fn run_watch(root: &Path, cfg: &ConfigFile) -> Result<()> {
    let scheduler = ServiceScheduler::from_config(cfg)?;
    let runner = ServiceRunner::new(root);

    let mut running = Vec::new();
    running.extend(
        runner
            .run_phase(&scheduler.plan(Phase::Init), Phase::Init)
            .await?,
    );
    running.extend(
        runner
            .run_phase(&scheduler.plan(Phase::Watch), Phase::Watch)
            .await?,
    );

    let flags = WatchFlags::new();
    spawn_signal_listeners(Arc::clone(&flags));

    let filter = PathFilter::new(root, &cfg.watch.exclude)?;
    let discovery = SourceDiscovery::new(
        root,
        cfg.sources.clone(),
        cfg.build.clone(),
        cfg.watch.clone(),
        filter.clone(),
    );
    let sources = discovery.discover()?;

    let result = if sources.is_empty() {
        info!("no build sources configured; running services until shutdown");
        wait_for_shutdown(&flags).await;
        Ok(())
    } else {
        let engine = WatchEngine::new(filter)?;
        let builder = Box::new(ShellBuilder::new(root));
        let mut watch_loop =
            WatchLoop::new(engine, discovery, sources, Arc::clone(&flags), builder);

        watch_loop.register_roots();
        if watch_loop.watched_count() == 0 {
            bail!("no watch roots could be registered");
        }

        watch_loop.rebuild_all().await;
        watch_loop.run().await
    };

    ServiceRunner::shutdown(running).await;
    result
}

/// `buildwatch build`: init + build services, then build every source once.
/// The process exit status reflects per-source failures.
async fn run_build(root: &Path, cfg: &ConfigFile) -> Result<()> {
    let scheduler = ServiceScheduler::from_config(cfg)?;
    let runner = ServiceRunner::new(root);

    let mut running = Vec::new();
    running.extend(
        runner
            .run_phase(&scheduler.plan(Phase::Init), Phase::Init)
            .await?,
    );
    running.extend(
        runner
            .run_phase(&scheduler.plan(Phase::Build), Phase::Build)
            .await?,
    );

    let filter = PathFilter::new(root, &cfg.watch.exclude)?;
    let discovery = SourceDiscovery::new(
        root,
        cfg.sources.clone(),
        cfg.build.clone(),
        cfg.watch.clone(),
        filter,
    );
    let sources = discovery.discover()?;

    let mut builder = ShellBuilder::new(root);
    let mut failed = 0usize;

    for source in sources.iter() {
        let started = Instant::now();
        match builder.build(source).await {
            BuildOutcome::Success => {
                info!(
                    label = %source.label,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "built"
                );
            }
            BuildOutcome::Failed { code, diagnostics } => {
                failed += 1;
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

    ServiceRunner::shutdown(running).await;

    if failed > 0 {
        bail!("{failed} of {} sources failed to build", sources.len());
    }
    Ok(())
}

/// `buildwatch plan`: print the computed order, no execution.
fn print_plan(cfg: &ConfigFile, phase: &str) -> Result<()> {
    let phase = Phase::from_str(phase).map_err(|e| anyhow!(e))?;
    let scheduler = ServiceScheduler::from_config(cfg)?;
    let plan = scheduler.plan(phase);

    println!(
        "service plan for phase '{phase}' ({} services):",
        plan.services.len()
    );
    for descriptor in plan.services.iter() {
        println!("  - {} (order {})", descriptor.name, descriptor.order);
        println!("      cmd: {}", descriptor.cmd);
        if !descriptor.after.is_empty() {
            println!("      after: {:?}", descriptor.after);
        }
        if descriptor.long_lived {
            println!("      long_lived: true");
        }
    }

    if let Some(ambiguity) = &plan.ambiguity {
        println!();
        println!("warning: {ambiguity}");
    }

    Ok(())
}

/// `buildwatch run <service>`: execute one registered service directly.
async fn run_single_service(
    root: &Path,
    cfg: &ConfigFile,
    service: &str,
    phase: &str,
) -> Result<()> {
    let phase = Phase::from_str(phase).map_err(|e| anyhow!(e))?;
    let scheduler = ServiceScheduler::from_config(cfg)?;
    let descriptor = scheduler.get(service)?;

    if !descriptor.enabled_for(phase) {
        warn!(
            service = %service,
            phase = %phase,
            "service is not enabled for this phase; running anyway"
        );
    }

    let runner = ServiceRunner::new(root);
    let code = runner.run_service(descriptor, phase).await?;
    if code != 0 {
        bail!("service '{service}' exited with code {code}");
    }
    Ok(())
}

async fn wait_for_shutdown(flags: &WatchFlags) {
    while !flags.shutdown_requested() {
        tokio::time::sleep(POLL_TIMEOUT).await;
    }
}
