// src/exec/service.rs

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::exec::command::{shell_command, tail};
use crate::services::scheduler::{Phase, ScheduledPlan, ServiceDescriptor};

/// How long a long-lived service may take to match its `ready_on_stdout`
/// pattern before the runner gives up waiting and moves on.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A spawned long-lived service, kept so it can be stopped at shutdown.
pub struct RunningService {
    pub name: String,
    child: Child,
}

/// Executes scheduled plans: one service at a time, in plan order.
///
/// The runner performs no ordering decisions of its own; it takes whatever
/// the scheduler computed. A short-lived service failing is reported and the
/// phase continues with the next one.
pub struct ServiceRunner {
    root: PathBuf,
}

impl ServiceRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Run every service of `plan` in order. Returns the long-lived
    /// services that are now running, in start order.
    pub async fn run_phase(
        &self,
        plan: &ScheduledPlan,
        phase: Phase,
    ) -> Result<Vec<RunningService>> {
        if let Some(ambiguity) = &plan.ambiguity {
            warn!(phase = %phase, "{ambiguity}");
        }

        let mut running = Vec::new();

        for descriptor in plan.services.iter() {
            if descriptor.long_lived {
                running.push(self.spawn_long_lived(descriptor, phase).await?);
            } else {
                let code = self.run_service(descriptor, phase).await?;
                if code != 0 {
                    warn!(
                        service = %descriptor.name,
                        exit_code = code,
                        "service failed; continuing with the rest of the phase"
                    );
                }
            }
        }

        Ok(running)
    }

    /// Run one service to completion and return its exit code.
    ///
    /// The phase is exposed to the subprocess as `BUILDWATCH_PHASE`.
    pub async fn run_service(&self, descriptor: &ServiceDescriptor, phase: Phase) -> Result<i32> {
        info!(service = %descriptor.name, phase = %phase, "running service");

        let mut cmd = shell_command(&descriptor.cmd);
        cmd.current_dir(&self.root)
            .env("BUILDWATCH_PHASE", phase.as_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("spawning process for service '{}'", descriptor.name))?;

        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            let diagnostics = tail(&output.stderr);
            if !diagnostics.is_empty() {
                warn!(service = %descriptor.name, "stderr tail:\n{diagnostics}");
            }
        }

        Ok(code)
    }

    /// Spawn a long-lived service. When `ready_on_stdout` is set, wait (with
    /// a bound) until a stdout line matches before returning, so dependents
    /// only start against a ready service.
    async fn spawn_long_lived(
        &self,
        descriptor: &ServiceDescriptor,
        phase: Phase,
    ) -> Result<RunningService> {
        info!(service = %descriptor.name, phase = %phase, "starting long-lived service");

        let mut cmd = shell_command(&descriptor.cmd);
        cmd.current_dir(&self.root)
            .env("BUILDWATCH_PHASE", phase.as_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for service '{}'", descriptor.name))?;

        // Always consume stderr so buffers don't fill; log at debug.
        if let Some(stderr) = child.stderr.take() {
            let name = descriptor.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(service = %name, "stderr: {}", line);
                }
            });
        }

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();

            if let Some(gate) = ready_gate(descriptor) {
                let name = descriptor.name.clone();
                let wait = tokio::time::timeout(READY_TIMEOUT, async {
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!(service = %name, "stdout: {}", line);
                        if gate.is_match(&line) {
                            return true;
                        }
                    }
                    false
                })
                .await;

                match wait {
                    Ok(true) => debug!(service = %descriptor.name, "service reported ready"),
                    Ok(false) => warn!(
                        service = %descriptor.name,
                        "stdout closed before the service reported ready"
                    ),
                    Err(_) => warn!(
                        service = %descriptor.name,
                        timeout_secs = READY_TIMEOUT.as_secs(),
                        "service did not report ready in time; continuing"
                    ),
                }
            }

            // Keep draining in the background for the service's lifetime.
            let name = descriptor.name.clone();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(service = %name, "stdout: {}", line);
                }
            });
        }

        Ok(RunningService {
            name: descriptor.name.clone(),
            child,
        })
    }

    /// Stop long-lived services in reverse start order.
    pub async fn shutdown(services: Vec<RunningService>) {
        for mut service in services.into_iter().rev() {
            match service.child.kill().await {
                Ok(()) => info!(service = %service.name, "service stopped"),
                Err(err) => warn!(
                    service = %service.name,
                    error = %err,
                    "failed to stop service"
                ),
            }
        }
    }
}

fn ready_gate(descriptor: &ServiceDescriptor) -> Option<Regex> {
    let pattern = descriptor.ready_on_stdout.as_ref()?;
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(
                service = %descriptor.name,
                pattern = %pattern,
                error = %err,
                "invalid ready_on_stdout regex; ignoring"
            );
            None
        }
    }
}
