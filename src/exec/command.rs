// src/exec/command.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::watch::sources::BuildSource;

/// Result of one external build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failed {
        /// Exit code, or -1 when the process could not be spawned/reaped.
        code: i32,
        /// Tail of the captured stderr, for the failure report.
        diagnostics: String,
    },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success)
    }
}

/// Capability the watch loop rebuilds sources through.
///
/// Injected rather than invoked inline so the loop can be exercised with a
/// fake builder in tests; the boxed future keeps the trait object-safe.
pub trait Builder: Send {
    fn build<'a>(
        &'a mut self,
        source: &'a BuildSource,
    ) -> Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'a>>;
}

/// Production [`Builder`]: renders the source's command template and runs it
/// through the platform shell with the project root as working directory.
#[derive(Debug, Clone)]
pub struct ShellBuilder {
    root: PathBuf,
}

impl ShellBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Builder for ShellBuilder {
    fn build<'a>(
        &'a mut self,
        source: &'a BuildSource,
    ) -> Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'a>> {
        Box::pin(async move {
            let rendered = render_command(&source.cmd, source);
            debug!(label = %source.label, cmd = %rendered, "running build command");

            let mut cmd = shell_command(&rendered);
            cmd.current_dir(&self.root)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            match cmd.output().await {
                Ok(output) if output.status.success() => BuildOutcome::Success,
                Ok(output) => BuildOutcome::Failed {
                    code: output.status.code().unwrap_or(-1),
                    diagnostics: tail(&output.stderr),
                },
                Err(err) => BuildOutcome::Failed {
                    code: -1,
                    diagnostics: format!("failed to spawn build command: {err}"),
                },
            }
        })
    }
}

/// Substitute `{input}` / `{output}` into a build command template.
fn render_command(template: &str, source: &BuildSource) -> String {
    template
        .replace("{input}", &source.input.display().to_string())
        .replace("{output}", &source.output.display().to_string())
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(cmdline: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmdline);
        c
    }
}

/// Last few lines of captured output, for failure reports.
pub(crate) fn tail(bytes: &[u8]) -> String {
    const MAX_LINES: usize = 20;

    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join("\n")
}
