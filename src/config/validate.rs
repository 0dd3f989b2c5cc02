// src/config/validate.rs

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::ConfigFile;
use crate::services::Phase;

/// Run semantic validation against a loaded configuration.
///
/// Fatal checks:
/// - at least one `[[source]]` or `[service.<name>]`
/// - every glob pattern (excludes, overrides, glob inputs) compiles
/// - glob inputs come with a templated `output` (`{dir}` / `{stem}`)
/// - every source resolves to a non-empty build command
/// - no debounce window of zero
/// - phase names are valid, no service lists itself in `after`
///
/// Warning-level checks (the scheduler tolerates these at plan time, so the
/// config layer only surfaces them early):
/// - `after` naming a service that does not exist
/// - dependency cycles between services
///
/// It does **not** validate `ready_on_stdout` regexes; the runner compiles
/// them lazily and ignores invalid ones with a warning.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_work(cfg)?;
    validate_watch_section(cfg)?;
    validate_sources(cfg)?;
    validate_services(cfg)?;
    warn_on_dependency_problems(cfg);
    Ok(())
}

fn ensure_has_work(cfg: &ConfigFile) -> Result<()> {
    if cfg.sources.is_empty() && cfg.services.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [[source]] or [service.<name>] section"
        ));
    }
    Ok(())
}

fn validate_watch_section(cfg: &ConfigFile) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(anyhow!("[watch].debounce_ms must be >= 1 (got 0)"));
    }

    for pattern in cfg.watch.exclude.iter() {
        Glob::new(pattern)
            .with_context(|| format!("invalid [watch].exclude pattern: {pattern}"))?;
    }

    for ov in cfg.watch.overrides.iter() {
        Glob::new(&ov.pattern)
            .with_context(|| format!("invalid [[watch.override]] pattern: {}", ov.pattern))?;
        if ov.debounce_ms == 0 {
            return Err(anyhow!(
                "[[watch.override]] for pattern '{}' has debounce_ms 0",
                ov.pattern
            ));
        }
    }

    Ok(())
}

fn validate_sources(cfg: &ConfigFile) -> Result<()> {
    for (idx, source) in cfg.sources.iter().enumerate() {
        let cmd = source.cmd.as_deref().or(cfg.build.cmd.as_deref());
        match cmd {
            None => {
                return Err(anyhow!(
                    "source '{}' has no cmd and no [build].cmd default is set",
                    source.input
                ));
            }
            Some(c) if c.trim().is_empty() => {
                return Err(anyhow!("source '{}' has an empty build command", source.input));
            }
            Some(_) => {}
        }

        if source.debounce_ms == Some(0) {
            return Err(anyhow!(
                "source '{}' has debounce_ms 0; use a positive window",
                source.input
            ));
        }

        if is_glob(&source.input) {
            Glob::new(&source.input).with_context(|| {
                format!("invalid glob in [[source]] #{}: {}", idx + 1, source.input)
            })?;

            if !source.output.contains("{dir}") && !source.output.contains("{stem}") {
                return Err(anyhow!(
                    "source '{}' is a glob but its output '{}' has no {{dir}}/{{stem}} placeholder",
                    source.input,
                    source.output
                ));
            }
        }
    }

    Ok(())
}

fn validate_services(cfg: &ConfigFile) -> Result<()> {
    for (name, service) in cfg.services.iter() {
        if service.cmd.trim().is_empty() {
            return Err(anyhow!("service '{}' has an empty cmd", name));
        }

        if let Some(phases) = &service.phases {
            for phase in phases {
                Phase::from_str(phase).map_err(|e| anyhow!(e)).with_context(|| {
                    format!("invalid phase for service '{}'", name)
                })?;
            }
        }

        for dep in service.after.iter() {
            if dep == name {
                return Err(anyhow!(
                    "service '{}' cannot depend on itself in `after`",
                    name
                ));
            }
        }
    }

    Ok(())
}

/// Unknown and cyclic `after` declarations are tolerated by the scheduler
/// (the plan falls back to declaration order for the affected services), so
/// they are reported here as warnings rather than errors.
fn warn_on_dependency_problems(cfg: &ConfigFile) {
    for (name, service) in cfg.services.iter() {
        for dep in service.after.iter() {
            if !cfg.services.contains_key(dep) {
                warn!(
                    service = %name,
                    dependency = %dep,
                    "service depends on an undeclared service; it will be \
                     ordered without this constraint"
                );
            }
        }
    }

    // Edge direction: dep -> service, so a toposort failure names a service
    // on a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.services.keys() {
        graph.add_node(name.as_str());
    }

    for (name, service) in cfg.services.iter() {
        for dep in service.after.iter() {
            if cfg.services.contains_key(dep) {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        warn!(
            service = %cycle.node_id(),
            "cycle in service `after` declarations; affected services will \
             run in declaration order"
        );
    }
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}
