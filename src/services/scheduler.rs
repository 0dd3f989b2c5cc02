// src/services/scheduler.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use crate::config::model::ConfigFile;
use crate::errors::{SchedulingAmbiguity, UnknownServiceError};

/// Execution phase a service can be enabled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// One-shot setup at startup.
    Init,
    /// Development watch session.
    Watch,
    /// Production build.
    Build,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Watch => "watch",
            Phase::Build => "build",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "init" => Ok(Phase::Init),
            "watch" => Ok(Phase::Watch),
            "build" => Ok(Phase::Build),
            other => Err(format!(
                "invalid phase: {other} (expected \"init\", \"watch\" or \"build\")"
            )),
        }
    }
}

/// Immutable record describing one auxiliary service.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Numeric order hint; lower starts earlier, ties keep registration
    /// order.
    pub order: i32,
    /// Services that must be started before this one.
    pub after: Vec<String>,
    /// Phases this service participates in; `None` means all of them.
    pub phases: Option<Vec<Phase>>,
    pub cmd: String,
    pub long_lived: bool,
    pub ready_on_stdout: Option<String>,
}

impl ServiceDescriptor {
    pub fn enabled_for(&self, phase: Phase) -> bool {
        match &self.phases {
            None => true,
            Some(phases) => phases.contains(&phase),
        }
    }
}

/// Ordered start sequence for one phase.
///
/// `ambiguity` is set when the tolerant fallback had to append services
/// whose dependency constraints could not be satisfied (cycle, or a
/// dependency outside the phase's enabled set). The plan is still total:
/// every enabled service appears exactly once.
#[derive(Debug, Clone)]
pub struct ScheduledPlan {
    pub services: Vec<ServiceDescriptor>,
    pub ambiguity: Option<SchedulingAmbiguity>,
}

impl ScheduledPlan {
    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Registry of service descriptors plus the per-phase ordering computation.
///
/// `plan` takes `&self` and holds no cross-call state, so it can be called
/// from multiple contexts as long as `register` is not running concurrently.
#[derive(Debug, Default)]
pub struct ServiceScheduler {
    entries: Vec<ServiceDescriptor>,
    index: HashMap<String, usize>,
}

impl ServiceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a scheduler from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut scheduler = Self::new();

        for (name, service) in cfg.services.iter() {
            let phases = match &service.phases {
                None => None,
                Some(raw) => {
                    let parsed = raw
                        .iter()
                        .map(|p| Phase::from_str(p).map_err(|e| anyhow!(e)))
                        .collect::<Result<Vec<Phase>>>()
                        .with_context(|| format!("service '{}'", name))?;
                    Some(parsed)
                }
            };

            scheduler.register(ServiceDescriptor {
                name: name.clone(),
                order: service.order,
                after: service.after.clone(),
                phases,
                cmd: service.cmd.clone(),
                long_lived: service.long_lived,
                ready_on_stdout: service.ready_on_stdout.clone(),
            });
        }

        Ok(scheduler)
    }

    /// Add a descriptor, overwriting any previous one with the same name.
    /// An overwrite keeps the original registration position.
    pub fn register(&mut self, descriptor: ServiceDescriptor) {
        match self.index.get(&descriptor.name) {
            Some(&idx) => {
                debug!(service = %descriptor.name, "overwriting registered service");
                self.entries[idx] = descriptor;
            }
            None => {
                self.index.insert(descriptor.name.clone(), self.entries.len());
                self.entries.push(descriptor);
            }
        }
    }

    /// Look up a descriptor by name.
    pub fn get(&self, name: &str) -> Result<&ServiceDescriptor, UnknownServiceError> {
        self.index
            .get(name)
            .map(|&idx| &self.entries[idx])
            .ok_or_else(|| UnknownServiceError(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the start order for `phase`.
    ///
    /// 1. Filter to services enabled for the phase.
    /// 2. Stable-sort by `order` (ties keep registration order).
    /// 3. Repeatedly scan the remainder, moving out any service whose
    ///    `after` entries are all already placed.
    /// 4. If a full pass places nothing, append the remainder in its
    ///    current relative order and report the names as an ambiguity —
    ///    a cycle or a dependency missing from the filtered set must not
    ///    keep a service from running.
    pub fn plan(&self, phase: Phase) -> ScheduledPlan {
        let mut remaining: Vec<ServiceDescriptor> = self
            .entries
            .iter()
            .filter(|d| d.enabled_for(phase))
            .cloned()
            .collect();

        remaining.sort_by_key(|d| d.order);

        let mut services: Vec<ServiceDescriptor> = Vec::with_capacity(remaining.len());
        let mut placed: HashSet<String> = HashSet::new();

        while !remaining.is_empty() {
            let mut still = Vec::new();
            let mut progressed = false;

            for descriptor in remaining {
                if descriptor.after.iter().all(|dep| placed.contains(dep)) {
                    placed.insert(descriptor.name.clone());
                    services.push(descriptor);
                    progressed = true;
                } else {
                    still.push(descriptor);
                }
            }

            remaining = still;

            if !progressed {
                let names: Vec<String> =
                    remaining.iter().map(|d| d.name.clone()).collect();
                warn!(
                    phase = %phase,
                    services = ?names,
                    "unsatisfiable service dependencies; appending in declaration order"
                );
                services.extend(remaining);
                return ScheduledPlan {
                    services,
                    ambiguity: Some(SchedulingAmbiguity { names }),
                };
            }
        }

        ScheduledPlan {
            services,
            ambiguity: None,
        }
    }
}
