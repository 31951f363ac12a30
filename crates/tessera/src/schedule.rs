//! # System Scheduler
//!
//! Orders named systems within each [`Stage`] from `after` / `before`
//! constraints and installs them as stage callbacks.
//!
//! ## Ordering
//!
//! Each stage is sorted independently with Kahn's algorithm. When several
//! systems are ready at once, the one added first runs first, so a schedule
//! without constraints runs in insertion order. Constraints only relate
//! systems of the same stage; stages themselves always run in
//! [`Stage::ALL`] order.

use std::collections::{BTreeSet, HashMap};

use tessera_core::{Stage, World};

use crate::error::ScheduleError;

/// Name, stage and ordering constraints of one system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDescriptor {
    name: String,
    stage: Stage,
    after: Vec<String>,
    before: Vec<String>,
}

impl SystemDescriptor {
    /// A system named `name` in [`Stage::Update`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stage: Stage::Update, after: Vec::new(), before: Vec::new() }
    }

    /// Moves the system to `stage`.
    #[must_use]
    pub fn in_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Runs the system after `other`.
    #[must_use]
    pub fn after(mut self, other: impl Into<String>) -> Self {
        self.after.push(other.into());
        self
    }

    /// Runs the system before `other`.
    #[must_use]
    pub fn before(mut self, other: impl Into<String>) -> Self {
        self.before.push(other.into());
        self
    }

    /// The system's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The system's stage.
    #[inline]
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }
}

type System = Box<dyn FnMut(&mut World) + Send>;

struct Entry {
    descriptor: SystemDescriptor,
    run: Option<System>,
}

/// Collects systems, orders them and installs them into a world.
///
/// # Example
///
/// ```rust,ignore
/// let mut schedule = Schedule::new();
/// schedule
///     .add_system(SystemDescriptor::new("integrate"), integrate)
///     .add_system(SystemDescriptor::new("input").before("integrate"), read_input);
/// schedule.build(&mut world)?;
/// schedule.run(&mut world);
/// ```
#[derive(Default)]
pub struct Schedule {
    entries: Vec<Entry>,
    order: Vec<(Stage, Vec<String>)>,
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("systems", &self.entries.iter().map(|e| &e.descriptor).collect::<Vec<_>>())
            .field("order", &self.order)
            .finish()
    }
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a system. Constraints are checked by [`build`](Self::build).
    pub fn add_system(
        &mut self,
        descriptor: SystemDescriptor,
        system: impl FnMut(&mut World) + Send + 'static,
    ) -> &mut Self {
        self.entries.push(Entry { descriptor, run: Some(Box::new(system)) });
        self
    }

    /// Number of systems added and not yet installed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|entry| entry.run.is_some()).count()
    }

    /// Installed order of each non-empty stage, in stage order.
    #[must_use]
    pub fn order(&self) -> &[(Stage, Vec<String>)] {
        &self.order
    }

    /// Orders every stage and installs the systems into `world` as stage
    /// callbacks.
    ///
    /// Nothing is installed unless every stage orders cleanly.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::DuplicateSystem`] if two systems share a name
    /// - [`ScheduleError::UnknownDependency`] if a constraint names a system
    ///   missing from the same stage
    /// - [`ScheduleError::Cycle`] if a stage's constraints are circular
    pub fn build(&mut self, world: &mut World) -> Result<(), ScheduleError> {
        let mut seen = HashMap::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let name = entry.descriptor.name();
            if seen.insert(name, index).is_some() {
                return Err(ScheduleError::DuplicateSystem(name.to_owned()));
            }
        }

        let mut plan = Vec::new();
        for stage in Stage::ALL {
            let members: Vec<usize> = (0..self.entries.len())
                .filter(|&i| self.entries[i].run.is_some() && self.entries[i].descriptor.stage == stage)
                .collect();
            if !members.is_empty() {
                plan.push((stage, self.sort_stage(stage, &members)?));
            }
        }

        let mut installed = 0;
        for (stage, order) in &plan {
            let mut names = Vec::with_capacity(order.len());
            for &index in order {
                let entry = &mut self.entries[index];
                if let Some(run) = entry.run.take() {
                    world.add_stage_callback(*stage, entry.descriptor.name.clone(), run);
                    names.push(entry.descriptor.name.clone());
                    installed += 1;
                }
            }
            tracing::debug!(?stage, ?names, "ordered stage");
            self.order.push((*stage, names));
        }
        tracing::info!(systems = installed, stages = plan.len(), "built schedule");
        Ok(())
    }

    /// Kahn's algorithm over one stage. `members` holds entry indices in
    /// insertion order; the result is a permutation of it.
    fn sort_stage(&self, stage: Stage, members: &[usize]) -> Result<Vec<usize>, ScheduleError> {
        let local: HashMap<&str, usize> = members
            .iter()
            .enumerate()
            .map(|(slot, &index)| (self.entries[index].descriptor.name(), slot))
            .collect();

        let resolve = |system: &SystemDescriptor, name: &str| {
            local.get(name).copied().ok_or_else(|| ScheduleError::UnknownDependency {
                system: system.name.clone(),
                dependency: name.to_owned(),
            })
        };

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); members.len()];
        let mut in_degree = vec![0usize; members.len()];
        for (slot, &index) in members.iter().enumerate() {
            let descriptor = &self.entries[index].descriptor;
            for name in &descriptor.after {
                let before = resolve(descriptor, name)?;
                successors[before].push(slot);
                in_degree[slot] += 1;
            }
            for name in &descriptor.before {
                let after = resolve(descriptor, name)?;
                successors[slot].push(after);
                in_degree[after] += 1;
            }
        }

        // Lowest slot first keeps unconstrained systems in insertion order
        let mut ready: BTreeSet<usize> = (0..members.len()).filter(|&s| in_degree[s] == 0).collect();
        let mut sorted = Vec::with_capacity(members.len());
        while let Some(slot) = ready.pop_first() {
            sorted.push(members[slot]);
            for &next in &successors[slot] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if sorted.len() < members.len() {
            let systems = (0..members.len())
                .filter(|&slot| in_degree[slot] > 0)
                .map(|slot| self.entries[members[slot]].descriptor.name.clone())
                .collect();
            return Err(ScheduleError::Cycle { stage, systems });
        }
        Ok(sorted)
    }

    /// Runs every stage of `world` once, in stage order.
    pub fn run(&self, world: &mut World) {
        for stage in Stage::ALL {
            world.run_stage(stage);
        }
    }
}
