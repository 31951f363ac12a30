//! # Stages
//!
//! Named phases of a frame. Callbacks registered on a stage run in
//! registration order each time the stage runs; ordering across callbacks
//! is decided by whoever registers them.

use super::world::World;

/// A phase of the frame, run in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Before anything else.
    First,
    /// Input gathering, spawning.
    PreUpdate,
    /// Main simulation.
    Update,
    /// Reactions to the simulation.
    PostUpdate,
    /// Cleanup.
    Last,
}

impl Stage {
    /// Every stage in run order.
    pub const ALL: [Self; 5] = [Self::First, Self::PreUpdate, Self::Update, Self::PostUpdate, Self::Last];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// A callback run by [`World::run_stage`].
pub type StageCallback = Box<dyn FnMut(&mut World) + Send>;

pub(crate) struct NamedCallback {
    pub(crate) name: String,
    pub(crate) run: StageCallback,
}

/// Callbacks per stage.
#[derive(Default)]
pub(crate) struct StageCallbacks {
    stages: [Vec<NamedCallback>; 5],
}

impl StageCallbacks {
    pub(crate) fn push(&mut self, stage: Stage, name: String, run: StageCallback) {
        self.stages[stage.index()].push(NamedCallback { name, run });
    }

    /// Takes a stage's callbacks out so they can borrow the world mutably.
    pub(crate) fn take(&mut self, stage: Stage) -> Vec<NamedCallback> {
        std::mem::take(&mut self.stages[stage.index()])
    }

    /// Puts callbacks back in front of any registered while they ran.
    pub(crate) fn restore(&mut self, stage: Stage, mut callbacks: Vec<NamedCallback>) {
        let slot = &mut self.stages[stage.index()];
        callbacks.append(slot);
        *slot = callbacks;
    }

    pub(crate) fn names(&self, stage: Stage) -> Vec<&str> {
        self.stages[stage.index()].iter().map(|callback| callback.name.as_str()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for StageCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for stage in Stage::ALL {
            map.entry(&stage, &self.names(stage));
        }
        map.finish()
    }
}
