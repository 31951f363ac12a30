//! # Relations
//!
//! Typed edges between entities, kept beside component storage rather than
//! inside it. Relation kinds are their own id space and never appear in a
//! component mask.
//!
//! Both directions are indexed:
//! - Forward: `(source, kind) -> targets`
//! - Reverse: `(target, kind) -> sources`

use std::collections::HashMap;

use super::entity::Entity;

/// Identifier of a relation kind within one world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationKind(u32);

impl RelationKind {
    /// Built-in parent link. Exclusive: a child has at most one parent.
    pub const CHILD_OF: Self = Self(0);

    /// Numeric value of the kind.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct KindInfo {
    name: String,
    exclusive: bool,
}

/// Bidirectional relation edges of one world.
#[derive(Clone, Debug)]
pub struct RelationStore {
    kinds: Vec<KindInfo>,
    by_name: HashMap<String, RelationKind>,
    forward: HashMap<(Entity, RelationKind), Vec<Entity>>,
    reverse: HashMap<(Entity, RelationKind), Vec<Entity>>,
}

impl Default for RelationStore {
    fn default() -> Self {
        let mut store = Self {
            kinds: Vec::new(),
            by_name: HashMap::new(),
            forward: HashMap::new(),
            reverse: HashMap::new(),
        };
        store.define("ChildOf", true);
        store
    }
}

impl RelationStore {
    /// Creates a store with only the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn define(&mut self, name: &str, exclusive: bool) -> RelationKind {
        if let Some(&kind) = self.by_name.get(name) {
            return kind;
        }
        let kind = RelationKind(self.kinds.len() as u32);
        self.kinds.push(KindInfo { name: name.to_owned(), exclusive });
        self.by_name.insert(name.to_owned(), kind);
        kind
    }

    /// Registers a many-to-many kind by name, or returns the existing one.
    pub fn register(&mut self, name: &str) -> RelationKind {
        self.define(name, false)
    }

    /// Registers a kind where each source has at most one target. Adding a
    /// second target replaces the first.
    pub fn register_exclusive(&mut self, name: &str) -> RelationKind {
        self.define(name, true)
    }

    /// Kind registered under `name`.
    #[must_use]
    pub fn kind(&self, name: &str) -> Option<RelationKind> {
        self.by_name.get(name).copied()
    }

    /// Name of a registered kind.
    #[must_use]
    pub fn name(&self, kind: RelationKind) -> Option<&str> {
        self.kinds.get(kind.index()).map(|info| info.name.as_str())
    }

    fn is_exclusive(&self, kind: RelationKind) -> bool {
        self.kinds.get(kind.index()).is_some_and(|info| info.exclusive)
    }

    /// Adds an edge. Adding an existing edge is a no-op.
    ///
    /// # Returns
    ///
    /// `false` if the edge already existed.
    pub fn add(&mut self, source: Entity, kind: RelationKind, target: Entity) -> bool {
        if self.has(source, kind, target) {
            return false;
        }
        if self.is_exclusive(kind) {
            for old in self.targets(source, kind).to_vec() {
                self.remove(source, kind, old);
            }
        }
        self.forward.entry((source, kind)).or_default().push(target);
        self.reverse.entry((target, kind)).or_default().push(source);
        true
    }

    /// Removes an edge.
    ///
    /// # Returns
    ///
    /// `false` if there was no such edge.
    pub fn remove(&mut self, source: Entity, kind: RelationKind, target: Entity) -> bool {
        let removed = detach(&mut self.forward, (source, kind), target);
        if removed {
            detach(&mut self.reverse, (target, kind), source);
        }
        removed
    }

    /// Checks for an edge.
    #[must_use]
    pub fn has(&self, source: Entity, kind: RelationKind, target: Entity) -> bool {
        self.targets(source, kind).contains(&target)
    }

    /// Targets of `source` under `kind`, in insertion order.
    #[must_use]
    pub fn targets(&self, source: Entity, kind: RelationKind) -> &[Entity] {
        self.forward.get(&(source, kind)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sources pointing at `target` under `kind`, in insertion order.
    #[must_use]
    pub fn sources(&self, target: Entity, kind: RelationKind) -> &[Entity] {
        self.reverse.get(&(target, kind)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Removes every edge that starts or ends at `entity`.
    pub fn remove_entity(&mut self, entity: Entity) {
        for index in 0..self.kinds.len() {
            let kind = RelationKind(index as u32);
            if let Some(targets) = self.forward.remove(&(entity, kind)) {
                for target in targets {
                    detach(&mut self.reverse, (target, kind), entity);
                }
            }
            if let Some(sources) = self.reverse.remove(&(entity, kind)) {
                for source in sources {
                    detach(&mut self.forward, (source, kind), entity);
                }
            }
        }
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }
}

fn detach(
    index: &mut HashMap<(Entity, RelationKind), Vec<Entity>>,
    key: (Entity, RelationKind),
    other: Entity,
) -> bool {
    let Some(list) = index.get_mut(&key) else {
        return false;
    };
    let Some(position) = list.iter().position(|&e| e == other) else {
        return false;
    };
    list.remove(position);
    if list.is_empty() {
        index.remove(&key);
    }
    true
}
