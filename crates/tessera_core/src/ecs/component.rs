//! # Component System
//!
//! Components are pure data containers with no behavior. They must be
//! plain-old-data so the storage layer can move them as raw bytes between
//! archetype columns and sparse sets.
//!
//! Ids are not fixed at compile time: each [`ComponentRegistry`] hands out
//! the next free id the first time it sees a type, so two worlds never share
//! hidden global state.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use bytemuck::Pod;
use parking_lot::RwLock;

use super::mask::{ComponentMask, MASK_CAPACITY};
use super::storage::Column;
use crate::error::{CoreError, CoreResult};

/// Dense identifier of a component type within one world.
pub type ComponentId = u16;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod`: Plain old data, bitwise copyable and safe to reinterpret
/// - `Send + Sync`: Columns are shared with worker threads
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Pod + Send + Sync {
    /// Human-readable name used in logs and panics.
    #[must_use]
    fn name() -> &'static str {
        type_name::<Self>()
    }
}

/// Layout metadata for one registered component type.
///
/// Immutable once registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Assigned id.
    pub id: ComponentId,
    /// Type name.
    pub name: &'static str,
    /// Rust type identity.
    pub type_id: TypeId,
    /// Size of one value in bytes.
    pub size: usize,
    /// Alignment requirement in bytes.
    pub align: usize,
}

impl ComponentInfo {
    fn of<T: Component>(id: ComponentId) -> Self {
        Self {
            id,
            name: T::name(),
            type_id: TypeId::of::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }

    /// Allocates an empty column able to hold `capacity` values of this
    /// component.
    #[must_use]
    pub fn new_column(&self, capacity: usize) -> Column {
        Column::new(self.size, self.align, capacity)
    }

    /// `true` for zero-sized tag components.
    #[inline]
    #[must_use]
    pub const fn is_tag(&self) -> bool {
        self.size == 0
    }
}

#[derive(Default)]
struct RegistryInner {
    by_type: HashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
}

/// Assigns ids and layout metadata to component types on first use.
///
/// Registration takes a short write lock; lookups of already-registered
/// types take a read lock, so queries built from shared references can
/// resolve ids concurrently.
#[derive(Default)]
pub struct ComponentRegistry {
    inner: RwLock<RegistryInner>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `T`, registering it if this is its first use.
    ///
    /// # Panics
    ///
    /// Panics if all 256 ids are taken.
    pub fn id_of<T: Component>(&self) -> ComponentId {
        if let Some(id) = self.lookup::<T>() {
            return id;
        }
        match self.register::<T>() {
            Ok(id) => id,
            Err(err) => panic!("cannot register {}: {err}", T::name()),
        }
    }

    /// Registers `T`, returning its id. Registering twice returns the
    /// existing id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RegistryFull`] once 256 types are registered.
    pub fn register<T: Component>(&self) -> CoreResult<ComponentId> {
        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_type.get(&TypeId::of::<T>()) {
            return Ok(id);
        }
        if inner.infos.len() >= MASK_CAPACITY {
            return Err(CoreError::RegistryFull { capacity: MASK_CAPACITY });
        }

        let id = inner.infos.len() as ComponentId;
        let info = ComponentInfo::of::<T>(id);
        inner.infos.push(info);
        inner.by_type.insert(info.type_id, id);
        tracing::debug!(id, name = info.name, size = info.size, "registered component");
        Ok(id)
    }

    /// Id of `T` if it has been registered.
    #[must_use]
    pub fn lookup<T: Component>(&self) -> Option<ComponentId> {
        self.inner.read().by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Layout metadata for `id`.
    #[must_use]
    pub fn info(&self, id: ComponentId) -> Option<ComponentInfo> {
        self.inner.read().infos.get(usize::from(id)).copied()
    }

    /// Metadata of every registered component, in id order.
    #[must_use]
    pub fn infos(&self) -> Vec<ComponentInfo> {
        self.inner.read().infos.clone()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().infos.len()
    }

    /// `true` if nothing is registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A statically known set of component types, implemented for tuples of
/// one to ten components.
///
/// Used by query builders: `query.all::<(Position, Velocity)>()`.
pub trait ComponentSet: 'static {
    /// Ids of the member types, registering them if needed.
    fn ids(registry: &ComponentRegistry) -> Vec<ComponentId>;

    /// Mask of the member types, registering them if needed.
    fn mask(registry: &ComponentRegistry) -> ComponentMask {
        Self::ids(registry).into_iter().collect()
    }
}

macro_rules! impl_component_set {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentSet for ($($t,)+) {
            fn ids(registry: &ComponentRegistry) -> Vec<ComponentId> {
                vec![$(registry.id_of::<$t>()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
impl_component_set!(A, B, C, D, E, F, G, H, I);
impl_component_set!(A, B, C, D, E, F, G, H, I, J);
