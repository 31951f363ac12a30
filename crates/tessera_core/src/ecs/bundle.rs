//! # Bundles
//!
//! A bundle is a tuple of components spawned together. The world sorts its
//! members by residency: archetype-resident members pick the destination
//! archetype, sparse-resident members go straight into their sets.

use super::component::{Component, ComponentId, ComponentRegistry};

/// A statically typed group of components, implemented for tuples of one to
/// ten components.
pub trait Bundle: Send + Sync + 'static {
    /// Ids of the members in tuple order, registering them if needed.
    ///
    /// # Panics
    ///
    /// Panics if the tuple names a component type twice.
    fn component_ids(registry: &ComponentRegistry) -> Vec<ComponentId>;

    /// Calls `f` with each member's tuple position and raw bytes.
    fn for_each_bytes(&self, f: &mut dyn FnMut(usize, &[u8]));
}

macro_rules! impl_bundle {
    ($(($ty:ident, $idx:tt)),+) => {
        impl<$($ty: Component),+> Bundle for ($($ty,)+) {
            fn component_ids(registry: &ComponentRegistry) -> Vec<ComponentId> {
                let ids = vec![$(registry.id_of::<$ty>()),+];
                for (i, id) in ids.iter().enumerate() {
                    assert!(
                        !ids[..i].contains(id),
                        "bundle lists component {} twice",
                        registry.info(*id).map_or("<unknown>", |info| info.name),
                    );
                }
                ids
            }

            #[inline]
            fn for_each_bytes(&self, f: &mut dyn FnMut(usize, &[u8])) {
                $(f($idx, bytemuck::bytes_of(&self.$idx));)+
            }
        }
    };
}

impl_bundle!((A, 0));
impl_bundle!((A, 0), (B, 1));
impl_bundle!((A, 0), (B, 1), (C, 2));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7), (I, 8));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7), (I, 8), (J, 9));

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Mass(f32);
    impl Component for Mass {}

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Charge(i32);
    impl Component for Charge {}

    #[test]
    fn test_ids_in_tuple_order() {
        let registry = ComponentRegistry::new();
        let charge = registry.id_of::<Charge>();
        let ids = <(Mass, Charge)>::component_ids(&registry);
        assert_eq!(ids, vec![registry.id_of::<Mass>(), charge]);
    }

    #[test]
    fn test_bytes_follow_members() {
        let mut seen = Vec::new();
        (Mass(1.0), Charge(-2)).for_each_bytes(&mut |i, bytes| seen.push((i, bytes.to_vec())));
        assert_eq!(seen[0], (0, 1.0f32.to_ne_bytes().to_vec()));
        assert_eq!(seen[1], (1, (-2i32).to_ne_bytes().to_vec()));
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn test_duplicate_member_panics() {
        let registry = ComponentRegistry::new();
        let _ = <(Mass, Mass)>::component_ids(&registry);
    }
}
