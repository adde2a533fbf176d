//! Archetype templates and the pool arena that backs them.
//!
//! An [`Archetype`] is a named template: a default [`ComponentMask`] plus a
//! default JSON value per component kind. Each registered archetype owns a
//! contiguous [`EntityPool`] of slots, handed out by the [`ArchetypeArena`].
//!
//! Slot layout, in registration order:
//!
//! ```text
//! [ default: 0 ][ archetype 1 pool ][ archetype 2 pool ] ... [ free entities -> ]
//! ```
//!
//! Everything past the last pool belongs to the default archetype and grows on
//! demand. Resizing a pool splices the slots in place, so every later pool and
//! every free entity moves; see [`EntityShift`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::{Component, component_from_json};
use crate::entity::{EntityIndex, EntityShift};
use crate::error::EcsError;
use crate::mask::{ComponentKind, ComponentMask};

/// Identifies a registered archetype. Ids follow registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchetypeId(pub u32);

impl ArchetypeId {
    /// The always-present default archetype.
    pub const DEFAULT: ArchetypeId = ArchetypeId(0);

    /// Returns the id as a `usize`, ready for indexing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Archetype({})", self.0)
    }
}

/// A named entity template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    /// Unique human-readable name (e.g. `"debris"`).
    pub name: String,
    /// Components and flags every instance starts with.
    pub mask: ComponentMask,
    /// Default value per component kind. Kinds missing here use the
    /// component type's `Default`.
    #[serde(default)]
    pub components: BTreeMap<ComponentKind, Value>,
}

impl Archetype {
    /// Name of the built-in default archetype.
    pub const DEFAULT_NAME: &'static str = "default";

    /// Create an archetype whose instances start active and visible, with no
    /// components.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mask: ComponentMask::IS_ACTIVE | ComponentMask::IS_VISIBLE,
            components: BTreeMap::new(),
        }
    }

    /// The built-in default archetype.
    #[must_use]
    pub fn default_archetype() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }

    /// Add a component with its default value.
    ///
    /// # Panics
    ///
    /// Panics if the value cannot be encoded to JSON, which only happens for
    /// component types with non-string map keys or failing `Serialize` impls.
    #[must_use]
    pub fn with_component<T: Component>(mut self, value: T) -> Self {
        let json = serde_json::to_value(&value).unwrap_or_else(|err| {
            panic!("archetype '{}': {} default is not JSON: {err}", self.name, T::kind())
        });
        self.mask |= T::mask();
        self.components.insert(T::kind(), json);
        self
    }

    /// Add mask bits (components using their type's `Default`, or flags).
    #[must_use]
    pub fn with_mask(mut self, mask: ComponentMask) -> Self {
        self.mask |= mask;
        self
    }

    /// Instances start inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.mask.remove(ComponentMask::IS_ACTIVE);
        self
    }

    /// Instances start hidden.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.mask.remove(ComponentMask::IS_VISIBLE);
        self
    }

    /// The stored default for `kind`, if any.
    #[must_use]
    pub fn default_json(&self, kind: ComponentKind) -> Option<&Value> {
        self.components.get(&kind)
    }

    /// Decode the default value of `T`, falling back to `T::default()`.
    pub fn default_value<T: Component>(&self) -> Result<T, EcsError> {
        match self.components.get(&T::kind()) {
            Some(json) => component_from_json(json, EntityIndex::NONE).map_err(|err| match err {
                EcsError::Decode { kind, source, .. } => EcsError::ArchetypeDefault {
                    archetype: self.name.clone(),
                    kind,
                    source,
                },
                other => other,
            }),
            None => Ok(T::default()),
        }
    }
}

/// A contiguous `[first, last)` range of entity slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPool {
    /// First slot of the pool.
    pub first: EntityIndex,
    /// One past the last slot.
    pub last: EntityIndex,
}

impl EntityPool {
    /// Create a pool starting at `first` with `size` slots.
    #[must_use]
    pub fn new(first: EntityIndex, size: u32) -> Self {
        Self {
            first,
            last: EntityIndex(first.0 + size),
        }
    }

    /// Number of slots in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        (self.last.0 - self.first.0) as usize
    }

    /// Returns `true` for a zero-sized pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    /// Returns `true` if `entity` lies inside the pool.
    #[must_use]
    pub fn contains(&self, entity: EntityIndex) -> bool {
        entity >= self.first && entity < self.last
    }

    /// Iterate over every slot of the pool.
    pub fn iter(&self) -> impl Iterator<Item = EntityIndex> + use<> {
        (self.first.0..self.last.0).map(EntityIndex)
    }
}

/// Slab of named, contiguous entity regions ordered by registration.
#[derive(Debug, Clone)]
pub struct ArchetypeArena {
    pools: Vec<EntityPool>,
}

impl ArchetypeArena {
    /// Create an arena containing only the default region, which owns slot 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pools: vec![EntityPool::new(EntityIndex(0), 1)],
        }
    }

    /// Number of regions, the default one included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Always `false`: the default region cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// First slot after every reserved region, where free default entities live.
    #[must_use]
    pub fn end(&self) -> EntityIndex {
        self.pools.last().map_or(EntityIndex(0), |pool| pool.last)
    }

    /// The region reserved for `id`.
    #[must_use]
    pub fn pool(&self, id: ArchetypeId) -> Option<EntityPool> {
        self.pools.get(id.index()).copied()
    }

    /// Reserve a new region of `size` slots after every existing one.
    pub fn reserve(&mut self, size: u32) -> (ArchetypeId, EntityPool) {
        let pool = EntityPool::new(self.end(), size);
        let id = ArchetypeId(self.pools.len() as u32);
        self.pools.push(pool);
        (id, pool)
    }

    /// Grow or shrink the region of `id` at its tail, shifting every later
    /// region.
    ///
    /// # Panics
    ///
    /// Panics for the default archetype or an unknown id.
    pub fn resize(&mut self, id: ArchetypeId, size: u32) -> EntityShift {
        assert!(id != ArchetypeId::DEFAULT, "the default archetype pool cannot be resized");
        let pool = self
            .pool(id)
            .unwrap_or_else(|| panic!("resize of unknown {id}"));
        let current = pool.len() as u32;

        let shift = if size > current {
            EntityShift::Inserted {
                at: pool.last,
                count: size - current,
            }
        } else if size < current {
            EntityShift::Erased {
                at: EntityIndex(pool.first.0 + size),
                count: current - size,
            }
        } else {
            EntityShift::None
        };

        self.pools[id.index()].last = EntityIndex(pool.first.0 + size);
        for later in &mut self.pools[id.index() + 1..] {
            match shift {
                EntityShift::Inserted { count, .. } => {
                    later.first.0 += count;
                    later.last.0 += count;
                }
                EntityShift::Erased { count, .. } => {
                    later.first.0 -= count;
                    later.last.0 -= count;
                }
                EntityShift::None => {}
            }
        }
        shift
    }

    /// The archetype whose region contains `entity`. Free entities past
    /// [`ArchetypeArena::end`] belong to the default archetype.
    #[must_use]
    pub fn owner_of(&self, entity: EntityIndex) -> ArchetypeId {
        self.pools
            .iter()
            .position(|pool| pool.contains(entity))
            .map_or(ArchetypeId::DEFAULT, |i| ArchetypeId(i as u32))
    }

    /// Iterate over `(id, pool)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ArchetypeId, EntityPool)> + '_ {
        self.pools
            .iter()
            .enumerate()
            .map(|(i, pool)| (ArchetypeId(i as u32), *pool))
    }
}

impl Default for ArchetypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    struct Light {
        intensity: f32,
    }

    impl Component for Light {
        fn kind() -> ComponentKind {
            ComponentKind::Light
        }
    }

    #[test]
    fn test_archetype_builder_sets_mask() {
        let archetype = Archetype::new("lamp").with_component(Light { intensity: 3.0 });
        assert!(archetype.mask.contains(ComponentMask::LIGHT | ComponentMask::IS_ACTIVE));
        assert_eq!(
            archetype.default_json(ComponentKind::Light),
            Some(&json!({"intensity": 3.0}))
        );
        assert_eq!(archetype.default_value::<Light>().unwrap(), Light { intensity: 3.0 });
    }

    #[test]
    fn test_archetype_missing_default_uses_type_default() {
        let archetype = Archetype::new("bare").with_mask(ComponentMask::LIGHT).inactive();
        assert_eq!(archetype.default_value::<Light>().unwrap(), Light::default());
        assert!(!archetype.mask.contains(ComponentMask::IS_ACTIVE));
    }

    #[test]
    fn test_archetype_bad_default_reports_archetype() {
        let mut archetype = Archetype::new("broken");
        archetype
            .components
            .insert(ComponentKind::Light, json!({"intensity": "high"}));
        let err = archetype.default_value::<Light>().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_arena_starts_with_default_slot() {
        let arena = ArchetypeArena::new();
        assert_eq!(arena.pool(ArchetypeId::DEFAULT), Some(EntityPool::new(EntityIndex(0), 1)));
        assert_eq!(arena.end(), EntityIndex(1));
        assert_eq!(arena.owner_of(EntityIndex(0)), ArchetypeId::DEFAULT);
    }

    #[test]
    fn test_arena_reserves_contiguous_pools() {
        let mut arena = ArchetypeArena::new();
        let (a, pool_a) = arena.reserve(10);
        let (b, pool_b) = arena.reserve(5);
        assert_eq!(a, ArchetypeId(1));
        assert_eq!(pool_a, EntityPool::new(EntityIndex(1), 10));
        assert_eq!(pool_b, EntityPool::new(EntityIndex(11), 5));
        assert_eq!(arena.end(), EntityIndex(16));
        assert_eq!(arena.owner_of(EntityIndex(12)), b);
        assert_eq!(arena.owner_of(EntityIndex(40)), ArchetypeId::DEFAULT);
    }

    #[test]
    fn test_arena_grow_shifts_later_pools() {
        let mut arena = ArchetypeArena::new();
        let (a, _) = arena.reserve(10);
        let (b, _) = arena.reserve(5);
        let shift = arena.resize(a, 14);
        assert_eq!(
            shift,
            EntityShift::Inserted {
                at: EntityIndex(11),
                count: 4
            }
        );
        assert_eq!(arena.pool(a), Some(EntityPool::new(EntityIndex(1), 14)));
        assert_eq!(arena.pool(b), Some(EntityPool::new(EntityIndex(15), 5)));
    }

    #[test]
    fn test_arena_shrink_shifts_later_pools() {
        let mut arena = ArchetypeArena::new();
        let (a, _) = arena.reserve(10);
        let (b, _) = arena.reserve(5);
        let shift = arena.resize(a, 7);
        assert_eq!(
            shift,
            EntityShift::Erased {
                at: EntityIndex(8),
                count: 3
            }
        );
        assert_eq!(arena.pool(b), Some(EntityPool::new(EntityIndex(8), 5)));
        assert_eq!(arena.end(), EntityIndex(13));
    }

    #[test]
    #[should_panic(expected = "cannot be resized")]
    fn test_arena_default_pool_is_fixed() {
        let mut arena = ArchetypeArena::new();
        let _ = arena.resize(ArchetypeId::DEFAULT, 4);
    }
}
