//! Entity handles and index bookkeeping.
//!
//! An [`EntityIndex`] is a dense `u32` slot number shared by every component
//! array. It carries no data of its own: what an entity *is* is encoded by its
//! [`ComponentMask`](crate::ComponentMask) and by the contents of the component
//! arrays at that slot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A dense entity slot.
///
/// Slots are reused: once an entity is destroyed its index may be handed out
/// again by a later [`World::add_entity`](crate::World::add_entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityIndex(pub u32);

impl EntityIndex {
    /// The "no entity" sentinel, used for missing parents and empty links.
    pub const NONE: EntityIndex = EntityIndex(u32::MAX);

    /// Create an entity index from a raw slot number.
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the slot as a `usize`, ready for array indexing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` unless this is [`EntityIndex::NONE`].
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    /// Returns `true` if this is [`EntityIndex::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl From<usize> for EntityIndex {
    fn from(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "entity index {index} out of range");
        Self(index as u32)
    }
}

impl std::fmt::Display for EntityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "Entity(none)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

/// Coarse lifecycle state of an entity slot.
///
/// ```text
/// Unallocated -> Active <-> Inactive -> PendingDestroy -> Destroyed
/// ```
///
/// `Destroyed` is terminal for that entity; the slot comes back only through
/// a fresh `add_entity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Slot exists but was never handed out.
    #[default]
    Unallocated,
    /// Allocated and simulated.
    Active,
    /// Allocated, not simulated.
    Inactive,
    /// Queued for destruction once its countdown expires.
    PendingDestroy,
    /// Destroyed; slot reusable.
    Destroyed,
}

impl EntityState {
    /// Returns `true` for states an `add_entity` call may claim.
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Unallocated | Self::Destroyed)
    }

    /// Returns `true` for allocated entities (including pending destruction).
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Active | Self::Inactive | Self::PendingDestroy)
    }
}

/// Translation table from one entity index space to another.
///
/// Used by prefab instantiation (prefab-local indices to live slots) and by
/// scene loading, where entities may land at different offsets than the
/// indices they were saved with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRemap {
    map: BTreeMap<EntityIndex, EntityIndex>,
}

impl EntityRemap {
    /// Create an empty remap. An empty remap is the identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` should be translated to `to`.
    pub fn insert(&mut self, from: EntityIndex, to: EntityIndex) {
        self.map.insert(from, to);
    }

    /// Returns the translation of `entity`, if one was recorded.
    #[must_use]
    pub fn get(&self, entity: EntityIndex) -> Option<EntityIndex> {
        self.map.get(&entity).copied()
    }

    /// Translate `entity`, leaving it untouched when no entry exists.
    /// [`EntityIndex::NONE`] always maps to itself.
    #[must_use]
    pub fn map(&self, entity: EntityIndex) -> EntityIndex {
        if entity.is_none() {
            return entity;
        }
        self.get(entity).unwrap_or(entity)
    }

    /// Returns the reverse table. Later entries win on collisions.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            map: self.map.iter().map(|(&from, &to)| (to, from)).collect(),
        }
    }

    /// Returns the number of recorded translations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no translation was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FromIterator<(EntityIndex, EntityIndex)> for EntityRemap {
    fn from_iter<I: IntoIterator<Item = (EntityIndex, EntityIndex)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// How absolute entity indices moved after an archetype pool was resized.
///
/// Resizing a pool splices every component array, so every index at or after
/// the splice point moves. Anything holding indices outside the ECS core
/// (chunk links, gameplay caches) must run them through [`EntityShift::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityShift {
    /// Nothing moved.
    #[default]
    None,
    /// `count` fresh slots were inserted before `at`.
    Inserted {
        /// First inserted slot.
        at: EntityIndex,
        /// Number of inserted slots.
        count: u32,
    },
    /// The slots `[at, at + count)` were erased.
    Erased {
        /// First erased slot.
        at: EntityIndex,
        /// Number of erased slots.
        count: u32,
    },
}

impl EntityShift {
    /// Translate an index across the shift. Returns `None` if the slot itself
    /// was erased.
    #[must_use]
    pub fn apply(self, entity: EntityIndex) -> Option<EntityIndex> {
        if entity.is_none() {
            return Some(entity);
        }
        match self {
            Self::None => Some(entity),
            Self::Inserted { at, count } => {
                if entity >= at {
                    Some(EntityIndex(entity.0 + count))
                } else {
                    Some(entity)
                }
            }
            Self::Erased { at, count } => {
                if entity < at {
                    Some(entity)
                } else if entity.0 < at.0 + count {
                    None
                } else {
                    Some(EntityIndex(entity.0 - count))
                }
            }
        }
    }

    /// Like [`EntityShift::apply`], mapping erased slots to [`EntityIndex::NONE`].
    #[must_use]
    pub fn apply_or_none(self, entity: EntityIndex) -> EntityIndex {
        self.apply(entity).unwrap_or(EntityIndex::NONE)
    }
}
