//! Chunk data: authored bounding volumes that bucket entities.
//!
//! A [`Chunk`] never owns entities. It references them by index: the ones
//! permanently linked to it, and the ones forced active when it becomes the
//! current chunk. It also names other chunks to show, hide or destroy at that
//! moment.

use std::collections::BTreeSet;

use engine_component::EntityIndex;
use engine_math::Aabb;
use serde::{Deserialize, Serialize};

/// Index of a chunk in the chunk manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkIndex(pub u32);

impl ChunkIndex {
    /// The "no chunk" sentinel.
    pub const NONE: ChunkIndex = ChunkIndex(u32::MAX);

    /// Position in the chunk manager's list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for [`ChunkIndex::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// Returns `true` for a real chunk index.
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }
}

impl From<usize> for ChunkIndex {
    fn from(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "chunk index {index} out of range");
        Self(index as u32)
    }
}

impl std::fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "Chunk(none)")
        } else {
            write!(f, "Chunk({})", self.0)
        }
    }
}

/// Status of a chunk, and of every entity bucketed into it.
///
/// | Status    | Active | Visible |
/// |-----------|--------|---------|
/// | Active    | yes    | yes     |
/// | Visible   | no     | yes     |
/// | Hidden    | no     | no      |
/// | Destroyed | no     | no      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkStatus {
    Active,
    Visible,
    #[default]
    Hidden,
    Destroyed,
}

impl ChunkStatus {
    /// Whether entities in a chunk with this status are simulated.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether entities in a chunk with this status are rendered.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Active | Self::Visible)
    }
}

/// A growable bitset of chunk indices.
///
/// Serialises as a sorted list of indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ChunkIndex>", into = "Vec<ChunkIndex>")]
pub struct ChunkSet {
    words: Vec<u64>,
}

impl ChunkSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn split(chunk: ChunkIndex) -> (usize, u64) {
        (chunk.index() / 64, 1u64 << (chunk.index() % 64))
    }

    /// Add `chunk`. Returns `true` if it was not present.
    ///
    /// # Panics
    ///
    /// Panics on [`ChunkIndex::NONE`].
    pub fn insert(&mut self, chunk: ChunkIndex) -> bool {
        assert!(chunk.is_some(), "cannot insert the no-chunk sentinel into a chunk set");
        let (word, bit) = Self::split(chunk);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Remove `chunk`. Returns `true` if it was present.
    pub fn remove(&mut self, chunk: ChunkIndex) -> bool {
        if chunk.is_none() {
            return false;
        }
        let (word, bit) = Self::split(chunk);
        match self.words.get_mut(word) {
            Some(w) if *w & bit != 0 => {
                *w &= !bit;
                true
            }
            _ => false,
        }
    }

    /// Membership test. The sentinel is never a member.
    #[must_use]
    pub fn contains(&self, chunk: ChunkIndex) -> bool {
        if chunk.is_none() {
            return false;
        }
        let (word, bit) = Self::split(chunk);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Number of chunks in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if no chunk is in the set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkIndex> + '_ {
        self.words.iter().enumerate().flat_map(|(word, &bits)| {
            (0..64usize)
                .filter(move |&bit| bits & (1u64 << bit) != 0)
                .map(move |bit| ChunkIndex::from(word * 64 + bit))
        })
    }
}

impl FromIterator<ChunkIndex> for ChunkSet {
    fn from_iter<I: IntoIterator<Item = ChunkIndex>>(iter: I) -> Self {
        let mut set = Self::new();
        for chunk in iter {
            set.insert(chunk);
        }
        set
    }
}

impl From<Vec<ChunkIndex>> for ChunkSet {
    fn from(chunks: Vec<ChunkIndex>) -> Self {
        chunks.into_iter().filter(|chunk| chunk.is_some()).collect()
    }
}

impl From<ChunkSet> for Vec<ChunkIndex> {
    fn from(set: ChunkSet) -> Self {
        set.iter().collect()
    }
}

/// An authored chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    /// World-space volume.
    pub bounds: Aabb,
    /// Stored status. The effective status also depends on the current chunk.
    pub status: ChunkStatus,
    linked: Vec<EntityIndex>,
    /// Entities forced active and visible while this chunk is current.
    pub entities_to_activate: BTreeSet<EntityIndex>,
    pub chunks_to_show: ChunkSet,
    pub chunks_to_hide: ChunkSet,
    /// Destroyed permanently when this chunk becomes current.
    pub chunks_to_destroy: ChunkSet,
}

impl Chunk {
    /// A hidden chunk covering `bounds`, with no links.
    #[must_use]
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: ChunkStatus) -> Self {
        self.status = status;
        self
    }

    /// Entities bucketed into this chunk regardless of position, ascending.
    #[must_use]
    pub fn linked_entities(&self) -> &[EntityIndex] {
        &self.linked
    }

    /// Link `entity`. Returns `true` if it was not linked yet.
    pub fn link_entity(&mut self, entity: EntityIndex) -> bool {
        match self.linked.binary_search(&entity) {
            Ok(_) => false,
            Err(pos) => {
                self.linked.insert(pos, entity);
                true
            }
        }
    }

    /// Unlink `entity`. Returns `true` if it was linked.
    pub fn unlink_entity(&mut self, entity: EntityIndex) -> bool {
        match self.linked.binary_search(&entity) {
            Ok(pos) => {
                self.linked.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn is_linked(&self, entity: EntityIndex) -> bool {
        self.linked.binary_search(&entity).is_ok()
    }

    /// Rewrite every entity reference through `map`, dropping the ones it
    /// maps to [`EntityIndex::NONE`].
    pub(crate) fn map_entities(&mut self, map: impl Fn(EntityIndex) -> EntityIndex) {
        let mut linked: Vec<EntityIndex> = self
            .linked
            .iter()
            .map(|&entity| map(entity))
            .filter(|entity| entity.is_some())
            .collect();
        linked.sort_unstable();
        linked.dedup();
        self.linked = linked;
        self.entities_to_activate = self
            .entities_to_activate
            .iter()
            .map(|&entity| map(entity))
            .filter(|entity| entity.is_some())
            .collect();
    }
}

/// On-disk shape of a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkData {
    /// Center of the chunk volume.
    pub position: [f32; 3],
    /// Half-extents of the chunk volume.
    pub size: [f32; 3],
    pub game_objects: Vec<EntityIndex>,
    #[serde(rename = "entitiesIdToActivate")]
    pub entities_to_activate: Vec<EntityIndex>,
    pub chunks_to_show: ChunkSet,
    pub chunks_to_destroy: ChunkSet,
    pub chunks_to_hide: ChunkSet,
}
