//! Chunk definitions, the current chunk, and entity classification.
//!
//! The manager answers two questions: which chunk an entity belongs to, and
//! what that chunk's effective status is given the current chunk. It never
//! touches the ECS; the chunk system turns its answers into entity flags.

use std::collections::BTreeSet;

use engine_component::{EntityIndex, EntityRemap, EntityShift};
use engine_math::Aabb;
use glam::Vec3;
use serde_json::Value;

use crate::chunk::{Chunk, ChunkData, ChunkIndex, ChunkStatus};
use crate::error::SceneError;

/// Owns every chunk of the scene.
#[derive(Debug, Clone)]
pub struct ChunkManager {
    chunks: Vec<Chunk>,
    current: ChunkIndex,
    always_active: BTreeSet<EntityIndex>,
}

impl ChunkManager {
    /// Create a manager with no chunks and no current chunk.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            current: ChunkIndex::NONE,
            always_active: BTreeSet::new(),
        }
    }

    /// Append a chunk.
    pub fn add_chunk(&mut self, chunk: Chunk) -> ChunkIndex {
        let index = ChunkIndex::from(self.chunks.len());
        self.chunks.push(chunk);
        tracing::debug!(%index, "added chunk");
        index
    }

    /// The chunk at `index`. Unknown indices log a warning and yield `None`.
    #[must_use]
    pub fn chunk(&self, index: ChunkIndex) -> Option<&Chunk> {
        let chunk = self.chunks.get(index.index());
        if chunk.is_none() && index.is_some() {
            tracing::warn!(%index, count = self.chunks.len(), "unknown chunk");
        }
        chunk
    }

    /// The chunk at `index`, mutably. Unknown indices yield `None` silently.
    pub fn chunk_mut(&mut self, index: ChunkIndex) -> Option<&mut Chunk> {
        self.chunks.get_mut(index.index())
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` when no chunk is loaded. The chunk system then hands
    /// every entity its own activation back.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Every chunk with its index, in load order.
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkIndex, &Chunk)> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (ChunkIndex::from(i), chunk))
    }

    /// Drop every chunk and reset the current chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.current = ChunkIndex::NONE;
    }

    #[must_use]
    pub fn current_chunk(&self) -> ChunkIndex {
        self.current
    }

    /// Make `index` the current chunk and apply its destroy set.
    ///
    /// Returns `true` if the current chunk changed.
    ///
    /// # Panics
    ///
    /// Panics if `index` is neither [`ChunkIndex::NONE`] nor a known chunk.
    pub fn set_current_chunk(&mut self, index: ChunkIndex) -> bool {
        assert!(
            index.is_none() || index.index() < self.chunks.len(),
            "cannot make unknown {index} current ({} chunks)",
            self.chunks.len()
        );
        if index == self.current {
            return false;
        }
        let previous = std::mem::replace(&mut self.current, index);
        tracing::info!(from = %previous, to = %index, "current chunk changed");

        if index.is_some() {
            let destroyed: Vec<ChunkIndex> = self.chunks[index.index()].chunks_to_destroy.iter().collect();
            for target in destroyed {
                match self.chunks.get_mut(target.index()) {
                    Some(chunk) => chunk.status = ChunkStatus::Destroyed,
                    None => tracing::warn!(chunk = %index, %target, "destroy set names unknown chunk"),
                }
            }
        }
        true
    }

    /// Overwrite the stored status of `index`.
    pub fn set_chunk_status(&mut self, index: ChunkIndex, status: ChunkStatus) {
        match self.chunks.get_mut(index.index()) {
            Some(chunk) => chunk.status = status,
            None => tracing::warn!(%index, "status change for unknown chunk ignored"),
        }
    }

    /// The status of `index` given the current chunk.
    ///
    /// Returns `None` for [`ChunkIndex::NONE`] and unknown chunks.
    #[must_use]
    pub fn chunk_status(&self, index: ChunkIndex) -> Option<ChunkStatus> {
        let chunk = self.chunk(index)?;
        if index == self.current {
            return Some(ChunkStatus::Active);
        }
        if chunk.status == ChunkStatus::Destroyed {
            return Some(ChunkStatus::Destroyed);
        }
        if let Some(current) = self.chunks.get(self.current.index()) {
            if current.chunks_to_hide.contains(index) {
                return Some(ChunkStatus::Hidden);
            }
            if current.chunks_to_show.contains(index) {
                return Some(ChunkStatus::Visible);
            }
        }
        Some(chunk.status)
    }

    /// `(active, visible)` for an entity bucketed into `index`. Entities in
    /// no chunk are neither.
    #[must_use]
    pub fn entity_flags(&self, index: ChunkIndex) -> (bool, bool) {
        self.chunk_status(index)
            .map_or((false, false), |status| (status.is_active(), status.is_visible()))
    }

    /// Whether `entity` is forced active by the current chunk.
    #[must_use]
    pub fn is_forced_active(&self, entity: EntityIndex) -> bool {
        self.chunks
            .get(self.current.index())
            .is_some_and(|chunk| chunk.entities_to_activate.contains(&entity))
    }

    /// The chunk `entity` is linked to, if any.
    #[must_use]
    pub fn linked_chunk(&self, entity: EntityIndex) -> ChunkIndex {
        self.chunks()
            .find(|(_, chunk)| chunk.is_linked(entity))
            .map_or(ChunkIndex::NONE, |(index, _)| index)
    }

    /// Link `entity` to `index`, unlinking it from any other chunk first.
    pub fn link_entity(&mut self, index: ChunkIndex, entity: EntityIndex) {
        assert!(index.index() < self.chunks.len(), "cannot link {entity} to unknown {index}");
        for chunk in &mut self.chunks {
            chunk.unlink_entity(entity);
        }
        self.chunks[index.index()].link_entity(entity);
    }

    /// The lowest-index chunk containing `position`.
    #[must_use]
    pub fn classify_point(&self, position: Vec3) -> ChunkIndex {
        self.chunks()
            .find(|(_, chunk)| chunk.bounds.contains_point(position))
            .map_or(ChunkIndex::NONE, |(index, _)| index)
    }

    /// The lowest-index chunk overlapping `bounds`.
    #[must_use]
    pub fn classify_bounds(&self, bounds: &Aabb) -> ChunkIndex {
        self.chunks()
            .find(|(_, chunk)| chunk.bounds.intersects(bounds))
            .map_or(ChunkIndex::NONE, |(index, _)| index)
    }

    /// The chunk `entity` belongs to: its linked chunk if it has one,
    /// otherwise by world bounds when it has a collider, otherwise by
    /// position.
    #[must_use]
    pub fn classify(&self, entity: EntityIndex, position: Vec3, bounds: Option<&Aabb>) -> ChunkIndex {
        let linked = self.linked_chunk(entity);
        if linked.is_some() {
            return linked;
        }
        match bounds {
            Some(bounds) => self.classify_bounds(bounds),
            None => self.classify_point(position),
        }
    }

    /// Exempt `entity` from chunking.
    pub fn add_always_active(&mut self, entity: EntityIndex) {
        self.always_active.insert(entity);
    }

    pub fn remove_always_active(&mut self, entity: EntityIndex) -> bool {
        self.always_active.remove(&entity)
    }

    #[must_use]
    pub fn is_always_active(&self, entity: EntityIndex) -> bool {
        self.always_active.contains(&entity)
    }

    /// Follow an archetype resize.
    pub fn apply_shift(&mut self, shift: EntityShift) {
        if shift == EntityShift::None {
            return;
        }
        for chunk in &mut self.chunks {
            chunk.map_entities(|entity| shift.apply_or_none(entity));
        }
        self.always_active = self
            .always_active
            .iter()
            .filter_map(|&entity| shift.apply(entity))
            .collect();
    }

    /// Encode every chunk. Entity indices are written through `remap`.
    pub fn to_json(&self, remap: &EntityRemap) -> Result<Value, SceneError> {
        let documents: Vec<ChunkData> = self
            .chunks
            .iter()
            .map(|chunk| ChunkData {
                position: chunk.bounds.center.to_array(),
                size: chunk.bounds.half_extents.to_array(),
                game_objects: chunk.linked_entities().iter().map(|&e| remap.map(e)).collect(),
                entities_to_activate: chunk.entities_to_activate.iter().map(|&e| remap.map(e)).collect(),
                chunks_to_show: chunk.chunks_to_show.clone(),
                chunks_to_destroy: chunk.chunks_to_destroy.clone(),
                chunks_to_hide: chunk.chunks_to_hide.clone(),
            })
            .collect();
        Ok(serde_json::to_value(documents)?)
    }

    /// Replace every chunk from a JSON array. Entity indices are read through
    /// `remap`. The current chunk is reset.
    pub fn load_json(&mut self, json: &Value, remap: &EntityRemap) -> Result<(), SceneError> {
        let documents: Vec<ChunkData> = serde_json::from_value(json.clone())?;
        let count = documents.len();
        let mut chunks = Vec::with_capacity(count);

        for (i, data) in documents.into_iter().enumerate() {
            let index = ChunkIndex::from(i);
            for target in data
                .chunks_to_show
                .iter()
                .chain(data.chunks_to_hide.iter())
                .chain(data.chunks_to_destroy.iter())
            {
                if target.index() >= count {
                    return Err(SceneError::UnknownChunk { chunk: index, target });
                }
            }

            let mut chunk = Chunk::new(Aabb::new(Vec3::from(data.position), Vec3::from(data.size)));
            for entity in data.game_objects {
                chunk.link_entity(remap.map(entity));
            }
            chunk.entities_to_activate = data.entities_to_activate.into_iter().map(|e| remap.map(e)).collect();
            chunk.chunks_to_show = data.chunks_to_show;
            chunk.chunks_to_hide = data.chunks_to_hide;
            chunk.chunks_to_destroy = data.chunks_to_destroy;
            chunks.push(chunk);
        }

        self.chunks = chunks;
        self.current = ChunkIndex::NONE;
        tracing::debug!(count, "loaded chunks");
        Ok(())
    }
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new()
    }
}
