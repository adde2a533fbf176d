//! The transform hierarchy.
//!
//! [`TransformManager`] owns every entity's local [`Transform`] together with
//! its parent link, its children, and two lazily computed matrices:
//! local-to-world and world-to-local. Each slot carries a [`DirtyState`]; a
//! matrix is recomputed only when its bit is set, and reads clear it.
//!
//! Marking an entity dirty marks its whole subtree dirty, depth-first,
//! stopping at descendants that are already fully dirty. A fully dirty node
//! always has a fully dirty subtree, so the early stop never leaves a stale
//! matrix behind.
//!
//! [`TransformManager::set_parent`] does not dirty anything. Callers that
//! reparent an entity with cached matrices call
//! [`TransformManager::set_dirty`] afterwards.

use engine_component::{
    Archetype, ComponentKind, ComponentsManager, EcsError, EntityIndex, EntityPool, EntityRemap, EntityShift,
    component_from_json, component_to_json,
};
use engine_math::Transform;
use glam::{Mat4, Vec3};
use serde_json::Value;

/// Which cached matrices of a slot are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyState {
    /// Both matrices are current.
    Clean,
    /// Local-to-world is stale.
    LocalDirty,
    /// World-to-local is stale.
    WorldDirty,
    /// Both matrices are stale.
    #[default]
    BothDirty,
}

impl DirtyState {
    /// Returns `true` if local-to-world must be recomputed.
    #[must_use]
    pub const fn is_local_dirty(self) -> bool {
        matches!(self, Self::LocalDirty | Self::BothDirty)
    }

    /// Returns `true` if world-to-local must be recomputed.
    #[must_use]
    pub const fn is_world_dirty(self) -> bool {
        matches!(self, Self::WorldDirty | Self::BothDirty)
    }

    const fn without_local(self) -> Self {
        match self {
            Self::LocalDirty => Self::Clean,
            Self::BothDirty => Self::WorldDirty,
            other => other,
        }
    }

    const fn without_world(self) -> Self {
        match self {
            Self::WorldDirty => Self::Clean,
            Self::BothDirty => Self::LocalDirty,
            other => other,
        }
    }
}

/// Why a parent link was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentError {
    /// The parent slot is not backed.
    OutOfRange,
    /// The entity would become its own ancestor.
    Cycle,
}

impl std::fmt::Display for ParentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "parent is past the end of the transform storage"),
            Self::Cycle => write!(f, "parent link would create a cycle"),
        }
    }
}

/// Components manager for [`Transform`], with parent/child links and cached
/// world matrices.
#[derive(Debug, Clone, Default)]
pub struct TransformManager {
    transforms: Vec<Transform>,
    parents: Vec<EntityIndex>,
    children: Vec<Vec<EntityIndex>>,
    local_to_world: Vec<Mat4>,
    world_to_local: Vec<Mat4>,
    dirty: Vec<DirtyState>,
}

impl TransformManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, entity: EntityIndex) -> usize {
        let i = entity.index();
        assert!(
            entity.is_some() && i < self.transforms.len(),
            "{entity} is past the end of the transform storage ({} slots)",
            self.transforms.len()
        );
        i
    }

    /// The local transform of `entity`.
    #[must_use]
    pub fn transform(&self, entity: EntityIndex) -> &Transform {
        &self.transforms[self.check(entity)]
    }

    /// Overwrite the local transform of `entity` and dirty its subtree.
    ///
    /// This does not notify the world; go through
    /// `SceneContext::set_transform` when observers must see the write.
    pub fn set_component(&mut self, entity: EntityIndex, transform: Transform) {
        let i = self.check(entity);
        self.transforms[i] = transform;
        self.set_dirty(entity);
    }

    /// Set the local transform so that the world transform of `entity`
    /// becomes `world`, given its current parent.
    pub fn set_component_from_world_transform(&mut self, entity: EntityIndex, world: &Transform) {
        let parent = self.parents[self.check(entity)];
        let local = if parent.is_some() {
            let parent_world = self.local_to_world(parent);
            Transform::from_matrix(&(parent_world.inverse() * world.to_matrix()))
        } else {
            *world
        };
        self.set_component(entity, local);
    }

    /// The parent of `entity`, or [`EntityIndex::NONE`] for roots.
    #[must_use]
    pub fn parent(&self, entity: EntityIndex) -> EntityIndex {
        self.parents[self.check(entity)]
    }

    /// The children of `entity`, in the order they were attached.
    #[must_use]
    pub fn children(&self, entity: EntityIndex) -> &[EntityIndex] {
        &self.children[self.check(entity)]
    }

    /// Every slot without a parent.
    pub fn roots(&self) -> impl Iterator<Item = EntityIndex> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(i, _)| EntityIndex::from(i))
    }

    /// The dirty bits of `entity`.
    #[must_use]
    pub fn dirty_state(&self, entity: EntityIndex) -> DirtyState {
        self.dirty[self.check(entity)]
    }

    /// Check whether `parent` may become the parent of `entity`.
    pub fn validate_parent(&self, entity: EntityIndex, parent: EntityIndex) -> Result<(), ParentError> {
        if parent.is_none() {
            return Ok(());
        }
        if parent.index() >= self.parents.len() {
            return Err(ParentError::OutOfRange);
        }
        let mut ancestor = parent;
        while ancestor.is_some() {
            if ancestor == entity {
                return Err(ParentError::Cycle);
            }
            ancestor = self.parents[ancestor.index()];
        }
        Ok(())
    }

    /// Attach `entity` under `parent`, or detach it with
    /// [`EntityIndex::NONE`]. Nothing is marked dirty.
    ///
    /// # Panics
    ///
    /// Panics if either slot is out of range or the link would create a cycle.
    pub fn set_parent(&mut self, entity: EntityIndex, parent: EntityIndex) {
        let i = self.check(entity);
        if let Err(err) = self.validate_parent(entity, parent) {
            panic!("cannot parent {entity} to {parent}: {err}");
        }
        self.link(i, parent);
    }

    fn link(&mut self, i: usize, parent: EntityIndex) {
        let entity = EntityIndex::from(i);
        let old = self.parents[i];
        if old == parent {
            return;
        }
        if old.is_some() {
            self.children[old.index()].retain(|&child| child != entity);
        }
        self.parents[i] = parent;
        if parent.is_some() {
            self.children[parent.index()].push(entity);
        }
    }

    /// Cut every link of slot `i`. Its children become roots and are dirtied.
    fn unlink(&mut self, i: usize) {
        self.link(i, EntityIndex::NONE);
        for child in std::mem::take(&mut self.children[i]) {
            self.parents[child.index()] = EntityIndex::NONE;
            self.set_dirty(child);
        }
    }

    /// Mark both matrices of `entity` and its subtree stale.
    pub fn set_dirty(&mut self, entity: EntityIndex) {
        let i = self.check(entity);
        self.dirty[i] = DirtyState::BothDirty;
        let mut stack = self.children[i].clone();
        while let Some(child) = stack.pop() {
            let c = child.index();
            if self.dirty[c] == DirtyState::BothDirty {
                continue;
            }
            self.dirty[c] = DirtyState::BothDirty;
            stack.extend_from_slice(&self.children[c]);
        }
    }

    /// The local-to-world matrix of `entity`, recomputed if stale.
    pub fn local_to_world(&mut self, entity: EntityIndex) -> Mat4 {
        let i = self.check(entity);
        if self.dirty[i].is_local_dirty() {
            let local = self.transforms[i].to_matrix();
            let parent = self.parents[i];
            self.local_to_world[i] = if parent.is_some() {
                self.local_to_world(parent) * local
            } else {
                local
            };
            self.dirty[i] = self.dirty[i].without_local();
        }
        self.local_to_world[i]
    }

    /// The world-to-local matrix of `entity`, recomputed if stale.
    pub fn world_to_local(&mut self, entity: EntityIndex) -> Mat4 {
        let i = self.check(entity);
        if self.dirty[i].is_world_dirty() {
            self.world_to_local[i] = self.local_to_world(entity).inverse();
            self.dirty[i] = self.dirty[i].without_world();
        }
        self.world_to_local[i]
    }

    /// World-space origin of `entity`.
    pub fn world_position(&mut self, entity: EntityIndex) -> Vec3 {
        self.local_to_world(entity).w_axis.truncate()
    }

    /// World-space transform of `entity`.
    pub fn world_transform(&mut self, entity: EntityIndex) -> Transform {
        Transform::from_matrix(&self.local_to_world(entity))
    }

    fn shift_links(&mut self, shift: EntityShift) {
        for parent in &mut self.parents {
            *parent = shift.apply_or_none(*parent);
        }
        for children in &mut self.children {
            for child in children.iter_mut() {
                *child = shift.apply_or_none(*child);
            }
        }
    }

    fn check_pool(&self, pool: EntityPool) {
        assert!(
            pool.last.index() <= self.transforms.len(),
            "pool [{}, {}) exceeds the transform storage ({} slots)",
            pool.first.0,
            pool.last.0,
            self.transforms.len()
        );
    }
}

impl ComponentsManager for TransformManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Transform
    }

    fn len(&self) -> usize {
        self.transforms.len()
    }

    fn resize_entities(&mut self, count: usize) {
        if count <= self.transforms.len() {
            return;
        }
        self.transforms.resize(count, Transform::IDENTITY);
        self.parents.resize(count, EntityIndex::NONE);
        self.children.resize_with(count, Vec::new);
        self.local_to_world.resize(count, Mat4::IDENTITY);
        self.world_to_local.resize(count, Mat4::IDENTITY);
        self.dirty.resize(count, DirtyState::BothDirty);
    }

    fn clear_entity(&mut self, entity: EntityIndex) {
        let i = self.check(entity);
        self.unlink(i);
        self.transforms[i] = Transform::IDENTITY;
        self.dirty[i] = DirtyState::BothDirty;
    }

    fn set_with_archetype(&mut self, pool: EntityPool, archetype: &Archetype) -> Result<(), EcsError> {
        self.check_pool(pool);
        let value = archetype.default_value::<Transform>()?;
        for entity in pool.iter() {
            let i = entity.index();
            self.unlink(i);
            self.transforms[i] = value;
            self.dirty[i] = DirtyState::BothDirty;
        }
        Ok(())
    }

    fn insert_archetype(&mut self, at: EntityIndex, count: u32, archetype: &Archetype) -> Result<(), EcsError> {
        assert!(
            at.index() <= self.transforms.len(),
            "insert at {at} past the end of the transform storage"
        );
        let value = archetype.default_value::<Transform>()?;
        let range = at.index()..at.index();
        let n = count as usize;
        self.transforms.splice(range.clone(), std::iter::repeat_n(value, n));
        self.parents.splice(range.clone(), std::iter::repeat_n(EntityIndex::NONE, n));
        self.children.splice(range.clone(), std::iter::repeat_with(Vec::new).take(n));
        self.local_to_world.splice(range.clone(), std::iter::repeat_n(Mat4::IDENTITY, n));
        self.world_to_local.splice(range.clone(), std::iter::repeat_n(Mat4::IDENTITY, n));
        self.dirty.splice(range, std::iter::repeat_n(DirtyState::BothDirty, n));
        self.shift_links(EntityShift::Inserted { at, count });
        Ok(())
    }

    fn erase_entities(&mut self, at: EntityIndex, count: u32) {
        let end = at.index() + count as usize;
        assert!(
            end <= self.transforms.len(),
            "erase of [{}, {end}) past the end of the transform storage",
            at.0
        );
        for i in at.index()..end {
            self.unlink(i);
        }
        let range = at.index()..end;
        self.transforms.drain(range.clone());
        self.parents.drain(range.clone());
        self.children.drain(range.clone());
        self.local_to_world.drain(range.clone());
        self.world_to_local.drain(range.clone());
        self.dirty.drain(range);
        self.shift_links(EntityShift::Erased { at, count });
    }

    fn json_from_component(&self, entity: EntityIndex) -> Result<Value, EcsError> {
        let i = self.check(entity);
        let mut value = component_to_json(&self.transforms[i], entity)?;
        let parent = self.parents[i];
        if parent.is_some()
            && let Value::Object(fields) = &mut value
        {
            fields.insert("parent".to_owned(), Value::from(parent.0));
        }
        Ok(value)
    }

    fn set_component_from_json(&mut self, entity: EntityIndex, value: &Value) -> Result<(), EcsError> {
        let i = self.check(entity);
        let transform: Transform = component_from_json(value, entity)?;
        let parent = match value.get("parent") {
            None | Some(Value::Null) => EntityIndex::NONE,
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|source| EcsError::Decode {
                kind: ComponentKind::Transform,
                entity,
                source,
            })?,
        };
        self.validate_parent(entity, parent).map_err(|err| EcsError::Malformed {
            what: "transform",
            message: format!("cannot parent {entity} to {parent}: {err}"),
        })?;
        self.link(i, parent);
        self.transforms[i] = transform;
        self.set_dirty(entity);
        Ok(())
    }

    fn default_json(&self, archetype: &Archetype) -> Result<Value, EcsError> {
        let value = archetype.default_value::<Transform>()?;
        component_to_json(&value, EntityIndex::NONE)
    }

    fn remap_json(&self, value: &Value, remap: &EntityRemap) -> Value {
        let mut value = value.clone();
        if let Some(parent) = value.get("parent").and_then(Value::as_u64)
            && let Ok(raw) = u32::try_from(parent)
        {
            value["parent"] = Value::from(remap.map(EntityIndex(raw)).0);
        }
        value
    }

    fn destroy_entity(&mut self, entity: EntityIndex) {
        self.clear_entity(entity);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
