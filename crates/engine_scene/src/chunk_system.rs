//! Per-frame driver that turns chunk status into entity flags.
//!
//! The system never classifies an entity mid-scan in response to a
//! notification. Observers only record entity indices into a shared buffer;
//! the buffer is merged at [`FramePhase::EndOfFrame`]. A change of current
//! chunk, or a new set of chunks, triggers a full pass over every entity with
//! a transform.
//!
//! Entities in the "always active" set are skipped. The first time an entity
//! is classified its own activation flag is remembered. With no chunks loaded
//! both flags mirror that own flag, so clearing the chunks hands every entity
//! back its pre-chunk state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use engine_component::{
    ActivationChange, ComponentChange, ComponentEvent, ComponentKind, ComponentMask, DenseStorage, EcsManager,
    EntityIndex, EntityShift, LifecycleEvent, Observer, observer,
};
use engine_math::Aabb;
use parking_lot::Mutex;

use crate::chunk::ChunkIndex;
use crate::chunk_manager::ChunkManager;
use crate::components::Collider;
use crate::context::SceneContext;
use crate::hierarchy::TransformManager;
use crate::system::{FramePhase, System};

#[derive(Debug, Default)]
struct Buffered {
    /// Created, or newly given a transform.
    fresh: BTreeSet<EntityIndex>,
    /// Transform written.
    moved: BTreeSet<EntityIndex>,
    /// Destroyed, or transform removed.
    gone: BTreeSet<EntityIndex>,
    /// Activation flipped by someone other than this system. Last value wins.
    activated: BTreeMap<EntityIndex, bool>,
    /// Set while the system writes flags itself.
    muted: bool,
}

impl Buffered {
    fn is_empty(&self) -> bool {
        self.fresh.is_empty() && self.moved.is_empty() && self.gone.is_empty() && self.activated.is_empty()
    }
}

struct Hooks {
    init: Observer<EntityIndex>,
    destroy: Observer<EntityIndex>,
    added: Observer<ComponentChange>,
    updated: Observer<ComponentChange>,
    removed: Observer<ComponentChange>,
    activation: Observer<ActivationChange>,
}

/// Keeps entity active/visible flags in line with the chunk they sit in.
pub struct ChunkSystem {
    buffer: Arc<Mutex<Buffered>>,
    hooks: Option<Hooks>,
    membership: BTreeMap<EntityIndex, ChunkIndex>,
    /// Activation each classified entity had of its own.
    own_active: BTreeMap<EntityIndex, bool>,
    evaluated_chunk: ChunkIndex,
    evaluated_count: usize,
    needs_full_pass: bool,
}

impl ChunkSystem {
    const PHASES: [FramePhase; 2] = [FramePhase::Update, FramePhase::EndOfFrame];

    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffered::default())),
            hooks: None,
            membership: BTreeMap::new(),
            own_active: BTreeMap::new(),
            evaluated_chunk: ChunkIndex::NONE,
            evaluated_count: 0,
            needs_full_pass: true,
        }
    }

    /// The chunk `entity` was last classified into.
    #[must_use]
    pub fn chunk_of(&self, entity: EntityIndex) -> ChunkIndex {
        self.membership.get(&entity).copied().unwrap_or(ChunkIndex::NONE)
    }

    /// Number of entities with a recorded chunk.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.membership.len()
    }

    /// The activation `entity` will get back once the chunks are cleared,
    /// if the system has overridden it.
    #[must_use]
    pub fn own_active(&self, entity: EntityIndex) -> Option<bool> {
        self.own_active.get(&entity).copied()
    }

    /// Force a full pass on the next phase this system runs in.
    pub fn invalidate(&mut self) {
        self.needs_full_pass = true;
    }

    fn make_hooks(&self) -> Hooks {
        let fresh = Arc::clone(&self.buffer);
        let gone = Arc::clone(&self.buffer);
        let added = Arc::clone(&self.buffer);
        let updated = Arc::clone(&self.buffer);
        let removed = Arc::clone(&self.buffer);
        let activated = Arc::clone(&self.buffer);
        Hooks {
            init: observer(move |entity: &EntityIndex| {
                fresh.lock().fresh.insert(*entity);
            }),
            destroy: observer(move |entity: &EntityIndex| {
                gone.lock().gone.insert(*entity);
            }),
            added: observer(move |change: &ComponentChange| {
                if change.mask.contains(ComponentMask::TRANSFORM) {
                    added.lock().fresh.insert(change.entity);
                }
            }),
            updated: observer(move |change: &ComponentChange| {
                if change.mask.contains(ComponentMask::TRANSFORM) {
                    updated.lock().moved.insert(change.entity);
                }
            }),
            removed: observer(move |change: &ComponentChange| {
                if change.mask.contains(ComponentMask::TRANSFORM) {
                    removed.lock().gone.insert(change.entity);
                }
            }),
            activation: observer(move |change: &ActivationChange| {
                let mut buffer = activated.lock();
                if !buffer.muted {
                    buffer.activated.insert(change.entity, change.active);
                }
            }),
        }
    }

    fn sync(&mut self, ctx: &mut SceneContext, merge: bool) {
        let chunks = ctx.chunks();
        if self.needs_full_pass
            || chunks.current_chunk() != self.evaluated_chunk
            || chunks.chunk_count() != self.evaluated_count
        {
            self.full_pass(ctx);
        } else if merge {
            self.merge(ctx);
        }
    }

    fn full_pass(&mut self, ctx: &mut SceneContext) {
        self.evaluated_chunk = ctx.chunks().current_chunk();
        self.evaluated_count = ctx.chunks().chunk_count();
        self.needs_full_pass = false;
        let buffered = std::mem::take(&mut *self.buffer.lock());
        self.record_own_flips(&buffered.activated);
        self.membership.clear();

        let entities = ctx.ecs().entities_with_components(ComponentMask::TRANSFORM);
        tracing::debug!(
            entities = entities.len(),
            chunk = %self.evaluated_chunk,
            "re-evaluating chunk membership"
        );
        if ctx.chunks().is_empty() {
            self.restore_own_flags(ctx, entities);
            self.own_active.clear();
        } else {
            let current: BTreeSet<EntityIndex> = entities.iter().copied().collect();
            self.own_active.retain(|entity, _| current.contains(entity));
            self.evaluate(ctx, entities);
        }
    }

    fn merge(&mut self, ctx: &mut SceneContext) {
        let buffered = std::mem::take(&mut *self.buffer.lock());
        if buffered.is_empty() {
            return;
        }
        let ecs = ctx.ecs();
        let qualifies =
            |entity: EntityIndex| ecs.entity_state(entity).is_alive() && ecs.has_component(entity, ComponentMask::TRANSFORM);

        for &entity in &buffered.gone {
            if !qualifies(entity) {
                self.membership.remove(&entity);
                self.own_active.remove(&entity);
            }
        }

        if ctx.chunks().is_empty() {
            let entities: BTreeSet<EntityIndex> = buffered
                .fresh
                .into_iter()
                .chain(buffered.moved)
                .chain(buffered.activated.into_keys())
                .filter(|&entity| qualifies(entity))
                .collect();
            self.restore_own_flags(ctx, entities);
            return;
        }

        self.record_own_flips(&buffered.activated);
        let mut targets: BTreeSet<EntityIndex> = buffered
            .fresh
            .into_iter()
            .chain(buffered.moved)
            .filter(|&entity| qualifies(entity))
            .collect();
        if let Some(transforms) = ctx.transforms() {
            let mut stack: Vec<EntityIndex> = targets.iter().copied().collect();
            while let Some(entity) = stack.pop() {
                for &child in transforms.children(entity) {
                    if qualifies(child) && targets.insert(child) {
                        stack.push(child);
                    }
                }
            }
        }
        self.evaluate(ctx, targets.into_iter().collect());
    }

    /// Outside activation changes become the own flag of entities the
    /// system already overrides.
    fn record_own_flips(&mut self, activated: &BTreeMap<EntityIndex, bool>) {
        for (entity, &active) in activated {
            if let Some(own) = self.own_active.get_mut(entity) {
                *own = active;
            }
        }
    }

    /// Give each entity `active = visible = own flag` and forget the override.
    fn restore_own_flags(&mut self, ctx: &mut SceneContext, entities: impl IntoIterator<Item = EntityIndex>) {
        let (ecs, chunks) = ctx.split_mut();
        self.buffer.lock().muted = true;
        for entity in entities {
            if chunks.is_always_active(entity) {
                continue;
            }
            let own = self
                .own_active
                .remove(&entity)
                .unwrap_or_else(|| ecs.is_active(entity));
            self.membership.remove(&entity);
            ecs.set_active(entity, own);
            ecs.set_visible(entity, own);
        }
        self.buffer.lock().muted = false;
    }

    fn evaluate(&mut self, ctx: &mut SceneContext, entities: Vec<EntityIndex>) {
        let (ecs, chunks) = ctx.split_mut();
        let decisions = classify(ecs, chunks, entities);
        self.buffer.lock().muted = true;
        for (entity, chunk) in decisions {
            let (active, visible) = if chunks.is_forced_active(entity) {
                (true, true)
            } else {
                chunks.entity_flags(chunk)
            };
            let previous = self.membership.insert(entity, chunk);
            if previous != Some(chunk) {
                tracing::trace!(%entity, %chunk, active, visible, "entity changed chunk");
            }
            self.own_active
                .entry(entity)
                .or_insert_with(|| ecs.is_active(entity));
            ecs.set_active(entity, active);
            ecs.set_visible(entity, visible);
        }
        self.buffer.lock().muted = false;
    }
}

/// Pick a chunk for each entity. Always-active entities are left out.
fn classify(
    ecs: &mut dyn EcsManager,
    chunks: &ChunkManager,
    entities: Vec<EntityIndex>,
) -> Vec<(EntityIndex, ChunkIndex)> {
    let colliders = ecs.manager::<DenseStorage<Collider>>(ComponentKind::Collider);
    let local_bounds: Vec<(EntityIndex, Option<Aabb>)> = entities
        .into_iter()
        .filter(|&entity| !chunks.is_always_active(entity))
        .map(|entity| {
            let bounds = colliders
                .filter(|_| ecs.has_component(entity, ComponentMask::COLLIDER))
                .map(|storage| storage.get(entity).bounds());
            (entity, bounds)
        })
        .collect();

    let Some(transforms) = ecs.manager_mut::<TransformManager>(ComponentKind::Transform) else {
        tracing::warn!("no transform manager registered; chunk classification skipped");
        return Vec::new();
    };
    local_bounds
        .into_iter()
        .map(|(entity, bounds)| {
            let matrix = transforms.local_to_world(entity);
            let position = matrix.w_axis.truncate();
            let world_bounds = bounds.map(|b| b.transformed(&matrix));
            (entity, chunks.classify(entity, position, world_bounds.as_ref()))
        })
        .collect()
}

impl Default for ChunkSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ChunkSystem {
    fn name(&self) -> &str {
        "chunks"
    }

    fn phases(&self) -> &[FramePhase] {
        &Self::PHASES
    }

    fn attach(&mut self, ctx: &mut SceneContext) {
        let hooks = self.make_hooks();
        let ecs = ctx.ecs_mut();
        ecs.add_lifecycle_observer(LifecycleEvent::Init, Arc::clone(&hooks.init));
        ecs.add_lifecycle_observer(LifecycleEvent::Destroy, Arc::clone(&hooks.destroy));
        ecs.add_component_observer(ComponentEvent::Add, Arc::clone(&hooks.added));
        ecs.add_component_observer(ComponentEvent::Update, Arc::clone(&hooks.updated));
        ecs.add_component_observer(ComponentEvent::Remove, Arc::clone(&hooks.removed));
        ecs.add_activation_observer(Arc::clone(&hooks.activation));
        self.hooks = Some(hooks);
        self.needs_full_pass = true;
    }

    fn detach(&mut self, ctx: &mut SceneContext) {
        let Some(hooks) = self.hooks.take() else {
            return;
        };
        let ecs = ctx.ecs_mut();
        ecs.remove_lifecycle_observer(LifecycleEvent::Init, &hooks.init);
        ecs.remove_lifecycle_observer(LifecycleEvent::Destroy, &hooks.destroy);
        ecs.remove_component_observer(ComponentEvent::Add, &hooks.added);
        ecs.remove_component_observer(ComponentEvent::Update, &hooks.updated);
        ecs.remove_component_observer(ComponentEvent::Remove, &hooks.removed);
        ecs.remove_activation_observer(&hooks.activation);
    }

    fn run(&mut self, phase: FramePhase, ctx: &mut SceneContext, _dt: f32) {
        match phase {
            FramePhase::Update => self.sync(ctx, false),
            FramePhase::EndOfFrame => self.sync(ctx, true),
            _ => {}
        }
    }

    fn apply_shift(&mut self, shift: EntityShift) {
        let remap = |set: &BTreeSet<EntityIndex>| -> BTreeSet<EntityIndex> {
            set.iter().filter_map(|&entity| shift.apply(entity)).collect()
        };
        let mut buffer = self.buffer.lock();
        let shifted = Buffered {
            fresh: remap(&buffer.fresh),
            moved: remap(&buffer.moved),
            gone: remap(&buffer.gone),
            activated: shift_keys(&buffer.activated, shift),
            muted: buffer.muted,
        };
        *buffer = shifted;
        drop(buffer);
        self.membership = shift_keys(&self.membership, shift);
        self.own_active = shift_keys(&self.own_active, shift);
    }
}

fn shift_keys<V: Copy>(map: &BTreeMap<EntityIndex, V>, shift: EntityShift) -> BTreeMap<EntityIndex, V> {
    map.iter()
        .filter_map(|(&entity, &value)| shift.apply(entity).map(|entity| (entity, value)))
        .collect()
}

impl std::fmt::Debug for ChunkSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSystem")
            .field("tracked", &self.membership.len())
            .field("overridden", &self.own_active.len())
            .field("evaluated_chunk", &self.evaluated_chunk)
            .field("attached", &self.hooks.is_some())
            .finish()
    }
}
