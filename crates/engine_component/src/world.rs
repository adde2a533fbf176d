//! # ECS World
//!
//! The central container for entity masks, lifecycle state and every
//! components manager.
//!
//! The world is the only writer of [`ComponentMask`]s. Managers own their
//! arrays; the world keeps every array the same length and drives the
//! splices produced by archetype authoring (see `archetype_registry`).
//!
//! Structural changes are announced through [`Subject`]s, synchronously and in
//! issue order. Observers receive the payload only, so they cannot mutate the
//! world mid-notification; systems buffer what they hear and act on it in a
//! later phase.

use std::collections::BTreeSet;

use crate::archetype::{Archetype, ArchetypeArena, ArchetypeId, EntityPool};
use crate::collision::CollisionEvents;
use crate::component::{Component, ComponentChange};
use crate::entity::{EntityIndex, EntityShift, EntityState};
use crate::error::EcsError;
use crate::mask::{ComponentKind, ComponentMask};
use crate::observer::{Observer, Subject};
use crate::storage::{ComponentsManager, DenseStorage};

/// Entity lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Fired once an entity was initialised from its archetype.
    Init,
    /// Fired before a destroyed entity's slot is swept.
    Destroy,
}

/// Structural-change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentEvent {
    /// Component bits were added.
    Add,
    /// Component bits were removed.
    Remove,
    /// Component values were written.
    Update,
}

/// Payload of the activation subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationChange {
    /// The entity whose `IS_ACTIVE` flag flipped.
    pub entity: EntityIndex,
    /// The new value of the flag.
    pub active: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingDestroy {
    entity: EntityIndex,
    remaining: f32,
}

/// The ECS world.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register_storage::<Light>();
///
/// let lamp = world.add_archetype(Archetype::new("lamp").with_component(Light::default()), 16)?;
/// let entity = world.add_entity(lamp);
/// world.destroy_entity(entity, 2.0);
/// ```
pub struct World {
    pub(crate) managers: Vec<Option<Box<dyn ComponentsManager>>>,
    pub(crate) masks: Vec<ComponentMask>,
    pub(crate) states: Vec<EntityState>,
    /// Free slots owned by the default archetype.
    pub(crate) free: BTreeSet<EntityIndex>,
    pending: Vec<PendingDestroy>,
    pub(crate) archetypes: Vec<Archetype>,
    pub(crate) arena: ArchetypeArena,

    drawn: Vec<EntityIndex>,
    published: Vec<EntityIndex>,

    pub(crate) collisions: CollisionEvents,

    on_init: Subject<EntityIndex>,
    on_destroy: Subject<EntityIndex>,
    on_activate: Subject<ActivationChange>,
    on_add_component: Subject<ComponentChange>,
    on_remove_component: Subject<ComponentChange>,
    on_update_component: Subject<ComponentChange>,
}

impl World {
    /// Creates a world holding only the default archetype and its slot 0.
    #[must_use]
    pub fn new() -> Self {
        let mut managers = Vec::with_capacity(ComponentKind::COUNT);
        managers.resize_with(ComponentKind::COUNT, || None);
        Self {
            managers,
            masks: vec![ComponentMask::empty()],
            states: vec![EntityState::Unallocated],
            free: BTreeSet::from([EntityIndex(0)]),
            pending: Vec::new(),
            archetypes: vec![Archetype::default_archetype()],
            arena: ArchetypeArena::new(),
            drawn: Vec::new(),
            published: Vec::new(),
            collisions: CollisionEvents::new(),
            on_init: Subject::new(),
            on_destroy: Subject::new(),
            on_activate: Subject::new(),
            on_add_component: Subject::new(),
            on_remove_component: Subject::new(),
            on_update_component: Subject::new(),
        }
    }

    // =========================================================================
    // Managers
    // =========================================================================

    /// Install the manager for its kind, sized to the current entity count.
    ///
    /// # Panics
    ///
    /// Panics if a manager for that kind is already installed.
    pub fn register_manager(&mut self, mut manager: Box<dyn ComponentsManager>) {
        let kind = manager.kind();
        let slot = &mut self.managers[kind.slot()];
        assert!(slot.is_none(), "a {kind} manager is already registered");
        manager.resize_entities(self.masks.len());
        tracing::debug!(%kind, entities = self.masks.len(), "registered components manager");
        *slot = Some(manager);
    }

    /// Install a [`DenseStorage`] for `T`.
    pub fn register_storage<T: Component>(&mut self) {
        self.register_manager(Box::new(DenseStorage::<T>::new()));
    }

    /// Returns `true` if a manager for `kind` is installed.
    #[must_use]
    pub fn has_manager(&self, kind: ComponentKind) -> bool {
        self.managers[kind.slot()].is_some()
    }

    /// The type-erased manager for `kind`.
    #[must_use]
    pub fn manager_dyn(&self, kind: ComponentKind) -> Option<&dyn ComponentsManager> {
        self.managers[kind.slot()].as_deref()
    }

    /// The type-erased manager for `kind`, mutably.
    pub fn manager_dyn_mut(&mut self, kind: ComponentKind) -> Option<&mut (dyn ComponentsManager + 'static)> {
        self.managers[kind.slot()].as_deref_mut()
    }

    /// The manager for `kind`, downcast to `M`.
    #[must_use]
    pub fn manager<M: ComponentsManager>(&self, kind: ComponentKind) -> Option<&M> {
        self.manager_dyn(kind)?.as_any().downcast_ref::<M>()
    }

    /// The manager for `kind`, downcast to `M`, mutably.
    pub fn manager_mut<M: ComponentsManager>(&mut self, kind: ComponentKind) -> Option<&mut M> {
        self.manager_dyn_mut(kind)?.as_any_mut().downcast_mut::<M>()
    }

    /// The dense storage of `T`, if `T` is stored densely.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&DenseStorage<T>> {
        self.manager::<DenseStorage<T>>(T::kind())
    }

    /// The dense storage of `T`, mutably.
    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut DenseStorage<T>> {
        self.manager_mut::<DenseStorage<T>>(T::kind())
    }

    pub(crate) fn require_manager_mut(&mut self, kind: ComponentKind) -> Result<&mut (dyn ComponentsManager + 'static), EcsError> {
        self.managers[kind.slot()]
            .as_deref_mut()
            .ok_or(EcsError::MissingManager(kind))
    }

    /// Read the `T` component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the entity does not own `T` or `T` is not densely stored.
    #[must_use]
    pub fn component<T: Component>(&self, entity: EntityIndex) -> &T {
        self.assert_owns(entity, T::mask());
        self.storage::<T>()
            .unwrap_or_else(|| panic!("no dense storage registered for {}", T::kind()))
            .get(entity)
    }

    /// Write the `T` component of `entity` and fire the update subject.
    ///
    /// The mask is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if the entity does not own `T` or `T` is not densely stored.
    pub fn set_component<T: Component>(&mut self, entity: EntityIndex, value: T) {
        self.assert_owns(entity, T::mask());
        self.storage_mut::<T>()
            .unwrap_or_else(|| panic!("no dense storage registered for {}", T::kind()))
            .set(entity, value);
        self.update_component(entity, T::mask());
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Number of entity slots, allocated or not.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.masks.len()
    }

    /// Lifecycle state of `entity`. Slots past the end are unallocated.
    #[must_use]
    pub fn entity_state(&self, entity: EntityIndex) -> EntityState {
        self.states
            .get(entity.index())
            .copied()
            .unwrap_or(EntityState::Unallocated)
    }

    /// Returns `true` if `entity` is allocated and not yet destroyed.
    #[must_use]
    pub fn is_alive(&self, entity: EntityIndex) -> bool {
        self.entity_state(entity).is_alive()
    }

    /// Allocate an entity of `archetype`, initialise it from the archetype
    /// defaults and fire [`LifecycleEvent::Init`].
    ///
    /// Default entities reuse the lowest free slot, growing every array when
    /// none is left. Pooled entities take the first free slot in their pool.
    ///
    /// # Panics
    ///
    /// Panics if the archetype is unknown or its pool is full.
    pub fn add_entity(&mut self, archetype: ArchetypeId) -> EntityIndex {
        let entity = self.spawn(archetype);
        self.on_init.notify(&entity);
        entity
    }

    /// Allocate and initialise without notifying.
    pub(crate) fn spawn(&mut self, archetype: ArchetypeId) -> EntityIndex {
        let entity = self.claim_slot(archetype);
        if let Err(err) = self.reset_slot(entity, archetype) {
            panic!("archetype {archetype} defaults no longer decode: {err}");
        }
        entity
    }

    pub(crate) fn notify_init(&self, entity: EntityIndex) {
        self.on_init.notify(&entity);
    }

    fn claim_slot(&mut self, archetype: ArchetypeId) -> EntityIndex {
        if archetype == ArchetypeId::DEFAULT {
            if let Some(entity) = self.free.pop_first() {
                return entity;
            }
            let entity = EntityIndex::from(self.masks.len());
            self.grow(self.masks.len() + 1);
            return entity;
        }

        let pool = self
            .arena
            .pool(archetype)
            .unwrap_or_else(|| panic!("add_entity with unknown {archetype}"));
        pool.iter()
            .find(|entity| self.states[entity.index()].is_free())
            .unwrap_or_else(|| {
                panic!(
                    "archetype '{}' has no free slot left in its pool of {}",
                    self.archetypes[archetype.index()].name,
                    pool.len()
                )
            })
    }

    fn grow(&mut self, count: usize) {
        self.masks.resize(count, ComponentMask::empty());
        self.states.resize(count, EntityState::Unallocated);
        for manager in self.managers.iter_mut().flatten() {
            manager.resize_entities(count);
        }
    }

    fn reset_slot(&mut self, entity: EntityIndex, archetype: ArchetypeId) -> Result<(), EcsError> {
        let template = &self.archetypes[archetype.index()];
        let slot = EntityPool::new(entity, 1);
        for manager in self.managers.iter_mut().flatten() {
            manager.set_with_archetype(slot, template)?;
        }
        self.collisions.clear_entity(entity);
        self.pending.retain(|pending| pending.entity != entity);
        self.free.remove(&entity);

        let mask = template.mask;
        self.masks[entity.index()] = mask;
        self.states[entity.index()] = if mask.contains(ComponentMask::IS_ACTIVE) {
            EntityState::Active
        } else {
            EntityState::Inactive
        };
        Ok(())
    }

    /// Re-initialise `entity` from the defaults of `archetype` and fire
    /// [`LifecycleEvent::Init`].
    ///
    /// # Panics
    ///
    /// Panics if `entity` does not lie in the region owned by `archetype`.
    pub fn set_entity_with_archetype(&mut self, entity: EntityIndex, archetype: ArchetypeId) -> Result<(), EcsError> {
        assert!(
            entity.index() < self.masks.len(),
            "{entity} is past the last slot ({})",
            self.masks.len()
        );
        let owner = self.arena.owner_of(entity);
        assert!(
            owner == archetype,
            "{entity} belongs to {owner}, it cannot be initialised as {archetype}"
        );
        self.reset_slot(entity, archetype)?;
        self.on_init.notify(&entity);
        Ok(())
    }

    /// Destroy `entity`, now (`delay <= 0`) or once `delay` seconds of
    /// [`World::update`] have elapsed.
    ///
    /// Calling it again on a pending entity re-arms the countdown with the new
    /// delay. Default entities are freed ([`World::free_entity`]); pooled ones
    /// are deactivated in place ([`World::deactivate_archetype_member`]).
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive.
    pub fn destroy_entity(&mut self, entity: EntityIndex, delay: f32) {
        self.assert_alive(entity);
        if delay <= 0.0 {
            self.destroy_now(entity);
            return;
        }

        match self.pending.iter_mut().find(|pending| pending.entity == entity) {
            Some(pending) => pending.remaining = delay,
            None => self.pending.push(PendingDestroy {
                entity,
                remaining: delay,
            }),
        }
        self.states[entity.index()] = EntityState::PendingDestroy;
    }

    fn destroy_now(&mut self, entity: EntityIndex) {
        if self.arena.owner_of(entity) == ArchetypeId::DEFAULT {
            self.free_entity(entity);
        } else {
            self.deactivate_archetype_member(entity);
        }
    }

    /// Destroy a default-archetype entity: fire [`LifecycleEvent::Destroy`],
    /// sweep every manager, clear the mask and return the slot to the free set.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive or belongs to a pooled archetype.
    pub fn free_entity(&mut self, entity: EntityIndex) {
        self.assert_alive(entity);
        let owner = self.arena.owner_of(entity);
        assert!(
            owner == ArchetypeId::DEFAULT,
            "{entity} is a member of {owner}; pooled entities are deactivated, not freed"
        );

        self.on_destroy.notify(&entity);
        self.release(entity);
    }

    /// Destroy a pooled entity: fire [`LifecycleEvent::Destroy`] and clear its
    /// active and visible flags, firing the activation subject if it was
    /// active. Component values stay in place until the slot is handed out
    /// again.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive or belongs to the default archetype.
    pub fn deactivate_archetype_member(&mut self, entity: EntityIndex) {
        self.assert_alive(entity);
        assert!(
            self.arena.owner_of(entity) != ArchetypeId::DEFAULT,
            "{entity} belongs to the default archetype; use free_entity"
        );

        self.on_destroy.notify(&entity);
        self.set_active(entity, false);
        self.set_visible(entity, false);
        self.release(entity);
    }

    /// Return a slot to its free state without notifying.
    pub(crate) fn release(&mut self, entity: EntityIndex) {
        self.pending.retain(|pending| pending.entity != entity);
        self.collisions.clear_entity(entity);
        self.states[entity.index()] = EntityState::Destroyed;

        if self.arena.owner_of(entity) == ArchetypeId::DEFAULT {
            for manager in self.managers.iter_mut().flatten() {
                manager.destroy_entity(entity);
            }
            self.masks[entity.index()] = ComponentMask::empty();
            self.free.insert(entity);
        } else {
            self.masks[entity.index()].remove(ComponentMask::FLAGS);
        }
    }

    /// Advance deferred destruction by `dt` seconds and rotate the drawn
    /// entities channel.
    ///
    /// Expired entities are destroyed in the order they were queued.
    pub fn update(&mut self, dt: f32) {
        self.drawn = std::mem::take(&mut self.published);

        let mut expired = Vec::new();
        self.pending.retain_mut(|pending| {
            pending.remaining -= dt;
            if pending.remaining <= 0.0 {
                expired.push(pending.entity);
                false
            } else {
                true
            }
        });
        for entity in expired {
            tracing::trace!(%entity, "deferred destroy expired");
            self.destroy_now(entity);
        }
    }

    /// Seconds left before `entity` is destroyed, if it is pending.
    #[must_use]
    pub fn destroy_countdown(&self, entity: EntityIndex) -> Option<f32> {
        self.pending
            .iter()
            .find(|pending| pending.entity == entity)
            .map(|pending| pending.remaining)
    }

    // =========================================================================
    // Masks
    // =========================================================================

    /// The full mask of `entity`, flags included.
    #[must_use]
    pub fn mask(&self, entity: EntityIndex) -> ComponentMask {
        self.masks
            .get(entity.index())
            .copied()
            .unwrap_or_default()
    }

    /// Returns `true` if `entity` has every bit of `mask`.
    #[must_use]
    pub fn has_component(&self, entity: EntityIndex, mask: ComponentMask) -> bool {
        self.mask(entity).contains(mask)
    }

    /// OR `mask` into the entity mask and fire [`ComponentEvent::Add`] with the
    /// bits that were not already set. Nothing fires if no bit changed.
    ///
    /// # Panics
    ///
    /// Panics on flag bits, on a dead entity, or when a kind has no manager.
    pub fn add_component(&mut self, entity: EntityIndex, mask: ComponentMask) {
        self.check_component_bits(entity, mask);
        let added = mask.difference(self.masks[entity.index()]);
        self.masks[entity.index()].insert(mask);
        if !added.is_empty() {
            self.on_add_component.notify(&ComponentChange {
                entity,
                mask: added,
            });
        }
    }

    /// AND-NOT `mask` out of the entity mask and fire
    /// [`ComponentEvent::Remove`] with the bits that were actually set.
    ///
    /// # Panics
    ///
    /// Panics on flag bits or a dead entity.
    pub fn remove_component(&mut self, entity: EntityIndex, mask: ComponentMask) {
        self.check_component_bits(entity, mask);
        let removed = mask.intersection(self.masks[entity.index()]);
        self.masks[entity.index()].remove(mask);
        if !removed.is_empty() {
            self.on_remove_component.notify(&ComponentChange {
                entity,
                mask: removed,
            });
        }
    }

    /// Announce that component values of `entity` were written.
    pub fn update_component(&mut self, entity: EntityIndex, mask: ComponentMask) {
        self.assert_alive(entity);
        self.on_update_component.notify(&ComponentChange { entity, mask });
    }

    fn check_component_bits(&self, entity: EntityIndex, mask: ComponentMask) {
        self.assert_alive(entity);
        assert!(
            !mask.intersects(ComponentMask::FLAGS),
            "entity flags go through set_active / set_visible, not component masks"
        );
        for kind in mask.kinds() {
            let backed = self.managers[kind.slot()]
                .as_ref()
                .is_some_and(|manager| manager.len() > entity.index());
            assert!(backed, "{kind} storage does not cover {entity}");
        }
    }

    /// Set or clear `IS_ACTIVE`. Fires the activation subject when the flag
    /// actually flips.
    pub fn set_active(&mut self, entity: EntityIndex, active: bool) {
        self.assert_alive(entity);
        let mask = &mut self.masks[entity.index()];
        let was = mask.contains(ComponentMask::IS_ACTIVE);
        mask.set(ComponentMask::IS_ACTIVE, active);

        let state = &mut self.states[entity.index()];
        if *state != EntityState::PendingDestroy {
            *state = if active {
                EntityState::Active
            } else {
                EntityState::Inactive
            };
        }
        if was != active {
            self.on_activate.notify(&ActivationChange { entity, active });
        }
    }

    /// Set or clear `IS_VISIBLE`, independently of `IS_ACTIVE`.
    pub fn set_visible(&mut self, entity: EntityIndex, visible: bool) {
        self.assert_alive(entity);
        self.masks[entity.index()].set(ComponentMask::IS_VISIBLE, visible);
    }

    /// Returns `true` if `entity` is alive and simulated.
    #[must_use]
    pub fn is_active(&self, entity: EntityIndex) -> bool {
        self.is_alive(entity) && self.mask(entity).contains(ComponentMask::IS_ACTIVE)
    }

    /// Returns `true` if `entity` is alive and rendered.
    #[must_use]
    pub fn is_visible(&self, entity: EntityIndex) -> bool {
        self.is_alive(entity) && self.mask(entity).contains(ComponentMask::IS_VISIBLE)
    }

    fn assert_alive(&self, entity: EntityIndex) {
        assert!(
            self.is_alive(entity),
            "{entity} is not alive ({:?})",
            self.entity_state(entity)
        );
    }

    fn assert_owns(&self, entity: EntityIndex, mask: ComponentMask) {
        assert!(
            self.has_component(entity, mask),
            "{entity} does not own {mask:?}"
        );
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn scan(&self, predicate: impl Fn(ComponentMask) -> bool) -> Vec<EntityIndex> {
        self.masks
            .iter()
            .zip(&self.states)
            .enumerate()
            .filter(|(_, (mask, state))| state.is_alive() && predicate(**mask))
            .map(|(i, _)| EntityIndex::from(i))
            .collect()
    }

    /// Live entities whose component bits equal those of `mask`. O(n).
    #[must_use]
    pub fn find_similar_entities(&self, mask: ComponentMask) -> Vec<EntityIndex> {
        let wanted = mask.components();
        self.scan(|candidate| candidate.components() == wanted)
    }

    /// Live entities owning at least the component bits of `mask`. O(n).
    #[must_use]
    pub fn entities_with_components(&self, mask: ComponentMask) -> Vec<EntityIndex> {
        let wanted = mask.components();
        self.scan(|candidate| candidate.contains(wanted))
    }

    /// Live entities with `IS_ACTIVE` set. O(n).
    #[must_use]
    pub fn active_entities(&self) -> Vec<EntityIndex> {
        self.scan(|candidate| candidate.contains(ComponentMask::IS_ACTIVE))
    }

    /// The entities rendered last frame.
    #[must_use]
    pub fn drawn_entities(&self) -> &[EntityIndex] {
        &self.drawn
    }

    /// Publish this frame's rendered entities. Readers see them after the
    /// next [`World::update`].
    pub fn set_visible_entities(&mut self, entities: Vec<EntityIndex>) {
        self.published = entities;
    }

    // =========================================================================
    // Observers
    // =========================================================================

    fn lifecycle_subject(&mut self, event: LifecycleEvent) -> &mut Subject<EntityIndex> {
        match event {
            LifecycleEvent::Init => &mut self.on_init,
            LifecycleEvent::Destroy => &mut self.on_destroy,
        }
    }

    fn component_subject(&mut self, event: ComponentEvent) -> &mut Subject<ComponentChange> {
        match event {
            ComponentEvent::Add => &mut self.on_add_component,
            ComponentEvent::Remove => &mut self.on_remove_component,
            ComponentEvent::Update => &mut self.on_update_component,
        }
    }

    /// Subscribe to entity init or destroy.
    pub fn add_lifecycle_observer(&mut self, event: LifecycleEvent, observer: Observer<EntityIndex>) {
        self.lifecycle_subject(event).add_observer(observer);
    }

    /// Unsubscribe from entity init or destroy.
    pub fn remove_lifecycle_observer(&mut self, event: LifecycleEvent, observer: &Observer<EntityIndex>) -> bool {
        self.lifecycle_subject(event).remove_observer(observer)
    }

    /// Subscribe to `IS_ACTIVE` flips.
    pub fn add_activation_observer(&mut self, observer: Observer<ActivationChange>) {
        self.on_activate.add_observer(observer);
    }

    /// Unsubscribe from `IS_ACTIVE` flips.
    pub fn remove_activation_observer(&mut self, observer: &Observer<ActivationChange>) -> bool {
        self.on_activate.remove_observer(observer)
    }

    /// Subscribe to a structural-change subject.
    pub fn add_component_observer(&mut self, event: ComponentEvent, observer: Observer<ComponentChange>) {
        self.component_subject(event).add_observer(observer);
    }

    /// Unsubscribe from a structural-change subject.
    pub fn remove_component_observer(&mut self, event: ComponentEvent, observer: &Observer<ComponentChange>) -> bool {
        self.component_subject(event).remove_observer(observer)
    }

    // =========================================================================
    // Index shifts
    // =========================================================================

    /// Splice fresh, unallocated slots into the world's own tables. Managers
    /// are spliced by the caller.
    pub(crate) fn insert_slots(&mut self, at: EntityIndex, count: u32) {
        let range = at.index()..at.index();
        self.masks
            .splice(range.clone(), std::iter::repeat_n(ComponentMask::empty(), count as usize));
        self.states
            .splice(range, std::iter::repeat_n(EntityState::Unallocated, count as usize));
    }

    /// Remove slots from the world's own tables.
    pub(crate) fn erase_slots(&mut self, at: EntityIndex, count: u32) {
        let range = at.index()..at.index() + count as usize;
        self.masks.drain(range.clone());
        self.states.drain(range);
    }

    /// Move every index the world holds outside its dense tables.
    pub(crate) fn shift_references(&mut self, shift: EntityShift) {
        if shift == EntityShift::None {
            return;
        }
        self.free = self.free.iter().filter_map(|&e| shift.apply(e)).collect();
        self.pending = self
            .pending
            .iter()
            .filter_map(|pending| {
                shift.apply(pending.entity).map(|entity| PendingDestroy {
                    entity,
                    remaining: pending.remaining,
                })
            })
            .collect();
        self.drawn = self.drawn.iter().filter_map(|&e| shift.apply(e)).collect();
        self.published = self.published.iter().filter_map(|&e| shift.apply(e)).collect();
        self.collisions.apply_shift(shift);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.masks.len())
            .field("free", &self.free.len())
            .field("pending_destroy", &self.pending.len())
            .field("archetypes", &self.archetypes.len())
            .finish_non_exhaustive()
    }
}
