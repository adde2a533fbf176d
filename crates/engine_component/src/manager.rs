//! The ECS interface handed to systems.
//!
//! Systems are written against [`EcsManager`] rather than [`World`], so they
//! can run headless on top of [`NullEcs`].

use serde_json::Value;

use crate::archetype::ArchetypeId;
use crate::collision::{Collision, CollisionEvent, CollisionPhase};
use crate::component::ComponentChange;
use crate::entity::{EntityIndex, EntityShift, EntityState};
use crate::error::EcsError;
use crate::mask::{ComponentKind, ComponentMask};
use crate::observer::Observer;
use crate::prefab::Prefab;
use crate::storage::ComponentsManager;
use crate::world::{ActivationChange, ComponentEvent, LifecycleEvent, World};

/// Object-safe view of the ECS core.
pub trait EcsManager: Send + Sync {
    /// Number of entity slots.
    fn entity_count(&self) -> usize;
    /// Lifecycle state of `entity`.
    fn entity_state(&self, entity: EntityIndex) -> EntityState;
    /// Full mask of `entity`.
    fn mask(&self, entity: EntityIndex) -> ComponentMask;
    /// Returns `true` if `entity` has every bit of `mask`.
    fn has_component(&self, entity: EntityIndex, mask: ComponentMask) -> bool;
    /// Returns `true` if `entity` is alive and simulated.
    fn is_active(&self, entity: EntityIndex) -> bool;
    /// Returns `true` if `entity` is alive and rendered.
    fn is_visible(&self, entity: EntityIndex) -> bool;

    /// See [`World::add_entity`].
    fn add_entity(&mut self, archetype: ArchetypeId) -> EntityIndex;
    /// See [`World::destroy_entity`].
    fn destroy_entity(&mut self, entity: EntityIndex, delay: f32);
    /// See [`World::add_component`].
    fn add_component(&mut self, entity: EntityIndex, mask: ComponentMask);
    /// See [`World::remove_component`].
    fn remove_component(&mut self, entity: EntityIndex, mask: ComponentMask);
    /// See [`World::update_component`].
    fn update_component(&mut self, entity: EntityIndex, mask: ComponentMask);
    /// See [`World::set_active`].
    fn set_active(&mut self, entity: EntityIndex, active: bool);
    /// See [`World::set_visible`].
    fn set_visible(&mut self, entity: EntityIndex, visible: bool);
    /// See [`World::update`].
    fn update(&mut self, dt: f32);

    /// See [`World::find_similar_entities`].
    fn find_similar_entities(&self, mask: ComponentMask) -> Vec<EntityIndex>;
    /// See [`World::entities_with_components`].
    fn entities_with_components(&self, mask: ComponentMask) -> Vec<EntityIndex>;
    /// See [`World::active_entities`].
    fn active_entities(&self) -> Vec<EntityIndex>;
    /// See [`World::drawn_entities`].
    fn drawn_entities(&self) -> &[EntityIndex];
    /// See [`World::set_visible_entities`].
    fn set_visible_entities(&mut self, entities: Vec<EntityIndex>);
    /// See [`World::archetype_id`].
    fn archetype_id(&self, name: &str) -> ArchetypeId;

    /// See [`World::instantiate_prefab`].
    fn instantiate_prefab(&mut self, prefab: &Prefab) -> Result<Vec<EntityIndex>, EcsError>;
    /// See [`World::resize_archetype`]. Callers forward the shift to every
    /// other holder of entity indices.
    fn resize_archetype(&mut self, id: ArchetypeId, size: u32) -> Result<EntityShift, EcsError>;
    /// See [`World::archetypes_to_json`].
    fn archetypes_to_json(&self) -> Result<Value, EcsError>;
    /// See [`World::archetypes_from_json`].
    fn archetypes_from_json(&mut self, json: &Value) -> Result<Vec<EntityShift>, EcsError>;

    /// Type-erased manager for `kind`.
    fn components_manager(&self, kind: ComponentKind) -> Option<&dyn ComponentsManager>;
    /// Type-erased manager for `kind`, mutably.
    fn components_manager_mut(&mut self, kind: ComponentKind) -> Option<&mut (dyn ComponentsManager + 'static)>;

    /// Subscribe to entity init or destroy.
    fn add_lifecycle_observer(&mut self, event: LifecycleEvent, observer: Observer<EntityIndex>);
    /// Unsubscribe from entity init or destroy.
    fn remove_lifecycle_observer(&mut self, event: LifecycleEvent, observer: &Observer<EntityIndex>) -> bool;
    /// Subscribe to `IS_ACTIVE` flips.
    fn add_activation_observer(&mut self, observer: Observer<ActivationChange>);
    /// Unsubscribe from `IS_ACTIVE` flips.
    fn remove_activation_observer(&mut self, observer: &Observer<ActivationChange>) -> bool;
    /// Subscribe to a structural-change subject.
    fn add_component_observer(&mut self, event: ComponentEvent, observer: Observer<ComponentChange>);
    /// Unsubscribe from a structural-change subject.
    fn remove_component_observer(&mut self, event: ComponentEvent, observer: &Observer<ComponentChange>) -> bool;

    /// See [`World::register_collision_observer`].
    fn register_collision_observer(
        &mut self,
        entity: EntityIndex,
        phase: CollisionPhase,
        observer: Observer<CollisionEvent>,
    );
    /// See [`World::remove_collision_observer`].
    fn remove_collision_observer(
        &mut self,
        entity: EntityIndex,
        phase: CollisionPhase,
        observer: &Observer<CollisionEvent>,
    ) -> bool;
    /// See [`World::notify_collision`].
    fn notify_collision(&self, entity: EntityIndex, phase: CollisionPhase, collision: Collision);

    fn register_observer_trigger_enter(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::TriggerEnter, observer);
    }

    fn register_observer_trigger_exit(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::TriggerExit, observer);
    }

    fn register_observer_collision_enter(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::CollisionEnter, observer);
    }

    fn register_observer_collision_exit(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::CollisionExit, observer);
    }

    fn notify_trigger_enter(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::TriggerEnter, collision);
    }

    fn notify_trigger_exit(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::TriggerExit, collision);
    }

    fn notify_collision_enter(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::CollisionEnter, collision);
    }

    fn notify_collision_exit(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::CollisionExit, collision);
    }
}

impl dyn EcsManager + '_ {
    /// The manager for `kind`, downcast to `M`.
    #[must_use]
    pub fn manager<M: ComponentsManager>(&self, kind: ComponentKind) -> Option<&M> {
        self.components_manager(kind)?.as_any().downcast_ref::<M>()
    }

    /// The manager for `kind`, downcast to `M`, mutably.
    pub fn manager_mut<M: ComponentsManager>(&mut self, kind: ComponentKind) -> Option<&mut M> {
        self.components_manager_mut(kind)?.as_any_mut().downcast_mut::<M>()
    }
}

impl EcsManager for World {
    fn entity_count(&self) -> usize {
        World::entity_count(self)
    }

    fn entity_state(&self, entity: EntityIndex) -> EntityState {
        World::entity_state(self, entity)
    }

    fn mask(&self, entity: EntityIndex) -> ComponentMask {
        World::mask(self, entity)
    }

    fn has_component(&self, entity: EntityIndex, mask: ComponentMask) -> bool {
        World::has_component(self, entity, mask)
    }

    fn is_active(&self, entity: EntityIndex) -> bool {
        World::is_active(self, entity)
    }

    fn is_visible(&self, entity: EntityIndex) -> bool {
        World::is_visible(self, entity)
    }

    fn add_entity(&mut self, archetype: ArchetypeId) -> EntityIndex {
        World::add_entity(self, archetype)
    }

    fn destroy_entity(&mut self, entity: EntityIndex, delay: f32) {
        World::destroy_entity(self, entity, delay);
    }

    fn add_component(&mut self, entity: EntityIndex, mask: ComponentMask) {
        World::add_component(self, entity, mask);
    }

    fn remove_component(&mut self, entity: EntityIndex, mask: ComponentMask) {
        World::remove_component(self, entity, mask);
    }

    fn update_component(&mut self, entity: EntityIndex, mask: ComponentMask) {
        World::update_component(self, entity, mask);
    }

    fn set_active(&mut self, entity: EntityIndex, active: bool) {
        World::set_active(self, entity, active);
    }

    fn set_visible(&mut self, entity: EntityIndex, visible: bool) {
        World::set_visible(self, entity, visible);
    }

    fn update(&mut self, dt: f32) {
        World::update(self, dt);
    }

    fn find_similar_entities(&self, mask: ComponentMask) -> Vec<EntityIndex> {
        World::find_similar_entities(self, mask)
    }

    fn entities_with_components(&self, mask: ComponentMask) -> Vec<EntityIndex> {
        World::entities_with_components(self, mask)
    }

    fn active_entities(&self) -> Vec<EntityIndex> {
        World::active_entities(self)
    }

    fn drawn_entities(&self) -> &[EntityIndex] {
        World::drawn_entities(self)
    }

    fn set_visible_entities(&mut self, entities: Vec<EntityIndex>) {
        World::set_visible_entities(self, entities);
    }

    fn archetype_id(&self, name: &str) -> ArchetypeId {
        World::archetype_id(self, name)
    }

    fn instantiate_prefab(&mut self, prefab: &Prefab) -> Result<Vec<EntityIndex>, EcsError> {
        World::instantiate_prefab(self, prefab)
    }

    fn resize_archetype(&mut self, id: ArchetypeId, size: u32) -> Result<EntityShift, EcsError> {
        World::resize_archetype(self, id, size)
    }

    fn archetypes_to_json(&self) -> Result<Value, EcsError> {
        World::archetypes_to_json(self)
    }

    fn archetypes_from_json(&mut self, json: &Value) -> Result<Vec<EntityShift>, EcsError> {
        World::archetypes_from_json(self, json)
    }

    fn components_manager(&self, kind: ComponentKind) -> Option<&dyn ComponentsManager> {
        self.manager_dyn(kind)
    }

    fn components_manager_mut(&mut self, kind: ComponentKind) -> Option<&mut (dyn ComponentsManager + 'static)> {
        self.manager_dyn_mut(kind)
    }

    fn add_lifecycle_observer(&mut self, event: LifecycleEvent, observer: Observer<EntityIndex>) {
        World::add_lifecycle_observer(self, event, observer);
    }

    fn remove_lifecycle_observer(&mut self, event: LifecycleEvent, observer: &Observer<EntityIndex>) -> bool {
        World::remove_lifecycle_observer(self, event, observer)
    }

    fn add_activation_observer(&mut self, observer: Observer<ActivationChange>) {
        World::add_activation_observer(self, observer);
    }

    fn remove_activation_observer(&mut self, observer: &Observer<ActivationChange>) -> bool {
        World::remove_activation_observer(self, observer)
    }

    fn add_component_observer(&mut self, event: ComponentEvent, observer: Observer<ComponentChange>) {
        World::add_component_observer(self, event, observer);
    }

    fn remove_component_observer(&mut self, event: ComponentEvent, observer: &Observer<ComponentChange>) -> bool {
        World::remove_component_observer(self, event, observer)
    }

    fn register_collision_observer(
        &mut self,
        entity: EntityIndex,
        phase: CollisionPhase,
        observer: Observer<CollisionEvent>,
    ) {
        World::register_collision_observer(self, entity, phase, observer);
    }

    fn remove_collision_observer(
        &mut self,
        entity: EntityIndex,
        phase: CollisionPhase,
        observer: &Observer<CollisionEvent>,
    ) -> bool {
        World::remove_collision_observer(self, entity, phase, observer)
    }

    fn notify_collision(&self, entity: EntityIndex, phase: CollisionPhase, collision: Collision) {
        World::notify_collision(self, entity, phase, collision);
    }
}

/// Headless stand-in for the ECS.
///
/// Every query answers with an empty or negative default. Every call that
/// would mutate entity data panics. Observer registration is accepted and
/// discarded, since nothing will ever be notified.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEcs;

impl NullEcs {
    fn unavailable(operation: &str) -> ! {
        panic!("{operation} called on NullEcs: no ECS is installed");
    }
}

impl EcsManager for NullEcs {
    fn entity_count(&self) -> usize {
        0
    }

    fn entity_state(&self, _entity: EntityIndex) -> EntityState {
        EntityState::Unallocated
    }

    fn mask(&self, _entity: EntityIndex) -> ComponentMask {
        ComponentMask::empty()
    }

    fn has_component(&self, _entity: EntityIndex, _mask: ComponentMask) -> bool {
        false
    }

    fn is_active(&self, _entity: EntityIndex) -> bool {
        false
    }

    fn is_visible(&self, _entity: EntityIndex) -> bool {
        false
    }

    fn add_entity(&mut self, _archetype: ArchetypeId) -> EntityIndex {
        Self::unavailable("add_entity")
    }

    fn destroy_entity(&mut self, _entity: EntityIndex, _delay: f32) {
        Self::unavailable("destroy_entity")
    }

    fn add_component(&mut self, _entity: EntityIndex, _mask: ComponentMask) {
        Self::unavailable("add_component")
    }

    fn remove_component(&mut self, _entity: EntityIndex, _mask: ComponentMask) {
        Self::unavailable("remove_component")
    }

    fn update_component(&mut self, _entity: EntityIndex, _mask: ComponentMask) {
        Self::unavailable("update_component")
    }

    fn set_active(&mut self, _entity: EntityIndex, _active: bool) {
        Self::unavailable("set_active")
    }

    fn set_visible(&mut self, _entity: EntityIndex, _visible: bool) {
        Self::unavailable("set_visible")
    }

    fn update(&mut self, _dt: f32) {}

    fn find_similar_entities(&self, _mask: ComponentMask) -> Vec<EntityIndex> {
        Vec::new()
    }

    fn entities_with_components(&self, _mask: ComponentMask) -> Vec<EntityIndex> {
        Vec::new()
    }

    fn active_entities(&self) -> Vec<EntityIndex> {
        Vec::new()
    }

    fn drawn_entities(&self) -> &[EntityIndex] {
        &[]
    }

    fn set_visible_entities(&mut self, _entities: Vec<EntityIndex>) {
        Self::unavailable("set_visible_entities")
    }

    fn archetype_id(&self, _name: &str) -> ArchetypeId {
        ArchetypeId::DEFAULT
    }

    fn instantiate_prefab(&mut self, _prefab: &Prefab) -> Result<Vec<EntityIndex>, EcsError> {
        Self::unavailable("instantiate_prefab")
    }

    fn resize_archetype(&mut self, _id: ArchetypeId, _size: u32) -> Result<EntityShift, EcsError> {
        Self::unavailable("resize_archetype")
    }

    fn archetypes_to_json(&self) -> Result<Value, EcsError> {
        Ok(Value::Array(Vec::new()))
    }

    fn archetypes_from_json(&mut self, _json: &Value) -> Result<Vec<EntityShift>, EcsError> {
        Self::unavailable("archetypes_from_json")
    }

    fn components_manager(&self, _kind: ComponentKind) -> Option<&dyn ComponentsManager> {
        None
    }

    fn components_manager_mut(&mut self, _kind: ComponentKind) -> Option<&mut (dyn ComponentsManager + 'static)> {
        None
    }

    fn add_lifecycle_observer(&mut self, _event: LifecycleEvent, _observer: Observer<EntityIndex>) {}

    fn remove_lifecycle_observer(&mut self, _event: LifecycleEvent, _observer: &Observer<EntityIndex>) -> bool {
        false
    }

    fn add_activation_observer(&mut self, _observer: Observer<ActivationChange>) {}

    fn remove_activation_observer(&mut self, _observer: &Observer<ActivationChange>) -> bool {
        false
    }

    fn add_component_observer(&mut self, _event: ComponentEvent, _observer: Observer<ComponentChange>) {}

    fn remove_component_observer(&mut self, _event: ComponentEvent, _observer: &Observer<ComponentChange>) -> bool {
        false
    }

    fn register_collision_observer(
        &mut self,
        _entity: EntityIndex,
        _phase: CollisionPhase,
        _observer: Observer<CollisionEvent>,
    ) {}

    fn remove_collision_observer(
        &mut self,
        _entity: EntityIndex,
        _phase: CollisionPhase,
        _observer: &Observer<CollisionEvent>,
    ) -> bool {
        false
    }

    fn notify_collision(&self, _entity: EntityIndex, _phase: CollisionPhase, _collision: Collision) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::archetype::Archetype;
    use crate::component::Component;
    use crate::observer::observer;
    use crate::storage::DenseStorage;

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
    fn test_null_ecs_reads_are_safe_defaults() {
        let ecs: Box<dyn EcsManager> = Box::new(NullEcs);
        assert_eq!(ecs.entity_count(), 0);
        assert!(!ecs.has_component(EntityIndex(0), ComponentMask::TRANSFORM));
        assert!(ecs.active_entities().is_empty());
        assert!(ecs.drawn_entities().is_empty());
        assert_eq!(ecs.archetype_id("anything"), ArchetypeId::DEFAULT);
        assert!(ecs.manager::<DenseStorage<Light>>(ComponentKind::Light).is_none());
    }

    #[test]
    fn test_null_ecs_accepts_observers_and_ticks() {
        let mut ecs = NullEcs;
        ecs.add_component_observer(ComponentEvent::Add, observer(|_: &ComponentChange| {}));
        ecs.update(0.5);
    }

    #[test]
    #[should_panic(expected = "called on NullEcs")]
    fn test_null_ecs_mutation_panics() {
        let mut ecs = NullEcs;
        ecs.add_entity(ArchetypeId::DEFAULT);
    }

    #[test]
    fn test_world_through_trait_object() {
        let mut world = World::new();
        world.register_storage::<Light>();
        let mut ecs: Box<dyn EcsManager> = Box::new(world);

        let entity = ecs.add_entity(ArchetypeId::DEFAULT);
        ecs.add_component(entity, ComponentMask::LIGHT);
        ecs.manager_mut::<DenseStorage<Light>>(ComponentKind::Light)
            .unwrap()
            .set(entity, Light { intensity: 3.0 });

        assert_eq!(
            ecs.manager::<DenseStorage<Light>>(ComponentKind::Light)
                .unwrap()
                .get(entity)
                .intensity,
            3.0
        );
        assert_eq!(ecs.entities_with_components(ComponentMask::LIGHT), vec![entity]);
    }

    #[test]
    #[should_panic(expected = "instantiate_prefab called on NullEcs")]
    fn test_null_ecs_rejects_prefabs() {
        let mut ecs = NullEcs;
        let _ = ecs.instantiate_prefab(&Prefab::default());
    }

    #[test]
    fn test_null_ecs_has_no_archetypes_to_save() {
        let mut ecs = NullEcs;
        assert_eq!(ecs.archetypes_to_json().unwrap(), json!([]));
        ecs.register_observer_trigger_enter(EntityIndex(0), observer(|_: &CollisionEvent| {}));
        ecs.notify_trigger_enter(EntityIndex(0), Collision::default());
        assert!(!ecs.remove_activation_observer(&observer(|_: &ActivationChange| {})));
    }

    #[test]
    fn test_prefab_and_collisions_through_trait_object() {
        let mut world = World::new();
        world.register_storage::<Light>();
        let mut ecs: Box<dyn EcsManager> = Box::new(world);

        let prefab = Prefab::from_json(&json!({
            "name": "lamp",
            "entities": [{"components": {"light": {"intensity": 2.0}}}],
        }))
        .unwrap();
        let created = ecs.instantiate_prefab(&prefab).unwrap();
        assert_eq!(created.len(), 1);
        let lamp = created[0];
        assert!(ecs.has_component(lamp, ComponentMask::LIGHT));

        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hits);
        let hook = observer(move |(entity, collision): &CollisionEvent| {
            sink.lock().push((*entity, collision.impulse));
        });
        ecs.register_observer_collision_enter(lamp, Arc::clone(&hook));
        ecs.notify_collision_enter(lamp, Collision {
            impulse: 4.0,
            ..Collision::default()
        });
        ecs.notify_trigger_enter(lamp, Collision::default());
        assert_eq!(*hits.lock(), vec![(lamp, 4.0)]);

        assert!(ecs.remove_collision_observer(lamp, CollisionPhase::CollisionEnter, &hook));
        ecs.notify_collision_enter(lamp, Collision::default());
        assert_eq!(hits.lock().len(), 1);
    }

    #[test]
    fn test_archetypes_through_trait_object() {
        let mut world = World::new();
        world.register_storage::<Light>();
        let id = world.add_archetype(Archetype::new("bulb").with_mask(ComponentMask::LIGHT), 2).unwrap();
        let mut ecs: Box<dyn EcsManager> = Box::new(world);

        let shift = ecs.resize_archetype(id, 5).unwrap();
        assert_eq!(shift, EntityShift::Inserted {
            at: EntityIndex(2),
            count: 3,
        });

        let saved = ecs.archetypes_to_json().unwrap();
        assert_eq!(saved[0]["size"], json!(5));
        let shifts = ecs.archetypes_from_json(&saved).unwrap();
        assert!(shifts.is_empty());
    }

    #[test]
    fn test_activation_observer_removed_through_trait_object() {
        let mut world = World::new();
        let entity = world.add_entity(ArchetypeId::DEFAULT);
        let mut ecs: Box<dyn EcsManager> = Box::new(world);

        let flips = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&flips);
        let hook = observer(move |_: &ActivationChange| *sink.lock() += 1);
        ecs.add_activation_observer(Arc::clone(&hook));
        ecs.set_active(entity, false);
        assert!(ecs.remove_activation_observer(&hook));
        ecs.set_active(entity, true);
        assert_eq!(*flips.lock(), 1);
    }
}
