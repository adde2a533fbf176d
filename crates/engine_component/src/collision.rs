//! Per-entity collision and trigger notifications.
//!
//! The physics collaborator reports contacts through the `notify_*` entry
//! points; gameplay code subscribes per entity. These events never go through
//! the component-change subjects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityIndex, EntityShift};
use crate::observer::{Observer, Subject};
use crate::world::World;

/// Contact details handed to collision observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    /// The other entity involved in the contact.
    pub other: EntityIndex,
    /// World-space contact point.
    pub point: [f32; 3],
    /// Contact normal, pointing away from `other`.
    pub normal: [f32; 3],
    /// Impulse magnitude applied to resolve the contact. Zero for triggers.
    pub impulse: f32,
}

impl Default for Collision {
    fn default() -> Self {
        Self {
            other: EntityIndex::NONE,
            point: [0.0; 3],
            normal: [0.0; 3],
            impulse: 0.0,
        }
    }
}

/// Payload of every collision subject.
pub type CollisionEvent = (EntityIndex, Collision);

/// The four contact transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollisionPhase {
    /// A trigger volume started overlapping.
    TriggerEnter,
    /// A trigger volume stopped overlapping.
    TriggerExit,
    /// Two solid bodies started touching.
    CollisionEnter,
    /// Two solid bodies stopped touching.
    CollisionExit,
}

/// Registry of per-entity collision subjects.
#[derive(Debug, Default)]
pub struct CollisionEvents {
    subjects: BTreeMap<(EntityIndex, CollisionPhase), Subject<CollisionEvent>>,
}

impl CollisionEvents {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `phase` events of `entity`.
    pub fn register(&mut self, entity: EntityIndex, phase: CollisionPhase, observer: Observer<CollisionEvent>) {
        self.subjects
            .entry((entity, phase))
            .or_default()
            .add_observer(observer);
    }

    /// Unsubscribe an observer. Returns `true` if it was registered.
    pub fn unregister(&mut self, entity: EntityIndex, phase: CollisionPhase, observer: &Observer<CollisionEvent>) -> bool {
        let Some(subject) = self.subjects.get_mut(&(entity, phase)) else {
            return false;
        };
        let removed = subject.remove_observer(observer);
        if subject.is_empty() {
            self.subjects.remove(&(entity, phase));
        }
        removed
    }

    /// Deliver a contact to the observers of `entity`.
    pub fn notify(&self, entity: EntityIndex, phase: CollisionPhase, collision: Collision) {
        if let Some(subject) = self.subjects.get(&(entity, phase)) {
            subject.notify(&(entity, collision));
        }
    }

    /// Drop every observer of `entity`.
    pub fn clear_entity(&mut self, entity: EntityIndex) {
        self.subjects.retain(|(owner, _), _| *owner != entity);
    }

    /// Number of observers for `entity` and `phase`.
    #[must_use]
    pub fn observer_count(&self, entity: EntityIndex, phase: CollisionPhase) -> usize {
        self.subjects.get(&(entity, phase)).map_or(0, Subject::len)
    }

    /// Follow an archetype resize. Observers of erased slots are dropped.
    pub fn apply_shift(&mut self, shift: EntityShift) {
        if shift == EntityShift::None {
            return;
        }
        let subjects = std::mem::take(&mut self.subjects);
        self.subjects = subjects
            .into_iter()
            .filter_map(|((entity, phase), subject)| {
                shift.apply(entity).map(|moved| ((moved, phase), subject))
            })
            .collect();
    }
}

impl World {
    /// Subscribe to the `phase` contacts of `entity`.
    pub fn register_collision_observer(
        &mut self,
        entity: EntityIndex,
        phase: CollisionPhase,
        observer: Observer<CollisionEvent>,
    ) {
        self.collisions.register(entity, phase, observer);
    }

    /// Subscribe to trigger volumes starting to overlap `entity`.
    pub fn register_observer_trigger_enter(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::TriggerEnter, observer);
    }

    /// Subscribe to trigger volumes leaving `entity`.
    pub fn register_observer_trigger_exit(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::TriggerExit, observer);
    }

    /// Subscribe to solid contacts starting on `entity`.
    pub fn register_observer_collision_enter(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::CollisionEnter, observer);
    }

    /// Subscribe to solid contacts ending on `entity`.
    pub fn register_observer_collision_exit(&mut self, entity: EntityIndex, observer: Observer<CollisionEvent>) {
        self.register_collision_observer(entity, CollisionPhase::CollisionExit, observer);
    }

    /// Unsubscribe a collision observer of `entity`.
    pub fn remove_collision_observer(
        &mut self,
        entity: EntityIndex,
        phase: CollisionPhase,
        observer: &Observer<CollisionEvent>,
    ) -> bool {
        self.collisions.unregister(entity, phase, observer)
    }

    /// Physics entry point: report a `phase` contact on `entity`.
    pub fn notify_collision(&self, entity: EntityIndex, phase: CollisionPhase, collision: Collision) {
        self.collisions.notify(entity, phase, collision);
    }

    /// Physics entry point: a trigger started overlapping `entity`.
    pub fn notify_trigger_enter(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::TriggerEnter, collision);
    }

    /// Physics entry point: a trigger stopped overlapping `entity`.
    pub fn notify_trigger_exit(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::TriggerExit, collision);
    }

    /// Physics entry point: a solid contact started on `entity`.
    pub fn notify_collision_enter(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::CollisionEnter, collision);
    }

    /// Physics entry point: a solid contact ended on `entity`.
    pub fn notify_collision_exit(&self, entity: EntityIndex, collision: Collision) {
        self.notify_collision(entity, CollisionPhase::CollisionExit, collision);
    }
}
