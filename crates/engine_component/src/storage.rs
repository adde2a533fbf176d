//! Per-kind component storage.
//!
//! Every component kind is owned by exactly one [`ComponentsManager`]. The
//! world holds them type-erased and drives their bookkeeping (growth, archetype
//! splices, sweeps); typed reads and writes go through the concrete manager.
//!
//! [`DenseStorage`] covers every plain-data component. Managers that keep extra
//! per-entity state (the transform hierarchy) implement the trait themselves.

use std::any::Any;

use serde_json::Value;

use crate::archetype::{Archetype, EntityPool};
use crate::component::{Component, component_from_json, component_to_json};
use crate::entity::{EntityIndex, EntityRemap};
use crate::error::EcsError;
use crate::mask::ComponentKind;

/// Contract every components manager fulfils.
///
/// Managers never touch entity masks: mask bits belong to the world.
pub trait ComponentsManager: Any + Send + Sync {
    /// The kind this manager stores.
    fn kind(&self) -> ComponentKind;

    /// Number of entity slots currently backed.
    fn len(&self) -> usize;

    /// Returns `true` if no slot is backed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow the backing arrays to `count` slots. Never shrinks.
    fn resize_entities(&mut self, count: usize);

    /// Reset the slot to the component's default value.
    fn clear_entity(&mut self, entity: EntityIndex);

    /// Initialise every slot of `pool` from the archetype default.
    fn set_with_archetype(&mut self, pool: EntityPool, archetype: &Archetype) -> Result<(), EcsError>;

    /// Splice `count` slots in before `at`, initialised from `archetype`.
    ///
    /// O(n) in the number of slots after `at`; meant for archetype authoring.
    fn insert_archetype(&mut self, at: EntityIndex, count: u32, archetype: &Archetype) -> Result<(), EcsError>;

    /// Remove the slots `[at, at + count)`, shifting later slots down.
    fn erase_entities(&mut self, at: EntityIndex, count: u32);

    /// Encode the component of `entity`.
    fn json_from_component(&self, entity: EntityIndex) -> Result<Value, EcsError>;

    /// Overwrite the component of `entity` from JSON.
    fn set_component_from_json(&mut self, entity: EntityIndex, value: &Value) -> Result<(), EcsError>;

    /// The archetype default for this kind, fully encoded.
    fn default_json(&self, archetype: &Archetype) -> Result<Value, EcsError>;

    /// Translate the entity references inside an encoded component, before
    /// it is written with [`ComponentsManager::set_component_from_json`].
    fn remap_json(&self, value: &Value, _remap: &EntityRemap) -> Value {
        value.clone()
    }

    /// Sweep hook run when the world frees `entity`.
    fn destroy_entity(&mut self, entity: EntityIndex) {
        self.clear_entity(entity);
    }

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense `Vec<T>` storage indexed by entity slot.
#[derive(Debug, Clone)]
pub struct DenseStorage<T: Component> {
    values: Vec<T>,
}

impl<T: Component> DenseStorage<T> {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Returns the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is past the backed range.
    #[must_use]
    pub fn get(&self, entity: EntityIndex) -> &T {
        self.values.get(entity.index()).unwrap_or_else(|| {
            panic!("{entity} is past the end of the {} storage ({} slots)", T::kind(), self.values.len())
        })
    }

    /// Returns a mutable reference to the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is past the backed range.
    pub fn get_mut(&mut self, entity: EntityIndex) -> &mut T {
        let len = self.values.len();
        self.values.get_mut(entity.index()).unwrap_or_else(|| {
            panic!("{entity} is past the end of the {} storage ({len} slots)", T::kind())
        })
    }

    /// Overwrite the component of `entity`.
    pub fn set(&mut self, entity: EntityIndex, value: T) {
        *self.get_mut(entity) = value;
    }

    /// Iterate over `(entity, component)` for every backed slot.
    pub fn iter(&self) -> impl Iterator<Item = (EntityIndex, &T)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, value)| (EntityIndex::from(i), value))
    }

    fn check_pool(&self, pool: EntityPool) {
        assert!(
            pool.last.index() <= self.values.len(),
            "pool [{}, {}) exceeds the {} storage ({} slots)",
            pool.first.0,
            pool.last.0,
            T::kind(),
            self.values.len()
        );
    }
}

impl<T: Component> Default for DenseStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentsManager for DenseStorage<T> {
    fn kind(&self) -> ComponentKind {
        T::kind()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn resize_entities(&mut self, count: usize) {
        if count > self.values.len() {
            self.values.resize_with(count, T::default);
        }
    }

    fn clear_entity(&mut self, entity: EntityIndex) {
        *self.get_mut(entity) = T::default();
    }

    fn set_with_archetype(&mut self, pool: EntityPool, archetype: &Archetype) -> Result<(), EcsError> {
        self.check_pool(pool);
        let value = archetype.default_value::<T>()?;
        for slot in &mut self.values[pool.first.index()..pool.last.index()] {
            *slot = value.clone();
        }
        Ok(())
    }

    fn insert_archetype(&mut self, at: EntityIndex, count: u32, archetype: &Archetype) -> Result<(), EcsError> {
        assert!(
            at.index() <= self.values.len(),
            "insert at {at} past the end of the {} storage",
            T::kind()
        );
        let value = archetype.default_value::<T>()?;
        self.values.splice(
            at.index()..at.index(),
            std::iter::repeat_n(value, count as usize),
        );
        Ok(())
    }

    fn erase_entities(&mut self, at: EntityIndex, count: u32) {
        let end = at.index() + count as usize;
        assert!(
            end <= self.values.len(),
            "erase of [{}, {end}) past the end of the {} storage",
            at.0,
            T::kind()
        );
        self.values.drain(at.index()..end);
    }

    fn json_from_component(&self, entity: EntityIndex) -> Result<Value, EcsError> {
        component_to_json(self.get(entity), entity)
    }

    fn set_component_from_json(&mut self, entity: EntityIndex, value: &Value) -> Result<(), EcsError> {
        let decoded = component_from_json::<T>(value, entity)?;
        self.set(entity, decoded);
        Ok(())
    }

    fn default_json(&self, archetype: &Archetype) -> Result<Value, EcsError> {
        component_to_json(&archetype.default_value::<T>()?, EntityIndex::NONE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
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

    fn lamp() -> Archetype {
        Archetype::new("lamp").with_component(Light { intensity: 5.0 })
    }

    #[test]
    fn test_resize_never_shrinks() {
        let mut storage = DenseStorage::<Light>::new();
        storage.resize_entities(4);
        storage.resize_entities(2);
        assert_eq!(storage.len(), 4);
        assert_eq!(*storage.get(EntityIndex(3)), Light::default());
    }

    #[test]
    fn test_set_with_archetype_fills_pool_only() {
        let mut storage = DenseStorage::<Light>::new();
        storage.resize_entities(6);
        storage
            .set_with_archetype(EntityPool::new(EntityIndex(2), 3), &lamp())
            .unwrap();
        let values: Vec<f32> = storage.iter().map(|(_, light)| light.intensity).collect();
        assert_eq!(values, vec![0.0, 0.0, 5.0, 5.0, 5.0, 0.0]);
    }

    #[test]
    fn test_insert_and_erase_splice() {
        let mut storage = DenseStorage::<Light>::new();
        storage.resize_entities(3);
        storage.set(EntityIndex(2), Light { intensity: 9.0 });

        storage.insert_archetype(EntityIndex(1), 2, &lamp()).unwrap();
        assert_eq!(storage.len(), 5);
        assert_eq!(storage.get(EntityIndex(1)).intensity, 5.0);
        assert_eq!(storage.get(EntityIndex(4)).intensity, 9.0);

        storage.erase_entities(EntityIndex(1), 2);
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.get(EntityIndex(2)).intensity, 9.0);
    }

    #[test]
    fn test_json_round_trip_leaves_value_unchanged() {
        let mut storage = DenseStorage::<Light>::new();
        storage.resize_entities(1);
        storage.set(EntityIndex(0), Light { intensity: 1.25 });
        let json = storage.json_from_component(EntityIndex(0)).unwrap();
        storage.set_component_from_json(EntityIndex(0), &json).unwrap();
        assert_eq!(*storage.get(EntityIndex(0)), Light { intensity: 1.25 });
    }

    #[test]
    fn test_bad_json_is_an_error_not_a_write() {
        let mut storage = DenseStorage::<Light>::new();
        storage.resize_entities(1);
        storage.set(EntityIndex(0), Light { intensity: 2.0 });
        assert!(
            storage
                .set_component_from_json(EntityIndex(0), &json!({"intensity": []}))
                .is_err()
        );
        assert_eq!(storage.get(EntityIndex(0)).intensity, 2.0);
    }

    #[test]
    fn test_default_json_uses_archetype() {
        let storage = DenseStorage::<Light>::new();
        assert_eq!(storage.default_json(&lamp()).unwrap(), json!({"intensity": 5.0}));
        assert_eq!(
            storage.default_json(&Archetype::new("empty")).unwrap(),
            json!({"intensity": 0.0})
        );
    }

    #[test]
    #[should_panic(expected = "past the end")]
    fn test_get_past_end_panics() {
        let storage = DenseStorage::<Light>::new();
        let _ = storage.get(EntityIndex(0));
    }

    #[test]
    fn test_downcast_through_trait_object() {
        let boxed: Box<dyn ComponentsManager> = Box::new(DenseStorage::<Light>::new());
        assert_eq!(boxed.kind(), ComponentKind::Light);
        assert!(boxed.as_any().downcast_ref::<DenseStorage<Light>>().is_some());
    }
}
