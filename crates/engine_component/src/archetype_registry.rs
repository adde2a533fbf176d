//! Archetype authoring on top of the [`World`].
//!
//! Registering or resizing an archetype splices every component array, every
//! later pool and every default entity past the pools. Returned
//! [`EntityShift`]s tell outside holders of entity indices how to follow.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::archetype::{Archetype, ArchetypeId, EntityPool};
use crate::component::{diff_json, merge_json};
use crate::entity::{EntityIndex, EntityShift};
use crate::error::EcsError;
use crate::mask::{ComponentKind, ComponentMask};
use crate::world::World;

/// Per-entity key carrying component bits that differ from the archetype.
const MASK_KEY: &str = "mask";

/// One entry of the archetype JSON list.
#[derive(Debug, Deserialize)]
struct ArchetypeDocument {
    archetype: ArchetypeTemplate,
    size: u32,
    name: String,
    #[serde(default)]
    entities: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ArchetypeTemplate {
    mask: ComponentMask,
    #[serde(default)]
    components: BTreeMap<ComponentKind, Value>,
}

impl World {
    /// Register `archetype` with a pool of `size` slots placed after every
    /// existing pool. The pool is initialised from the archetype defaults.
    ///
    /// Default entities already living past the pools move up by `size`.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken or a component kind has no manager.
    pub fn add_archetype(&mut self, archetype: Archetype, size: u32) -> Result<ArchetypeId, EcsError> {
        assert!(
            self.find_archetype(&archetype.name).is_none(),
            "archetype '{}' is already registered",
            archetype.name
        );
        self.check_archetype(&archetype)?;

        let at = self.arena.end();
        for manager in self.managers.iter_mut().flatten() {
            manager.insert_archetype(at, size, &archetype)?;
        }
        self.insert_slots(at, size);
        let (id, pool) = self.arena.reserve(size);

        if at.index() + (size as usize) < self.masks.len() {
            tracing::warn!(
                archetype = %archetype.name,
                size,
                "archetype registered after default entities; their indices moved"
            );
        }
        self.shift_references(EntityShift::Inserted { at, count: size });

        tracing::debug!(
            archetype = %archetype.name,
            %id,
            first = pool.first.0,
            last = pool.last.0,
            "registered archetype"
        );
        self.archetypes.push(archetype);
        Ok(id)
    }

    /// Replace the template of `id` and re-apply its defaults to every slot
    /// of the pool. Live members keep their entity flags.
    ///
    /// # Panics
    ///
    /// Panics for the default archetype, an unknown id, or a name clash.
    pub fn update_archetype(&mut self, id: ArchetypeId, archetype: Archetype) -> Result<(), EcsError> {
        assert!(id != ArchetypeId::DEFAULT, "the default archetype cannot be updated");
        let pool = self
            .arena
            .pool(id)
            .unwrap_or_else(|| panic!("update of unknown {id}"));
        if let Some(other) = self.find_archetype(&archetype.name) {
            assert!(other == id, "archetype '{}' is already registered", archetype.name);
        }
        self.check_archetype(&archetype)?;

        for manager in self.managers.iter_mut().flatten() {
            manager.set_with_archetype(pool, &archetype)?;
        }
        let components = archetype.mask.components();
        for entity in pool.iter() {
            if self.states[entity.index()].is_alive() {
                let mask = &mut self.masks[entity.index()];
                *mask = components | mask.intersection(ComponentMask::FLAGS);
            }
        }

        tracing::debug!(archetype = %archetype.name, %id, "updated archetype");
        self.archetypes[id.index()] = archetype;
        Ok(())
    }

    /// Grow or shrink the pool of `id` to `size` slots.
    ///
    /// O(n) in the number of slots after the pool: every manager is spliced
    /// and every later pool moves.
    ///
    /// # Panics
    ///
    /// Panics for the default archetype, an unknown id, or when shrinking
    /// would drop a live member.
    pub fn resize_archetype(&mut self, id: ArchetypeId, size: u32) -> Result<EntityShift, EcsError> {
        let pool = self
            .arena
            .pool(id)
            .unwrap_or_else(|| panic!("resize of unknown {id}"));
        let name = &self.archetypes[id.index()].name;
        if (size as usize) < pool.len() {
            let dropped = EntityPool {
                first: EntityIndex(pool.first.0 + size),
                last: pool.last,
            };
            if let Some(live) = dropped.iter().find(|e| self.states[e.index()].is_alive()) {
                panic!(
                    "cannot shrink archetype '{name}' to {size} slots: {live} is still alive"
                );
            }
        }

        let shift = self.arena.resize(id, size);
        match shift {
            EntityShift::Inserted { at, count } => {
                let template = &self.archetypes[id.index()];
                for manager in self.managers.iter_mut().flatten() {
                    manager.insert_archetype(at, count, template)?;
                }
                self.insert_slots(at, count);
            }
            EntityShift::Erased { at, count } => {
                for manager in self.managers.iter_mut().flatten() {
                    manager.erase_entities(at, count);
                }
                self.erase_slots(at, count);
            }
            EntityShift::None => {}
        }
        self.shift_references(shift);

        tracing::debug!(
            archetype = %self.archetypes[id.index()].name,
            from = pool.len(),
            to = size,
            ?shift,
            "resized archetype"
        );
        Ok(shift)
    }

    fn check_archetype(&self, archetype: &Archetype) -> Result<(), EcsError> {
        for kind in archetype.mask.kinds() {
            assert!(
                self.has_manager(kind),
                "archetype '{}' uses {kind} but no {kind} manager is registered",
                archetype.name
            );
        }
        for manager in self.managers.iter().flatten() {
            manager.default_json(archetype)?;
        }
        Ok(())
    }

    /// Exact name lookup.
    #[must_use]
    pub fn find_archetype(&self, name: &str) -> Option<ArchetypeId> {
        self.archetypes
            .iter()
            .position(|archetype| archetype.name == name)
            .map(|i| ArchetypeId(i as u32))
    }

    /// Name lookup falling back to [`ArchetypeId::DEFAULT`] with a warning.
    #[must_use]
    pub fn archetype_id(&self, name: &str) -> ArchetypeId {
        self.find_archetype(name).unwrap_or_else(|| {
            tracing::warn!(archetype = name, "unknown archetype, using the default one");
            ArchetypeId::DEFAULT
        })
    }

    /// The template registered under `id`.
    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// The pool reserved for `id`.
    #[must_use]
    pub fn archetype_pool(&self, id: ArchetypeId) -> Option<EntityPool> {
        self.arena.pool(id)
    }

    /// The archetype owning the slot of `entity`.
    #[must_use]
    pub fn archetype_of(&self, entity: EntityIndex) -> ArchetypeId {
        self.arena.owner_of(entity)
    }

    /// Number of registered archetypes, the default one included.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Encode every non-default archetype with its pool.
    ///
    /// Each pool slot is written as an object holding, per component kind the
    /// slot owns, only the fields that differ from the archetype default. A
    /// live member whose component bits differ from the archetype also gets a
    /// `"mask"` entry.
    pub fn archetypes_to_json(&self) -> Result<Value, EcsError> {
        let mut documents = Vec::with_capacity(self.archetypes.len().saturating_sub(1));
        for (id, pool) in self.arena.iter().skip(1) {
            let archetype = &self.archetypes[id.index()];
            let template = archetype.mask.components();

            let mut defaults = BTreeMap::new();
            let mut entities = Vec::with_capacity(pool.len());
            for entity in pool.iter() {
                let mut overrides = Map::new();
                let owned = if self.states[entity.index()].is_alive() {
                    self.masks[entity.index()].components()
                } else {
                    template
                };
                if owned != template {
                    overrides.insert(MASK_KEY.to_owned(), json!(owned));
                }
                for kind in owned.kinds() {
                    let manager = self.manager_dyn(kind).ok_or(EcsError::MissingManager(kind))?;
                    let default = match defaults.entry(kind) {
                        Entry::Occupied(slot) => slot.into_mut(),
                        Entry::Vacant(slot) => slot.insert(manager.default_json(archetype)?),
                    };
                    let value = manager.json_from_component(entity)?;
                    if let Some(diff) = diff_json(default, &value) {
                        overrides.insert(kind.name().to_owned(), diff);
                    }
                }
                entities.push(Value::Object(overrides));
            }

            documents.push(json!({
                "archetype": {
                    "mask": archetype.mask,
                    "components": archetype.components,
                },
                "size": pool.len(),
                "name": archetype.name,
                "entities": entities,
            }));
        }
        Ok(Value::Array(documents))
    }

    /// Recreate archetypes from [`World::archetypes_to_json`] output.
    ///
    /// Known names are updated and resized in place, unknown ones registered.
    /// Every listed slot gets its mask override applied and its component
    /// overrides merged on top of the default.
    /// Returns the index shifts produced along the way, in order.
    pub fn archetypes_from_json(&mut self, json: &Value) -> Result<Vec<EntityShift>, EcsError> {
        let Value::Array(items) = json else {
            return Err(EcsError::malformed("archetype list", "expected a JSON array"));
        };

        let mut shifts = Vec::new();
        for item in items {
            let document: ArchetypeDocument = serde_json::from_value(item.clone())
                .map_err(|err| EcsError::malformed("archetype", err.to_string()))?;
            if document.entities.len() > document.size as usize {
                return Err(EcsError::malformed(
                    "archetype",
                    format!(
                        "'{}' lists {} entities for a pool of {}",
                        document.name,
                        document.entities.len(),
                        document.size
                    ),
                ));
            }

            let archetype = Archetype {
                name: document.name,
                mask: document.archetype.mask,
                components: document.archetype.components,
            };
            let id = match self.find_archetype(&archetype.name) {
                Some(id) => {
                    self.update_archetype(id, archetype)?;
                    let shift = self.resize_archetype(id, document.size)?;
                    if shift != EntityShift::None {
                        shifts.push(shift);
                    }
                    id
                }
                None => {
                    let at = self.arena.end();
                    let id = self.add_archetype(archetype, document.size)?;
                    if document.size > 0 {
                        shifts.push(EntityShift::Inserted {
                            at,
                            count: document.size,
                        });
                    }
                    id
                }
            };

            let pool = self
                .arena
                .pool(id)
                .ok_or_else(|| EcsError::malformed("archetype", "pool vanished while loading"))?;
            for (entity, overrides) in pool.iter().zip(&document.entities) {
                if let Some(mask) = overrides.get(MASK_KEY) {
                    let mask: ComponentMask = serde_json::from_value(mask.clone())
                        .map_err(|err| EcsError::malformed("entity mask", err.to_string()))?;
                    if let Some(kind) = mask.kinds().find(|&kind| !self.has_manager(kind)) {
                        return Err(EcsError::MissingManager(kind));
                    }
                    let slot = &mut self.masks[entity.index()];
                    *slot = mask.components() | slot.intersection(ComponentMask::FLAGS);
                }
                for (key, value) in overrides.iter().filter(|(key, _)| key.as_str() != MASK_KEY) {
                    let kind = ComponentKind::from_name(key)
                        .ok_or_else(|| EcsError::UnknownComponent(key.clone()))?;
                    let manager = self.require_manager_mut(kind)?;
                    let base = manager.json_from_component(entity)?;
                    manager.set_component_from_json(entity, &merge_json(&base, value))?;
                }
            }
        }
        Ok(shifts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde::Serialize;
    use serde_json::json;

    use super::*;
    use crate::component::Component;
    use crate::entity::EntityState;
    use crate::observer::observer;
    use crate::world::ActivationChange;

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    struct Light {
        intensity: f32,
        range: f32,
    }

    impl Component for Light {
        fn kind() -> ComponentKind {
            ComponentKind::Light
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    struct Model {
        mesh: String,
    }

    impl Component for Model {
        fn kind() -> ComponentKind {
            ComponentKind::Model
        }
    }

    fn world() -> World {
        let mut world = World::new();
        world.register_storage::<Light>();
        world
    }

    fn debris() -> Archetype {
        Archetype::new("debris").with_component(Light {
            intensity: 1.0,
            range: 2.0,
        })
    }

    #[test]
    fn test_pool_of_fifty_accepts_exactly_fifty() {
        let mut world = world();
        let id = world.add_archetype(debris(), 50).unwrap();
        let pool = world.archetype_pool(id).unwrap();
        for _ in 0..50 {
            let entity = world.add_entity(id);
            assert!(pool.contains(entity));
        }
        assert_eq!(world.entities_with_components(ComponentMask::LIGHT).len(), 50);
    }

    #[test]
    #[should_panic(expected = "no free slot")]
    fn test_fifty_first_debris_panics() {
        let mut world = world();
        let id = world.add_archetype(debris(), 50).unwrap();
        for _ in 0..51 {
            world.add_entity(id);
        }
    }

    #[test]
    fn test_pooled_entities_start_from_defaults() {
        let mut world = world();
        let id = world.add_archetype(debris(), 4).unwrap();
        let entity = world.add_entity(id);
        assert_eq!(world.component::<Light>(entity).range, 2.0);
        assert!(world.is_active(entity));
        assert_eq!(world.archetype_of(entity), id);
    }

    #[test]
    fn test_pooled_destroy_deactivates_in_place() {
        let mut world = world();
        let id = world.add_archetype(debris(), 2).unwrap();
        let entity = world.add_entity(id);
        world.set_component(entity, Light {
            intensity: 9.0,
            range: 9.0,
        });

        world.destroy_entity(entity, 0.0);
        assert_eq!(world.entity_state(entity), EntityState::Destroyed);
        assert!(world.has_component(entity, ComponentMask::LIGHT));
        assert!(!world.mask(entity).intersects(ComponentMask::FLAGS));

        let again = world.add_entity(id);
        assert_eq!(again, entity);
        assert_eq!(world.component::<Light>(again).intensity, 1.0);
    }

    #[test]
    fn test_pooled_destroy_fires_deactivation() {
        let mut world = world();
        let id = world.add_archetype(debris(), 2).unwrap();
        let entity = world.add_entity(id);
        assert!(world.is_active(entity));

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        world.add_activation_observer(observer(move |change: &ActivationChange| {
            sink.lock().push((change.entity, change.active));
        }));

        world.destroy_entity(entity, 0.0);
        assert_eq!(*log.lock(), vec![(entity, false)]);
        assert_eq!(world.entity_state(entity), EntityState::Destroyed);
    }

    #[test]
    #[should_panic(expected = "pooled entities are deactivated")]
    fn test_free_entity_rejects_pool_member() {
        let mut world = world();
        let id = world.add_archetype(debris(), 2).unwrap();
        let entity = world.add_entity(id);
        world.free_entity(entity);
    }

    #[test]
    fn test_pools_follow_registration_order() {
        let mut world = world();
        let a = world.add_archetype(Archetype::new("a"), 3).unwrap();
        let b = world.add_archetype(Archetype::new("b"), 2).unwrap();
        assert_eq!(world.archetype_pool(a).unwrap(), EntityPool::new(EntityIndex(1), 3));
        assert_eq!(world.archetype_pool(b).unwrap(), EntityPool::new(EntityIndex(4), 2));
        assert_eq!(world.entity_count(), 6);
    }

    #[test]
    fn test_resize_keeps_masks_and_values_of_shifted_entities() {
        let mut world = world();
        let a = world.add_archetype(debris(), 2).unwrap();
        let b = world.add_archetype(Archetype::new("b").with_mask(ComponentMask::LIGHT), 2).unwrap();
        let member = world.add_entity(b);
        world.set_component(member, Light {
            intensity: 7.0,
            range: 0.0,
        });
        let free = world.add_entity(ArchetypeId::DEFAULT);
        world.add_component(free, ComponentMask::LIGHT);

        let shift = world.resize_archetype(a, 5).unwrap();
        let member = shift.apply(member).unwrap();
        let free = shift.apply(free).unwrap();

        assert_eq!(member, EntityIndex(6));
        assert_eq!(world.archetype_of(member), b);
        assert_eq!(world.component::<Light>(member).intensity, 7.0);
        assert!(world.has_component(free, ComponentMask::LIGHT));
        assert!(world.is_alive(free));

        let shift = world.resize_archetype(a, 1).unwrap();
        let member = shift.apply(member).unwrap();
        assert_eq!(member, EntityIndex(2));
        assert_eq!(world.component::<Light>(member).intensity, 7.0);
        assert!(world.has_component(shift.apply(free).unwrap(), ComponentMask::LIGHT));
    }

    #[test]
    fn test_grown_slots_start_unallocated() {
        let mut world = world();
        let a = world.add_archetype(debris(), 1).unwrap();
        world.add_entity(a);
        world.resize_archetype(a, 3).unwrap();
        let second = world.add_entity(a);
        assert_eq!(second, EntityIndex(2));
        assert_eq!(world.component::<Light>(second).range, 2.0);
    }

    #[test]
    #[should_panic(expected = "is still alive")]
    fn test_shrink_below_occupancy_panics() {
        let mut world = world();
        let a = world.add_archetype(debris(), 3).unwrap();
        for _ in 0..3 {
            world.add_entity(a);
        }
        let _ = world.resize_archetype(a, 2);
    }

    #[test]
    fn test_unknown_name_returns_default() {
        let mut world = world();
        world.add_archetype(debris(), 1).unwrap();
        assert_eq!(world.archetype_id("debris"), ArchetypeId(1));
        assert_eq!(world.archetype_id("missing"), ArchetypeId::DEFAULT);
    }

    #[test]
    fn test_update_archetype_reapplies_defaults() {
        let mut world = world();
        let id = world.add_archetype(debris(), 2).unwrap();
        let entity = world.add_entity(id);
        world.set_active(entity, false);

        let replacement = Archetype::new("debris").with_component(Light {
            intensity: 3.0,
            range: 3.0,
        });
        world.update_archetype(id, replacement).unwrap();

        assert_eq!(world.component::<Light>(entity).intensity, 3.0);
        assert!(!world.is_active(entity));
    }

    #[test]
    fn test_bad_default_rejected_at_registration() {
        let mut world = world();
        let mut archetype = Archetype::new("broken").with_mask(ComponentMask::LIGHT);
        archetype
            .components
            .insert(ComponentKind::Light, json!({"intensity": "bright"}));
        assert!(world.add_archetype(archetype, 4).is_err());
        assert_eq!(world.archetype_count(), 1);
    }

    #[test]
    fn test_json_writes_only_overrides() {
        let mut world = world();
        let id = world.add_archetype(debris(), 2).unwrap();
        let entity = world.add_entity(id);
        world.set_component(entity, Light {
            intensity: 5.0,
            range: 2.0,
        });

        let json = world.archetypes_to_json().unwrap();
        assert_eq!(json[0]["name"], json!("debris"));
        assert_eq!(json[0]["size"], json!(2));
        assert_eq!(json[0]["entities"][0], json!({"light": {"intensity": 5.0}}));
        assert_eq!(json[0]["entities"][1], json!({}));
    }

    #[test]
    fn test_json_reload_restores_overrides() {
        let mut source = world();
        let id = source.add_archetype(debris(), 2).unwrap();
        let entity = source.add_entity(id);
        source.set_component(entity, Light {
            intensity: 5.0,
            range: 2.0,
        });
        let json = source.archetypes_to_json().unwrap();

        let mut target = world();
        let shifts = target.archetypes_from_json(&json).unwrap();
        assert_eq!(shifts.len(), 1);
        let id = target.archetype_id("debris");
        let pool = target.archetype_pool(id).unwrap();
        let light = target
            .storage::<Light>()
            .unwrap()
            .get(pool.first)
            .clone();
        assert_eq!(
            light,
            Light {
                intensity: 5.0,
                range: 2.0
            }
        );
    }

    #[test]
    fn test_json_rejects_unknown_component() {
        let mut world = world();
        let json = json!([{
            "archetype": {"mask": ComponentMask::empty(), "components": {}},
            "size": 1,
            "name": "odd",
            "entities": [{"sprite": {}}],
        }]);
        let err = world.archetypes_from_json(&json).unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent(name) if name == "sprite"));
    }

    #[test]
    fn test_json_round_trips_member_masks() {
        let mut source = world();
        source.register_storage::<Model>();
        let id = source.add_archetype(debris(), 3).unwrap();
        let dressed = source.add_entity(id);
        let stripped = source.add_entity(id);
        source.add_component(dressed, ComponentMask::MODEL);
        source.set_component(dressed, Model {
            mesh: "rock".to_owned(),
        });
        source.remove_component(stripped, ComponentMask::LIGHT);

        let json = source.archetypes_to_json().unwrap();
        let entities = &json[0]["entities"];
        assert_eq!(
            entities[0]["mask"],
            json!(ComponentMask::LIGHT | ComponentMask::MODEL)
        );
        assert_eq!(entities[0]["model"], json!({"mesh": "rock"}));
        assert_eq!(entities[1]["mask"], json!(ComponentMask::empty()));
        assert!(entities[1].get("light").is_none());
        assert_eq!(entities[2], json!({}));

        let mut target = world();
        target.register_storage::<Model>();
        target.archetypes_from_json(&json).unwrap();
        let pool = target.archetype_pool(target.archetype_id("debris")).unwrap();
        let first = pool.first;
        let second = EntityIndex(first.0 + 1);
        assert_eq!(
            target.mask(first).components(),
            ComponentMask::LIGHT | ComponentMask::MODEL
        );
        assert_eq!(target.storage::<Model>().unwrap().get(first).mesh, "rock");
        assert!(target.mask(second).components().is_empty());
    }

    #[test]
    fn test_json_mask_needs_backing_manager() {
        let mut source = world();
        source.register_storage::<Model>();
        let id = source.add_archetype(debris(), 1).unwrap();
        let entity = source.add_entity(id);
        source.add_component(entity, ComponentMask::MODEL);
        let json = source.archetypes_to_json().unwrap();

        let err = world().archetypes_from_json(&json).unwrap_err();
        assert!(matches!(err, EcsError::MissingManager(ComponentKind::Model)));
    }
}
