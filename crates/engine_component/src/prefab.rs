//! Prefab instantiation.
//!
//! A [`Prefab`] is an authored list of entities. Entity references inside its
//! component values are prefab-local (`0` is the root, `1` the second entity,
//! and so on) and are translated to live slots while instantiating.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archetype::{Archetype, ArchetypeId};
use crate::entity::{EntityIndex, EntityRemap};
use crate::error::EcsError;
use crate::mask::{ComponentKind, ComponentMask};
use crate::world::World;

/// One entity of a prefab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrefabEntity {
    /// Archetype to instantiate. `None` means the default archetype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,
    /// Component bits added on top of the archetype mask.
    #[serde(default)]
    pub mask: ComponentMask,
    /// Component values, written over the archetype defaults.
    #[serde(default)]
    pub components: BTreeMap<ComponentKind, Value>,
}

/// An authored group of entities instantiated together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prefab {
    /// Prefab name, for diagnostics.
    pub name: String,
    /// Entities in authoring order. The first one is the root.
    pub entities: Vec<PrefabEntity>,
}

impl Prefab {
    /// Parse a prefab document.
    pub fn from_json(json: &Value) -> Result<Self, EcsError> {
        Self::deserialize(json).map_err(|err| EcsError::malformed("prefab", err.to_string()))
    }

    /// A one-entity prefab instantiating `archetype`.
    #[must_use]
    pub fn from_archetype(archetype: &Archetype) -> Self {
        Self {
            name: archetype.name.clone(),
            entities: vec![PrefabEntity {
                archetype: Some(archetype.name.clone()),
                ..PrefabEntity::default()
            }],
        }
    }
}

impl World {
    /// Instantiate every entity of `prefab`.
    ///
    /// Returns the new entities in authoring order, the root first. Init
    /// notifications fire once every entity is fully written. On error every
    /// entity created so far is released again.
    ///
    /// # Panics
    ///
    /// Panics if the prefab is empty or an archetype pool is full.
    pub fn instantiate_prefab(&mut self, prefab: &Prefab) -> Result<Vec<EntityIndex>, EcsError> {
        assert!(!prefab.entities.is_empty(), "prefab '{}' has no root entity", prefab.name);

        let mut created = Vec::with_capacity(prefab.entities.len());
        for entity in &prefab.entities {
            let archetype = entity
                .archetype
                .as_deref()
                .map_or(ArchetypeId::DEFAULT, |name| self.archetype_id(name));
            created.push(self.spawn(archetype));
        }

        let remap: EntityRemap = created
            .iter()
            .enumerate()
            .map(|(local, &live)| (EntityIndex::from(local), live))
            .collect();

        if let Err(err) = self.write_prefab(prefab, &created, &remap) {
            tracing::warn!(prefab = %prefab.name, error = %err, "prefab instantiation rolled back");
            for &entity in created.iter().rev() {
                self.release(entity);
            }
            return Err(err);
        }

        tracing::debug!(prefab = %prefab.name, root = %created[0], count = created.len(), "instantiated prefab");
        for entity in &created {
            self.notify_init(*entity);
        }
        Ok(created)
    }

    fn write_prefab(&mut self, prefab: &Prefab, created: &[EntityIndex], remap: &EntityRemap) -> Result<(), EcsError> {
        for (authored, &entity) in prefab.entities.iter().zip(created) {
            let mut mask = authored.mask.components();
            for (&kind, value) in &authored.components {
                let manager = self.require_manager_mut(kind)?;
                let value = manager.remap_json(value, remap);
                manager.set_component_from_json(entity, &value)?;
                mask |= kind.mask();
            }
            for kind in mask.kinds() {
                if !self.has_manager(kind) {
                    return Err(EcsError::MissingManager(kind));
                }
            }
            self.masks[entity.index()].insert(mask);
        }
        Ok(())
    }
}
