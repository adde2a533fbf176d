//! Core [`Component`] trait and JSON value helpers.
//!
//! Every plain-data component stored in the ECS implements [`Component`]. The
//! trait ties the Rust type to its [`ComponentKind`], which in turn decides
//! the mask bit and the manager slot.
//!
//! Components travel to the serialisation collaborator as JSON objects. The
//! helpers at the bottom of this module compute and apply field-level
//! overrides against an archetype default, so scene files only store what an
//! entity changed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::entity::EntityIndex;
use crate::error::EcsError;
use crate::mask::{ComponentKind, ComponentMask};

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use engine_component::{Component, ComponentKind};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Light {
///     intensity: f32,
/// }
///
/// impl Component for Light {
///     fn kind() -> ComponentKind { ComponentKind::Light }
/// }
/// ```
pub trait Component: Clone + Default + Send + Sync + 'static + Serialize + DeserializeOwned {
    /// The kind this component is stored under.
    fn kind() -> ComponentKind;

    /// A human-readable name for this component type.
    fn type_name() -> &'static str {
        Self::kind().name()
    }

    /// The mask bit for this component.
    fn mask() -> ComponentMask {
        Self::kind().mask()
    }
}

/// Payload of the structural-change subjects: which entity, and exactly which
/// bits were added, removed or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentChange {
    /// The entity whose components changed.
    pub entity: EntityIndex,
    /// The bits that changed, never the whole mask.
    pub mask: ComponentMask,
}

/// Encode a component value to JSON.
pub fn component_to_json<T: Component>(value: &T, entity: EntityIndex) -> Result<Value, EcsError> {
    serde_json::to_value(value).map_err(|source| EcsError::Encode {
        kind: T::kind(),
        entity,
        source,
    })
}

/// Decode a component value from JSON.
pub fn component_from_json<T: Component>(value: &Value, entity: EntityIndex) -> Result<T, EcsError> {
    T::deserialize(value).map_err(|source| EcsError::Decode {
        kind: T::kind(),
        entity,
        source,
    })
}

/// Returns the parts of `value` that differ from `default`.
///
/// Objects are compared key by key (recursively); any other value is kept
/// whole when it differs. `None` means "identical to the default".
#[must_use]
pub fn diff_json(default: &Value, value: &Value) -> Option<Value> {
    match (default, value) {
        (Value::Object(base), Value::Object(current)) => {
            let mut changed = Map::new();
            for (key, field) in current {
                match base.get(key) {
                    Some(base_field) => {
                        if let Some(diff) = diff_json(base_field, field) {
                            changed.insert(key.clone(), diff);
                        }
                    }
                    None => {
                        changed.insert(key.clone(), field.clone());
                    }
                }
            }
            (!changed.is_empty()).then_some(Value::Object(changed))
        }
        _ if default == value => None,
        _ => Some(value.clone()),
    }
}

/// Apply `overrides` on top of `base`, recursing into objects.
#[must_use]
pub fn merge_json(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            let mut merged = base.clone();
            for (key, field) in overrides {
                let next = match merged.get(key) {
                    Some(existing) => merge_json(existing, field),
                    None => field.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => overrides.clone(),
    }
}
