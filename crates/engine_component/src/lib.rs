//! # engine_component
//!
//! The entity/component core of the engine: what a component is, where it is
//! stored, how entities are allocated from archetype pools, and how every
//! structural change is announced.
//!
//! This crate provides:
//!
//! - [`Subject`] / [`Observer`]: synchronous one-to-many notification.
//! - [`Component`] trait: the contract all ECS data must satisfy.
//! - [`ComponentsManager`]: per-kind storage contract, with [`DenseStorage`]
//!   for plain-data components.
//! - [`Archetype`] / [`ArchetypeArena`]: named templates bound to contiguous
//!   entity pools.
//! - [`World`]: masks, lifecycle, archetype authoring, prefabs and the
//!   structural-change subjects.
//! - [`EcsManager`]: the object-safe interface systems are written against,
//!   with [`NullEcs`] for headless use.

pub mod archetype;
pub mod archetype_registry;
pub mod collision;
pub mod component;
pub mod entity;
pub mod error;
pub mod manager;
pub mod mask;
pub mod observer;
pub mod prefab;
pub mod storage;
pub mod world;

pub use archetype::{Archetype, ArchetypeArena, ArchetypeId, EntityPool};
pub use collision::{Collision, CollisionEvent, CollisionEvents, CollisionPhase};
pub use component::{Component, ComponentChange, component_from_json, component_to_json, diff_json, merge_json};
pub use entity::{EntityIndex, EntityRemap, EntityShift, EntityState};
pub use error::EcsError;
pub use manager::{EcsManager, NullEcs};
pub use mask::{ComponentKind, ComponentMask};
pub use observer::{Observer, Subject, observer};
pub use prefab::{Prefab, PrefabEntity};
pub use storage::{ComponentsManager, DenseStorage};
pub use world::{ActivationChange, ComponentEvent, LifecycleEvent, World};
