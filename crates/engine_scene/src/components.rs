//! Plain-data gameplay components and manager registration.
//!
//! These types carry only what the simulation core needs to store and
//! serialise them. Rendering, audio and physics back-ends read them; nothing
//! here drives those back-ends.

use engine_component::{Component, ComponentKind, World};
use engine_math::Aabb;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::hierarchy::TransformManager;

/// Renderable model reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    /// Mesh asset name.
    pub mesh: String,
    /// Material asset name.
    pub material: String,
}

impl Component for Model {
    fn kind() -> ComponentKind {
        ComponentKind::Model
    }
}

/// Collision volume, as a box in the entity's local space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collider {
    /// Box center relative to the entity origin.
    pub center: Vec3,
    /// Box half-extents before scaling.
    pub half_extents: Vec3,
    /// Triggers report overlaps without a physical response.
    pub is_trigger: bool,
}

impl Collider {
    /// A solid box collider.
    #[must_use]
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
            is_trigger: false,
        }
    }

    /// Mark the collider as a trigger.
    #[must_use]
    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// The collider box in local space.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.center, self.half_extents)
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::splat(0.5))
    }
}

impl Component for Collider {
    fn kind() -> ComponentKind {
        ComponentKind::Collider
    }
}

/// Rigid body simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBody {
    pub mass: f32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Kinematic bodies are moved by gameplay code, not by forces.
    pub is_kinematic: bool,
    pub use_gravity: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            is_kinematic: false,
            use_gravity: true,
        }
    }
}

impl Component for RigidBody {
    fn kind() -> ComponentKind {
        ComponentKind::RigidBody
    }
}

/// Light emitter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    #[default]
    Point,
    Spot,
    Directional,
}

/// Light emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub kind: LightKind,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    /// Falloff distance; ignored for directional lights.
    pub range: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
        }
    }
}

impl Component for Light {
    fn kind() -> ComponentKind {
        ComponentKind::Light
    }
}

/// Positional sound emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSource {
    pub clip: String,
    pub volume: f32,
    pub looping: bool,
    pub play_on_init: bool,
}

impl Default for AudioSource {
    fn default() -> Self {
        Self {
            clip: String::new(),
            volume: 1.0,
            looping: false,
            play_on_init: false,
        }
    }
}

impl Component for AudioSource {
    fn kind() -> ComponentKind {
        ComponentKind::AudioSource
    }
}

/// Camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Component for Camera {
    fn kind() -> ComponentKind {
        ComponentKind::Camera
    }
}

/// Install a manager for every component kind: the hierarchy-aware
/// [`TransformManager`] and dense storage for the rest.
pub fn register_scene_managers(world: &mut World) {
    world.register_manager(Box::new(TransformManager::new()));
    world.register_storage::<Model>();
    world.register_storage::<RigidBody>();
    world.register_storage::<Collider>();
    world.register_storage::<Light>();
    world.register_storage::<AudioSource>();
    world.register_storage::<Camera>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_component::{Archetype, ArchetypeId, ComponentMask};
    use engine_math::Transform;

    #[test]
    fn test_every_kind_has_a_manager() {
        let mut world = World::new();
        register_scene_managers(&mut world);
        for kind in ComponentKind::ALL {
            assert!(world.has_manager(kind), "missing {kind}");
        }
    }

    #[test]
    fn test_archetype_defaults_reach_storage() {
        let mut world = World::new();
        register_scene_managers(&mut world);
        let lamp = world
            .add_archetype(
                Archetype::new("lamp")
                    .with_component(Transform::from_position(Vec3::Y))
                    .with_component(Light {
                        intensity: 4.0,
                        ..Light::default()
                    }),
                2,
            )
            .unwrap();
        let entity = world.add_entity(lamp);

        assert!(world.has_component(entity, ComponentMask::LIGHT | ComponentMask::TRANSFORM));
        assert_eq!(world.component::<Light>(entity).intensity, 4.0);
        let transforms = world
            .manager::<TransformManager>(ComponentKind::Transform)
            .unwrap();
        assert_eq!(transforms.transform(entity).position, Vec3::Y);
        assert_ne!(lamp, ArchetypeId::DEFAULT);
    }

    #[test]
    fn test_collider_bounds_and_partial_json() {
        let collider: Collider = serde_json::from_value(serde_json::json!({"is_trigger": true})).unwrap();
        assert!(collider.is_trigger);
        assert_eq!(collider.bounds().half_extents, Vec3::splat(0.5));
    }
}
