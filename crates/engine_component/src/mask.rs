//! Component kinds and the per-entity component mask.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Which components and entity flags an entity currently has.
    ///
    /// Component bits may only be set once the matching components manager has
    /// been resized to cover the entity. The ECS core is the only writer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ComponentMask: u32 {
        /// Local transform and hierarchy links.
        const TRANSFORM = 1 << 0;
        /// Renderable model reference.
        const MODEL = 1 << 1;
        /// Rigid body simulation state.
        const RIGIDBODY = 1 << 2;
        /// Collision volume.
        const COLLIDER = 1 << 3;
        /// Light emitter.
        const LIGHT = 1 << 4;
        /// Positional sound emitter.
        const AUDIO_SOURCE = 1 << 5;
        /// Camera.
        const CAMERA = 1 << 6;

        /// Entity is simulated.
        const IS_ACTIVE = 1 << 30;
        /// Entity is rendered.
        const IS_VISIBLE = 1 << 31;
    }
}

impl ComponentMask {
    /// Every component bit, without entity flags.
    pub const COMPONENTS: Self = Self::TRANSFORM
        .union(Self::MODEL)
        .union(Self::RIGIDBODY)
        .union(Self::COLLIDER)
        .union(Self::LIGHT)
        .union(Self::AUDIO_SOURCE)
        .union(Self::CAMERA);

    /// The entity flags, without component bits.
    pub const FLAGS: Self = Self::IS_ACTIVE.union(Self::IS_VISIBLE);

    /// Returns only the component bits of this mask.
    #[must_use]
    pub fn components(self) -> Self {
        self & Self::COMPONENTS
    }

    /// Iterate over the component kinds set in this mask, in slot order.
    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.mask()))
    }
}

impl Default for ComponentMask {
    fn default() -> Self {
        Self::empty()
    }
}

/// A component kind. Each kind owns exactly one bit of [`ComponentMask`] and
/// one slot in the world's manager table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// See [`ComponentMask::TRANSFORM`].
    Transform,
    /// See [`ComponentMask::MODEL`].
    Model,
    /// See [`ComponentMask::RIGIDBODY`].
    RigidBody,
    /// See [`ComponentMask::COLLIDER`].
    Collider,
    /// See [`ComponentMask::LIGHT`].
    Light,
    /// See [`ComponentMask::AUDIO_SOURCE`].
    AudioSource,
    /// See [`ComponentMask::CAMERA`].
    Camera,
}

impl ComponentKind {
    /// All kinds, in slot order.
    pub const ALL: [ComponentKind; 7] = [
        Self::Transform,
        Self::Model,
        Self::RigidBody,
        Self::Collider,
        Self::Light,
        Self::AudioSource,
        Self::Camera,
    ];

    /// Number of component kinds.
    pub const COUNT: usize = Self::ALL.len();

    /// The mask bit for this kind.
    #[must_use]
    pub const fn mask(self) -> ComponentMask {
        match self {
            Self::Transform => ComponentMask::TRANSFORM,
            Self::Model => ComponentMask::MODEL,
            Self::RigidBody => ComponentMask::RIGIDBODY,
            Self::Collider => ComponentMask::COLLIDER,
            Self::Light => ComponentMask::LIGHT,
            Self::AudioSource => ComponentMask::AUDIO_SOURCE,
            Self::Camera => ComponentMask::CAMERA,
        }
    }

    /// Index into per-kind tables.
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// The name used as JSON key for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Model => "model",
            Self::RigidBody => "rigid_body",
            Self::Collider => "collider",
            Self::Light => "light",
            Self::AudioSource => "audio_source",
            Self::Camera => "camera",
        }
    }

    /// Look a kind up by its JSON name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_have_distinct_bits() {
        let mut seen = ComponentMask::empty();
        for kind in ComponentKind::ALL {
            assert!(!seen.intersects(kind.mask()), "{kind} shares a bit");
            seen |= kind.mask();
        }
        assert_eq!(seen, ComponentMask::COMPONENTS);
        assert!(!seen.intersects(ComponentMask::FLAGS));
    }

    #[test]
    fn test_slot_matches_position() {
        for (i, kind) in ComponentKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.slot(), i);
        }
    }

    #[test]
    fn test_name_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ComponentKind::from_name("sprite"), None);
    }

    #[test]
    fn test_kinds_iteration_skips_flags() {
        let mask = ComponentMask::TRANSFORM | ComponentMask::LIGHT | ComponentMask::IS_ACTIVE;
        let kinds: Vec<_> = mask.kinds().collect();
        assert_eq!(kinds, vec![ComponentKind::Transform, ComponentKind::Light]);
        assert_eq!(mask.components(), ComponentMask::TRANSFORM | ComponentMask::LIGHT);
    }

    #[test]
    fn test_kind_serde_name_matches() {
        let json = serde_json::to_value(ComponentKind::AudioSource).unwrap();
        assert_eq!(json, serde_json::json!("audio_source"));
    }
}
