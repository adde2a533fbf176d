//! # engine_math
//!
//! Math types for the engine. Re-exports [`glam`] for linear algebra and
//! defines the spatial types the simulation core needs: the local
//! [`Transform`] component and the [`Aabb`] used for chunk classification.

pub mod aabb;
pub mod transform;

// Re-export glam types for convenience.
pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec3, Vec4};

pub use aabb::Aabb;
pub use transform::Transform;
