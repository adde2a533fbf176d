//! # engine_scene
//!
//! Scene-level layer on top of the ECS core:
//!
//! - [`components`]: the gameplay component types and
//!   [`register_scene_managers`].
//! - [`TransformManager`]: the parent/child hierarchy with lazily cached
//!   world matrices.
//! - [`ChunkManager`] / [`ChunkSystem`]: spatial chunks and the per-frame
//!   driver that maps chunk status onto entity active/visible flags.
//! - [`FramePhase`] / [`System`] / [`SceneContext`]: what a system is and
//!   what it is handed every phase.

pub mod chunk;
pub mod chunk_manager;
pub mod chunk_system;
pub mod components;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod system;

pub use chunk::{Chunk, ChunkData, ChunkIndex, ChunkSet, ChunkStatus};
pub use chunk_manager::ChunkManager;
pub use chunk_system::ChunkSystem;
pub use components::{AudioSource, Camera, Collider, Light, LightKind, Model, RigidBody, register_scene_managers};
pub use context::SceneContext;
pub use error::SceneError;
pub use hierarchy::{DirtyState, ParentError, TransformManager};
pub use system::{FramePhase, System};
