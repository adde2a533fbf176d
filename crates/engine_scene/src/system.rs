//! Frame phases and the [`System`] trait.
//!
//! A frame runs the same fixed sequence of phases. Each system declares the
//! phases it subscribes to and is invoked synchronously, in registration
//! order, once per subscribed phase.

use engine_component::EntityShift;

use crate::context::SceneContext;

/// One step of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FramePhase {
    Update,
    PhysicsUpdate,
    Draw,
    Culling,
    Render,
    /// Buffered structural changes are merged here.
    EndOfFrame,
}

impl FramePhase {
    /// Every phase, in the order a frame runs them.
    pub const ALL: [FramePhase; 6] = [
        Self::Update,
        Self::PhysicsUpdate,
        Self::Draw,
        Self::Culling,
        Self::Render,
        Self::EndOfFrame,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::PhysicsUpdate => "physics_update",
            Self::Draw => "draw",
            Self::Culling => "culling",
            Self::Render => "render",
            Self::EndOfFrame => "end_of_frame",
        }
    }
}

impl std::fmt::Display for FramePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of per-frame logic.
pub trait System: Send {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// The phases this system runs in.
    fn phases(&self) -> &[FramePhase];

    /// Called once when the system is added to a running scene. Observer
    /// registration belongs here.
    fn attach(&mut self, _ctx: &mut SceneContext) {}

    /// Called once when the system is removed.
    fn detach(&mut self, _ctx: &mut SceneContext) {}

    /// Run one phase.
    fn run(&mut self, phase: FramePhase, ctx: &mut SceneContext, dt: f32);

    /// Follow an archetype resize. Systems holding entity indices remap them
    /// here.
    fn apply_shift(&mut self, _shift: EntityShift) {}
}
