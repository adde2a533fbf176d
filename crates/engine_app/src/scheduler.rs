//! Phase scheduler: which systems run in which phase.
//!
//! Every frame runs the phases of [`FramePhase::ALL`] in order. Within a
//! phase, systems run one after another in registration order; there is a
//! single writer at any time, so no conflict analysis is needed.

use engine_scene::FramePhase;

/// A registered system as the scheduler sees it.
#[derive(Debug, Clone)]
pub struct RegisteredSystem {
    /// The system name (e.g. `"chunks"`).
    pub name: String,
    /// The phases the system subscribed to.
    pub phases: Vec<FramePhase>,
}

/// The systems subscribed to one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSlot {
    pub phase: FramePhase,
    /// Indices into the registry, in registration order.
    pub system_indices: Vec<usize>,
}

/// Computes the per-phase execution order from a set of registered systems.
///
/// Every phase gets a slot, empty or not, so the frame loop can walk the
/// result without looking phases up. A system that lists a phase twice still
/// runs once in it.
#[must_use]
pub fn compute_phase_plan(systems: &[RegisteredSystem]) -> Vec<PhaseSlot> {
    FramePhase::ALL
        .into_iter()
        .map(|phase| PhaseSlot {
            phase,
            system_indices: systems
                .iter()
                .enumerate()
                .filter(|(_, system)| system.phases.contains(&phase))
                .map(|(idx, _)| idx)
                .collect(),
        })
        .collect()
}
