//! System registry: owns the registered systems in registration order.
//!
//! Registration order is execution order within a phase, so systems are kept
//! in a `Vec` and looked up by name only for removal.

use engine_scene::{FramePhase, System};

/// Registry of all systems known to the frame loop.
#[derive(Default)]
pub struct SystemRegistry {
    systems: Vec<Box<dyn System>>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { systems: Vec::new() }
    }

    /// Append a system.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn register(&mut self, system: Box<dyn System>) -> &mut dyn System {
        assert!(
            self.get(system.name()).is_none(),
            "a system named '{}' is already registered",
            system.name()
        );
        self.systems.push(system);
        let last = self.systems.len() - 1;
        &mut *self.systems[last]
    }

    /// Remove a system by name, keeping the order of the others.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn System>> {
        let pos = self.systems.iter().position(|system| system.name() == name)?;
        Some(self.systems.remove(pos))
    }

    /// Returns a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn System> {
        self.systems
            .iter()
            .find(|system| system.name() == name)
            .map(|system| &**system)
    }

    /// Returns the system at `index`, in registration order.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn System + 'static)> {
        self.systems.get_mut(index).map(|system| &mut **system)
    }

    /// Returns an iterator over all systems in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn System> {
        self.systems.iter().map(|system| &**system)
    }

    /// Mutable iterator over all systems in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn System + 'static)> {
        self.systems.iter_mut().map(|system| &mut **system)
    }

    /// `(name, phases)` for every system, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<(String, Vec<FramePhase>)> {
        self.systems
            .iter()
            .map(|system| (system.name().to_owned(), system.phases().to_vec()))
            .collect()
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.systems.iter().map(|system| system.name()))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use engine_scene::SceneContext;

    use super::*;

    /// A system that does nothing but declare its phases.
    pub(crate) struct Noop {
        pub name: &'static str,
        pub phases: Vec<FramePhase>,
    }

    impl System for Noop {
        fn name(&self) -> &str {
            self.name
        }

        fn phases(&self) -> &[FramePhase] {
            &self.phases
        }

        fn run(&mut self, _phase: FramePhase, _ctx: &mut SceneContext, _dt: f32) {}
    }

    pub(crate) fn noop(name: &'static str, phases: &[FramePhase]) -> Box<dyn System> {
        Box::new(Noop {
            name,
            phases: phases.to_vec(),
        })
    }

    #[test]
    fn test_register_keeps_order() {
        let mut registry = SystemRegistry::new();
        registry.register(noop("physics", &[FramePhase::PhysicsUpdate]));
        registry.register(noop("ai", &[FramePhase::Update]));
        let names: Vec<&str> = registry.iter().map(|system| system.name()).collect();
        assert_eq!(names, vec!["physics", "ai"]);
        assert_eq!(registry.system_count(), 2);
    }

    #[test]
    fn test_unregister() {
        let mut registry = SystemRegistry::new();
        registry.register(noop("physics", &[FramePhase::PhysicsUpdate]));
        registry.register(noop("ai", &[FramePhase::Update]));
        assert!(registry.unregister("physics").is_some());
        assert!(registry.unregister("physics").is_none());
        assert_eq!(registry.system_count(), 1);
        assert!(registry.get("ai").is_some());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_name_panics() {
        let mut registry = SystemRegistry::new();
        registry.register(noop("physics", &[]));
        registry.register(noop("physics", &[]));
    }

    #[test]
    fn test_descriptors() {
        let mut registry = SystemRegistry::new();
        registry.register(noop("draw", &[FramePhase::Culling, FramePhase::Render]));
        assert_eq!(
            registry.descriptors(),
            vec![("draw".to_owned(), vec![FramePhase::Culling, FramePhase::Render])]
        );
    }
}
