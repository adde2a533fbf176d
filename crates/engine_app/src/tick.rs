//! Fixed-timestep frame loop.
//!
//! Each frame:
//!
//! 1. Advance deferred destruction and rotate the drawn-entities channel.
//! 2. Run every phase of [`FramePhase::ALL`], invoking the subscribed systems
//!    in registration order.
//! 3. Advance the frame counter.

use std::time::{Duration, Instant};

use engine_component::{ArchetypeId, EntityShift};
use engine_scene::{FramePhase, SceneContext, SceneError, System};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::registry::SystemRegistry;
use crate::scheduler::{self, PhaseSlot, RegisteredSystem};

/// The frame loop state.
#[derive(Debug)]
pub struct FrameLoop {
    /// Current frame counter.
    frame_id: u64,
    config: EngineConfig,
    ctx: SceneContext,
    registry: SystemRegistry,
    /// Pre-computed phase plan (recomputed when the system set changes).
    plan: Vec<PhaseSlot>,
    plan_dirty: bool,
}

impl FrameLoop {
    /// Create a frame loop driving `ctx`.
    #[must_use]
    pub fn new(config: EngineConfig, ctx: SceneContext) -> Self {
        Self {
            frame_id: 0,
            config,
            ctx,
            registry: SystemRegistry::new(),
            plan: Vec::new(),
            plan_dirty: true,
        }
    }

    /// Returns the current frame counter.
    #[must_use]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[must_use]
    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    #[must_use]
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// Register and attach a system. It runs from the next frame on.
    pub fn add_system(&mut self, system: Box<dyn System>) {
        let system = self.registry.register(system);
        system.attach(&mut self.ctx);
        debug!(system = system.name(), phases = ?system.phases(), "system attached");
        self.plan_dirty = true;
    }

    /// Detach and drop a system by name.
    pub fn remove_system(&mut self, name: &str) -> bool {
        match self.registry.unregister(name) {
            Some(mut system) => {
                system.detach(&mut self.ctx);
                self.plan_dirty = true;
                true
            }
            None => false,
        }
    }

    /// Resize an archetype pool. Chunks and every registered system follow
    /// the resulting index shift.
    pub fn resize_archetype(&mut self, id: ArchetypeId, size: u32) -> Result<EntityShift, SceneError> {
        let shift = self.ctx.resize_archetype(id, size)?;
        self.broadcast_shift(shift);
        Ok(shift)
    }

    /// Load an archetype list. Chunks and every registered system follow
    /// each shift, in order.
    pub fn load_archetypes(&mut self, json: &Value) -> Result<Vec<EntityShift>, SceneError> {
        let shifts = self.ctx.load_archetypes(json)?;
        for &shift in &shifts {
            self.broadcast_shift(shift);
        }
        Ok(shifts)
    }

    fn broadcast_shift(&mut self, shift: EntityShift) {
        if shift == EntityShift::None {
            return;
        }
        for system in self.registry.iter_mut() {
            system.apply_shift(shift);
        }
        debug!(?shift, systems = self.registry.system_count(), "systems followed index shift");
    }

    fn recompute_plan(&mut self) {
        let systems: Vec<RegisteredSystem> = self
            .registry
            .descriptors()
            .into_iter()
            .map(|(name, phases)| RegisteredSystem { name, phases })
            .collect();

        self.plan = scheduler::compute_phase_plan(&systems);
        self.plan_dirty = false;

        info!(
            frame_id = self.frame_id,
            system_count = systems.len(),
            "recomputed phase plan"
        );
    }

    /// Returns the current phase plan, recomputing if necessary.
    pub fn plan(&mut self) -> &[PhaseSlot] {
        if self.plan_dirty {
            self.recompute_plan();
        }
        &self.plan
    }

    /// Run one frame of `dt` seconds.
    pub fn frame(&mut self, dt: f32) {
        self.frame_id += 1;

        if self.plan_dirty {
            self.recompute_plan();
        }

        self.ctx.ecs_mut().update(dt);

        for slot in &self.plan {
            for &idx in &slot.system_indices {
                if let Some(system) = self.registry.get_mut(idx) {
                    system.run(slot.phase, &mut self.ctx, dt);
                }
            }
        }

        debug!(
            frame_id = self.frame_id,
            dt,
            drawn = self.ctx.ecs().drawn_entities().len(),
            "frame done"
        );
    }

    /// Run the frame loop for the configured number of frames, or
    /// indefinitely.
    pub fn run(&mut self) {
        let frame_duration = Duration::from_secs_f64(self.config.frame_seconds());
        let mut frame_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_frames = self.config.max_frames,
            "starting frame loop"
        );

        loop {
            let start = Instant::now();

            self.frame(frame_duration.as_secs_f32());

            frame_count += 1;
            if self.config.max_frames > 0 && frame_count >= self.config.max_frames {
                info!(frames = frame_count, "frame loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            } else {
                warn!(
                    frame_id = self.frame_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = frame_duration.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine_component::{Archetype, ComponentMask, EntityIndex, World};
    use engine_math::{Aabb, Transform};
    use engine_scene::{Chunk, ChunkIndex, ChunkSystem, register_scene_managers};
    use glam::Vec3;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::registry::tests::noop;

    /// Appends `(phase, name)` to a shared log on every run.
    struct Recorder {
        name: &'static str,
        phases: Vec<FramePhase>,
        log: Arc<Mutex<Vec<(FramePhase, &'static str)>>>,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn phases(&self) -> &[FramePhase] {
            &self.phases
        }

        fn run(&mut self, phase: FramePhase, _ctx: &mut SceneContext, _dt: f32) {
            self.log.lock().push((phase, self.name));
        }
    }

    fn world_context() -> SceneContext {
        let mut world = World::new();
        register_scene_managers(&mut world);
        SceneContext::new(Box::new(world))
    }

    #[test]
    fn test_frame_advances_counter() {
        let mut frame_loop = FrameLoop::new(EngineConfig::default(), SceneContext::headless());
        assert_eq!(frame_loop.frame_id(), 0);
        frame_loop.frame(1.0 / 60.0);
        assert_eq!(frame_loop.frame_id(), 1);
        frame_loop.frame(1.0 / 60.0);
        assert_eq!(frame_loop.frame_id(), 2);
    }

    #[test]
    fn test_plan_recomputed_on_registry_change() {
        let mut frame_loop = FrameLoop::new(EngineConfig::default(), SceneContext::headless());
        assert!(frame_loop.plan().iter().all(|slot| slot.system_indices.is_empty()));

        frame_loop.add_system(noop("physics", &[FramePhase::PhysicsUpdate]));
        let plan = frame_loop.plan();
        assert_eq!(plan[1].system_indices, vec![0]);

        assert!(frame_loop.remove_system("physics"));
        assert!(!frame_loop.remove_system("physics"));
        assert!(frame_loop.plan()[1].system_indices.is_empty());
    }

    #[test]
    fn test_phases_run_in_order_and_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut frame_loop = FrameLoop::new(EngineConfig::default(), SceneContext::headless());
        frame_loop.add_system(Box::new(Recorder {
            name: "late",
            phases: vec![FramePhase::EndOfFrame, FramePhase::Update],
            log: Arc::clone(&log),
        }));
        frame_loop.add_system(Box::new(Recorder {
            name: "early",
            phases: vec![FramePhase::Update, FramePhase::Culling],
            log: Arc::clone(&log),
        }));

        frame_loop.frame(0.016);
        let log = log.lock().clone();
        assert_eq!(
            log,
            vec![
                (FramePhase::Update, "late"),
                (FramePhase::Update, "early"),
                (FramePhase::Culling, "early"),
                (FramePhase::EndOfFrame, "late"),
            ]
        );
    }

    #[test]
    fn test_frame_ticks_deferred_destruction() {
        let mut frame_loop = FrameLoop::new(EngineConfig::default(), world_context());
        let ecs = frame_loop.context_mut().ecs_mut();
        let entity = ecs.add_entity(ArchetypeId::DEFAULT);
        ecs.destroy_entity(entity, 0.05);

        frame_loop.frame(0.03);
        assert!(frame_loop.context().ecs().entity_state(entity).is_alive());
        frame_loop.frame(0.03);
        assert!(!frame_loop.context().ecs().entity_state(entity).is_alive());
    }

    #[test]
    fn test_run_limited_frames() {
        let config = EngineConfig::new().with_tick_rate(1000.0).with_max_frames(5);
        let mut frame_loop = FrameLoop::new(config, SceneContext::headless());
        frame_loop.run();
        assert_eq!(frame_loop.frame_id(), 5);
    }

    /// Records every shift handed to it.
    struct ShiftLog {
        shifts: Arc<Mutex<Vec<EntityShift>>>,
    }

    impl System for ShiftLog {
        fn name(&self) -> &str {
            "shift_log"
        }

        fn phases(&self) -> &[FramePhase] {
            &[]
        }

        fn run(&mut self, _phase: FramePhase, _ctx: &mut SceneContext, _dt: f32) {}

        fn apply_shift(&mut self, shift: EntityShift) {
            self.shifts.lock().push(shift);
        }
    }

    #[test]
    fn test_resize_reaches_every_system() {
        let mut world = World::new();
        register_scene_managers(&mut world);
        let id = world
            .add_archetype(Archetype::new("crate").with_mask(ComponentMask::TRANSFORM), 2)
            .unwrap();
        let mut ctx = SceneContext::new(Box::new(world));
        ctx.chunks_mut()
            .add_chunk(Chunk::new(Aabb::new(Vec3::ZERO, Vec3::splat(10.0))));
        ctx.chunks_mut()
            .add_chunk(Chunk::new(Aabb::new(Vec3::new(20.0, 0.0, 0.0), Vec3::splat(10.0))));
        ctx.chunks_mut().set_current_chunk(ChunkIndex(0));
        let far = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        ctx.ecs_mut().add_component(far, ComponentMask::TRANSFORM);
        ctx.set_transform(far, Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));

        let shifts = Arc::new(Mutex::new(Vec::new()));
        let mut frame_loop = FrameLoop::new(EngineConfig::default(), ctx);
        frame_loop.add_system(Box::new(ChunkSystem::new()));
        frame_loop.add_system(Box::new(ShiftLog {
            shifts: Arc::clone(&shifts),
        }));
        frame_loop.frame(0.016);
        let ecs = frame_loop.context().ecs();
        assert!(!ecs.is_active(far) && !ecs.is_visible(far));

        let shift = frame_loop.resize_archetype(id, 4).unwrap();
        assert_eq!(*shifts.lock(), vec![shift]);
        let moved = EntityIndex(far.0 + 2);

        // The chunk system carried its record of the entity's own flag along.
        frame_loop.context_mut().chunks_mut().clear();
        frame_loop.frame(0.016);
        let ecs = frame_loop.context().ecs();
        assert!(ecs.is_active(moved) && ecs.is_visible(moved));
    }

    #[test]
    fn test_unchanged_resize_is_not_broadcast() {
        let mut world = World::new();
        register_scene_managers(&mut world);
        let id = world.add_archetype(Archetype::new("crate"), 2).unwrap();
        let shifts = Arc::new(Mutex::new(Vec::new()));
        let mut frame_loop = FrameLoop::new(EngineConfig::default(), SceneContext::new(Box::new(world)));
        frame_loop.add_system(Box::new(ShiftLog {
            shifts: Arc::clone(&shifts),
        }));

        assert_eq!(frame_loop.resize_archetype(id, 2).unwrap(), EntityShift::None);
        let loaded = frame_loop
            .load_archetypes(&json!([{
                "archetype": {"mask": ComponentMask::empty(), "components": {}},
                "size": 3,
                "name": "barrel",
            }]))
            .unwrap();
        assert_eq!(*shifts.lock(), loaded);
    }
}
