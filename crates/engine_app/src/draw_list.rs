//! Draw list: the hand-off between culling and rendering.
//!
//! Culling publishes every active, visible entity that owns a model. The ECS
//! only exposes that list after its next update, so the render phase always
//! sees the list culled on the previous frame.

use engine_component::{ComponentMask, EntityIndex};
use engine_scene::{FramePhase, SceneContext, System};
use tracing::trace;

/// Publishes visible models during culling and consumes them during render.
#[derive(Debug, Default)]
pub struct DrawListSystem {
    rendered: Vec<EntityIndex>,
    frames_rendered: u64,
}

impl DrawListSystem {
    const PHASES: [FramePhase; 2] = [FramePhase::Culling, FramePhase::Render];

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The entities handed to the last render phase.
    #[must_use]
    pub fn rendered(&self) -> &[EntityIndex] {
        &self.rendered
    }

    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn cull(ctx: &mut SceneContext) {
        let ecs = ctx.ecs_mut();
        let visible: Vec<EntityIndex> = ecs
            .entities_with_components(ComponentMask::MODEL | ComponentMask::TRANSFORM)
            .into_iter()
            .filter(|&entity| ecs.is_active(entity) && ecs.is_visible(entity))
            .collect();
        trace!(count = visible.len(), "culled draw list");
        ecs.set_visible_entities(visible);
    }

    fn render(&mut self, ctx: &SceneContext) {
        self.rendered.clear();
        self.rendered.extend_from_slice(ctx.ecs().drawn_entities());
        self.frames_rendered += 1;
        trace!(count = self.rendered.len(), "rendered draw list");
    }
}

impl System for DrawListSystem {
    fn name(&self) -> &str {
        "draw_list"
    }

    fn phases(&self) -> &[FramePhase] {
        &Self::PHASES
    }

    fn run(&mut self, phase: FramePhase, ctx: &mut SceneContext, _dt: f32) {
        match phase {
            FramePhase::Culling => Self::cull(ctx),
            FramePhase::Render => self.render(ctx),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{Archetype, World};
    use engine_math::Transform;
    use engine_scene::{Model, register_scene_managers};

    use super::*;

    fn scene() -> (SceneContext, Vec<EntityIndex>) {
        let mut world = World::new();
        register_scene_managers(&mut world);
        let prop = Archetype::new("prop")
            .with_mask(ComponentMask::TRANSFORM)
            .with_component(Model {
                mesh: "crate".to_owned(),
                material: "wood".to_owned(),
            });
        let id = world.add_archetype(prop, 3).unwrap();
        let entities = (0..3).map(|_| world.add_entity(id)).collect();
        (SceneContext::new(Box::new(world)), entities)
    }

    fn frame(system: &mut DrawListSystem, ctx: &mut SceneContext) {
        ctx.ecs_mut().update(0.016);
        system.run(FramePhase::Culling, ctx, 0.016);
        system.run(FramePhase::Render, ctx, 0.016);
    }

    #[test]
    fn test_render_sees_previous_cull() {
        let (mut ctx, entities) = scene();
        let mut system = DrawListSystem::new();

        frame(&mut system, &mut ctx);
        assert!(system.rendered().is_empty());

        frame(&mut system, &mut ctx);
        assert_eq!(system.rendered(), entities.as_slice());
        assert_eq!(system.frames_rendered(), 2);
    }

    #[test]
    fn test_hidden_and_inactive_are_culled() {
        let (mut ctx, entities) = scene();
        ctx.ecs_mut().set_visible(entities[0], false);
        ctx.ecs_mut().set_active(entities[2], false);
        let mut system = DrawListSystem::new();

        frame(&mut system, &mut ctx);
        frame(&mut system, &mut ctx);
        assert_eq!(system.rendered(), &[entities[1]]);
    }

    #[test]
    fn test_entities_without_model_are_skipped() {
        let mut world = World::new();
        register_scene_managers(&mut world);
        let bare = world.add_entity(engine_component::ArchetypeId::DEFAULT);
        world.add_component(bare, ComponentMask::TRANSFORM);
        let mut ctx = SceneContext::new(Box::new(world));
        ctx.set_transform(bare, Transform::IDENTITY);
        let mut system = DrawListSystem::new();

        frame(&mut system, &mut ctx);
        frame(&mut system, &mut ctx);
        assert!(system.rendered().is_empty());
    }
}
