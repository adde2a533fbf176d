//! The context handed to every system.
//!
//! [`SceneContext`] replaces global singletons: it owns the ECS behind the
//! [`EcsManager`] interface and the scene's [`ChunkManager`]. A context built
//! with [`SceneContext::headless`] runs on [`NullEcs`].

use engine_component::{
    ArchetypeId, ComponentKind, ComponentMask, EcsManager, EntityIndex, EntityRemap, EntityShift, NullEcs,
};
use engine_math::Transform;
use serde_json::Value;

use crate::chunk_manager::ChunkManager;
use crate::error::SceneError;
use crate::hierarchy::TransformManager;

/// Everything a system may read or write.
pub struct SceneContext {
    ecs: Box<dyn EcsManager>,
    chunks: ChunkManager,
}

impl SceneContext {
    /// Wrap an ECS implementation with an empty chunk manager.
    #[must_use]
    pub fn new(ecs: Box<dyn EcsManager>) -> Self {
        Self {
            ecs,
            chunks: ChunkManager::new(),
        }
    }

    /// A context on top of [`NullEcs`].
    #[must_use]
    pub fn headless() -> Self {
        Self::new(Box::new(NullEcs))
    }

    pub fn ecs(&self) -> &dyn EcsManager {
        self.ecs.as_ref()
    }

    pub fn ecs_mut(&mut self) -> &mut dyn EcsManager {
        self.ecs.as_mut()
    }

    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut ChunkManager {
        &mut self.chunks
    }

    /// Split borrow of the ECS and the chunk manager.
    pub fn split_mut(&mut self) -> (&mut dyn EcsManager, &mut ChunkManager) {
        (self.ecs.as_mut(), &mut self.chunks)
    }

    /// The transform hierarchy, if the ECS has one.
    pub fn transforms(&self) -> Option<&TransformManager> {
        self.ecs.manager::<TransformManager>(ComponentKind::Transform)
    }

    pub fn transforms_mut(&mut self) -> Option<&mut TransformManager> {
        self.ecs.manager_mut::<TransformManager>(ComponentKind::Transform)
    }

    /// Write the local transform of `entity` and fire the update subject.
    ///
    /// # Panics
    ///
    /// Panics if there is no transform manager or `entity` has no transform.
    pub fn set_transform(&mut self, entity: EntityIndex, transform: Transform) {
        assert!(
            self.ecs.has_component(entity, ComponentMask::TRANSFORM),
            "{entity} has no transform"
        );
        self.require_transforms().set_component(entity, transform);
        self.ecs.update_component(entity, ComponentMask::TRANSFORM);
    }

    /// Reparent `entity`, dirty its subtree and fire the update subject.
    pub fn set_parent(&mut self, entity: EntityIndex, parent: EntityIndex) {
        let transforms = self.require_transforms();
        transforms.set_parent(entity, parent);
        transforms.set_dirty(entity);
        self.ecs.update_component(entity, ComponentMask::TRANSFORM);
    }

    fn require_transforms(&mut self) -> &mut TransformManager {
        self.ecs
            .manager_mut::<TransformManager>(ComponentKind::Transform)
            .unwrap_or_else(|| panic!("no transform manager registered"))
    }

    /// Replace the chunks from a scene document.
    pub fn load_chunks(&mut self, json: &Value, remap: &EntityRemap) -> Result<(), SceneError> {
        self.chunks.load_json(json, remap)
    }

    /// Let every index holder outside the ECS follow an archetype resize.
    pub fn apply_shift(&mut self, shift: EntityShift) {
        self.chunks.apply_shift(shift);
    }

    /// Resize an archetype pool; chunk references follow the shift.
    ///
    /// Systems are not told. Go through the frame loop when systems hold
    /// entity indices.
    pub fn resize_archetype(&mut self, id: ArchetypeId, size: u32) -> Result<EntityShift, SceneError> {
        let shift = self.ecs.resize_archetype(id, size)?;
        self.apply_shift(shift);
        Ok(shift)
    }

    /// Load an archetype list; chunk references follow every shift it causes.
    pub fn load_archetypes(&mut self, json: &Value) -> Result<Vec<EntityShift>, SceneError> {
        let shifts = self.ecs.archetypes_from_json(json)?;
        for &shift in &shifts {
            self.apply_shift(shift);
        }
        Ok(shifts)
    }
}

impl std::fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext")
            .field("entities", &self.ecs.entity_count())
            .field("chunks", &self.chunks.chunk_count())
            .field("current_chunk", &self.chunks.current_chunk())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::register_scene_managers;
    use crate::chunk::Chunk;
    use engine_component::{Archetype, ArchetypeId, ComponentChange, ComponentEvent, World, observer};
    use glam::Vec3;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn scene() -> SceneContext {
        let mut world = World::new();
        register_scene_managers(&mut world);
        SceneContext::new(Box::new(world))
    }

    #[test]
    fn test_headless_reads_are_safe() {
        let ctx = SceneContext::headless();
        assert!(ctx.transforms().is_none());
        assert_eq!(ctx.ecs().entity_count(), 0);
        assert!(ctx.chunks().is_empty());
    }

    #[test]
    fn test_set_transform_notifies_update() {
        let mut ctx = scene();
        let entity = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        ctx.ecs_mut().add_component(entity, ComponentMask::TRANSFORM);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ctx.ecs_mut().add_component_observer(
            ComponentEvent::Update,
            observer(move |change: &ComponentChange| sink.lock().push(*change)),
        );

        ctx.set_transform(entity, Transform::from_position(Vec3::X));
        assert_eq!(
            seen.lock().as_slice(),
            &[ComponentChange {
                entity,
                mask: ComponentMask::TRANSFORM
            }]
        );
        assert_eq!(ctx.transforms_mut().unwrap().world_position(entity), Vec3::X);
    }

    #[test]
    fn test_set_parent_dirties_child() {
        let mut ctx = scene();
        let parent = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        let child = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        for entity in [parent, child] {
            ctx.ecs_mut().add_component(entity, ComponentMask::TRANSFORM);
        }
        ctx.set_transform(parent, Transform::from_position(Vec3::new(3.0, 0.0, 0.0)));
        ctx.transforms_mut().unwrap().world_to_local(child);

        ctx.set_parent(child, parent);
        assert_eq!(
            ctx.transforms_mut().unwrap().world_position(child),
            Vec3::new(3.0, 0.0, 0.0)
        );
    }

    #[test]
    #[should_panic(expected = "has no transform")]
    fn test_set_transform_requires_component() {
        let mut ctx = scene();
        let entity = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        ctx.set_transform(entity, Transform::IDENTITY);
    }

    #[test]
    fn test_resize_archetype_moves_chunk_links() {
        let mut world = World::new();
        register_scene_managers(&mut world);
        let id = world
            .add_archetype(Archetype::new("crate").with_mask(ComponentMask::TRANSFORM), 2)
            .unwrap();
        let mut ctx = SceneContext::new(Box::new(world));
        let player = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        let chunk = ctx.chunks_mut().add_chunk(Chunk::default());
        ctx.chunks_mut().link_entity(chunk, player);
        ctx.chunks_mut().add_always_active(player);

        let shift = ctx.resize_archetype(id, 5).unwrap();
        let moved = EntityIndex(player.0 + 3);
        assert_eq!(shift, EntityShift::Inserted {
            at: EntityIndex(2),
            count: 3,
        });
        assert_eq!(ctx.chunks().linked_chunk(moved), chunk);
        assert!(ctx.chunks().is_always_active(moved));
        assert!(ctx.ecs().entity_state(moved).is_alive());
    }

    #[test]
    fn test_load_archetypes_reports_shifts() {
        let mut ctx = scene();
        let player = ctx.ecs_mut().add_entity(ArchetypeId::DEFAULT);
        ctx.chunks_mut().add_always_active(player);

        let shifts = ctx
            .load_archetypes(&serde_json::json!([{
                "archetype": {"mask": ComponentMask::TRANSFORM, "components": {}},
                "size": 4,
                "name": "barrel",
            }]))
            .unwrap();
        assert_eq!(shifts, vec![EntityShift::Inserted {
            at: EntityIndex(0),
            count: 4,
        }]);
        assert!(ctx.chunks().is_always_active(EntityIndex(player.0 + 4)));
    }
}
