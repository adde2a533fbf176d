//! Demo scene: a corridor of chunks with props, lamps and a walking camera.
//!
//! Chunks are laid out along +X. Each chunk shows its direct neighbours and
//! leaves the rest hidden, so only three chunks are drawn at any time. The
//! walker bounces between the ends of the corridor and drives the current
//! chunk from the player position.

use engine_component::{Archetype, ComponentMask, EcsError, EntityIndex, EntityShift, World};
use engine_math::{Aabb, Transform};
use engine_scene::{Camera, Chunk, ChunkIndex, Collider, FramePhase, Light, Model, SceneContext, System};
use glam::Vec3;
use tracing::{debug, info};

/// Edge length of one chunk along X.
pub const CHUNK_LENGTH: f32 = 20.0;

/// Layout of the demo corridor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoLayout {
    pub chunk_count: u32,
    pub props_per_chunk: u32,
    /// Player speed in units per second.
    pub walk_speed: f32,
}

impl Default for DemoLayout {
    fn default() -> Self {
        Self {
            chunk_count: 8,
            props_per_chunk: 4,
            walk_speed: 12.0,
        }
    }
}

/// A built demo scene.
#[derive(Debug)]
pub struct DemoScene {
    pub ctx: SceneContext,
    pub player: EntityIndex,
    pub props: Vec<EntityIndex>,
    pub lamps: Vec<EntityIndex>,
}

fn chunk_center(index: u32) -> Vec3 {
    Vec3::new(index as f32 * CHUNK_LENGTH, 0.0, 0.0)
}

/// Build the corridor described by `layout`.
pub fn build(layout: DemoLayout) -> Result<DemoScene, EcsError> {
    let mut world = World::new();
    engine_scene::register_scene_managers(&mut world);

    let prop_count = layout.chunk_count * layout.props_per_chunk;
    let prop = world.add_archetype(
        Archetype::new("prop")
            .with_mask(ComponentMask::TRANSFORM)
            .with_component(Model {
                mesh: "crate".to_owned(),
                material: "wood".to_owned(),
            })
            .with_component(Collider::default()),
        prop_count,
    )?;
    let lamp = world.add_archetype(
        Archetype::new("lamp")
            .with_mask(ComponentMask::TRANSFORM)
            .with_component(Light::default()),
        layout.chunk_count,
    )?;
    let player = world.add_archetype(
        Archetype::new("player")
            .with_mask(ComponentMask::TRANSFORM)
            .with_component(Camera::default()),
        1,
    )?;

    let props: Vec<EntityIndex> = (0..prop_count).map(|_| world.add_entity(prop)).collect();
    let lamps: Vec<EntityIndex> = (0..layout.chunk_count).map(|_| world.add_entity(lamp)).collect();
    let player = world.add_entity(player);

    let mut ctx = SceneContext::new(Box::new(world));
    for index in 0..layout.chunk_count {
        let half = CHUNK_LENGTH / 2.0;
        let mut chunk = Chunk::new(Aabb::new(chunk_center(index), Vec3::new(half, half, half)));
        if index > 0 {
            chunk.chunks_to_show.insert(ChunkIndex(index - 1));
        }
        if index + 1 < layout.chunk_count {
            chunk.chunks_to_show.insert(ChunkIndex(index + 1));
        }
        ctx.chunks_mut().add_chunk(chunk);
    }

    let spacing = CHUNK_LENGTH / (layout.props_per_chunk + 1) as f32;
    for (i, &entity) in props.iter().enumerate() {
        let chunk = i as u32 / layout.props_per_chunk.max(1);
        let slot = i as u32 % layout.props_per_chunk.max(1);
        let x = chunk_center(chunk).x - CHUNK_LENGTH / 2.0 + spacing * (slot + 1) as f32;
        ctx.set_transform(entity, Transform::from_position(Vec3::new(x, 0.0, 3.0)));
    }
    // One lamp hangs above the first prop of every chunk.
    for (chunk, &entity) in lamps.iter().enumerate() {
        ctx.set_transform(entity, Transform::from_position(Vec3::new(0.0, 2.5, 0.0)));
        if let Some(&holder) = props.get(chunk * layout.props_per_chunk as usize) {
            ctx.set_parent(entity, holder);
        }
    }

    ctx.set_transform(player, Transform::from_position(chunk_center(0)));
    ctx.chunks_mut().add_always_active(player);
    let start = ctx.chunks().classify_point(chunk_center(0));
    ctx.chunks_mut().set_current_chunk(start);

    info!(
        chunks = layout.chunk_count,
        props = props.len(),
        lamps = lamps.len(),
        entities = ctx.ecs().entity_count(),
        "demo scene built"
    );
    Ok(DemoScene {
        ctx,
        player,
        props,
        lamps,
    })
}

/// Moves the player back and forth along the corridor and keeps the current
/// chunk under it.
#[derive(Debug)]
pub struct WalkerSystem {
    player: EntityIndex,
    speed: f32,
    direction: f32,
}

impl WalkerSystem {
    const PHASES: [FramePhase; 1] = [FramePhase::Update];

    #[must_use]
    pub fn new(player: EntityIndex, speed: f32) -> Self {
        Self {
            player,
            speed,
            direction: 1.0,
        }
    }
}

impl System for WalkerSystem {
    fn name(&self) -> &str {
        "walker"
    }

    fn phases(&self) -> &[FramePhase] {
        &Self::PHASES
    }

    fn run(&mut self, _phase: FramePhase, ctx: &mut SceneContext, dt: f32) {
        let Some(transforms) = ctx.transforms() else {
            return;
        };
        let current = *transforms.transform(self.player);
        let step = Vec3::X * (self.speed * self.direction * dt);
        let mut next = current.translated(step);

        let mut chunk = ctx.chunks().classify_point(next.position);
        if chunk.is_none() {
            // Walked off an end of the corridor: turn around.
            self.direction = -self.direction;
            next = current;
            chunk = ctx.chunks().classify_point(next.position);
            debug!(position = ?next.position, "walker turned around");
        }

        ctx.set_transform(self.player, next);
        if chunk.is_some() {
            ctx.chunks_mut().set_current_chunk(chunk);
        }
    }

    fn apply_shift(&mut self, shift: EntityShift) {
        if let Some(player) = shift.apply(self.player) {
            self.player = player;
        }
    }
}
