//! Entity factories and level construction
//!
//! Every factory creates the physics body first and then stages the entity,
//! so a spawned entity always owns a live body. World layout: x grows to the
//! right from the left wall, y grows upwards from the paddle rail; the tile
//! grid hangs from the top of the field.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::entity::{BlockData, Entity, EntityData, EntityId, EntityKind, EntityStore, PaddleData};
use super::level::{self, LevelError, LevelSource, Material, TileCell};
use super::physics::{BodyKind, BodySpec, Layer, PhysicsWorld, Shape};
use crate::consts::*;
use crate::settings::Settings;

/// What a freshly built level looks like
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelLayout {
    /// Playfield size in world units
    pub field: Vec2,
    pub blocks: usize,
    pub paddle: EntityId,
    pub ball: EntityId,
}

/// Playfield size of a level's grid
pub fn field_size(level: &dyn LevelSource) -> Vec2 {
    Vec2::new(
        level.width() as f32 * TILE_WIDTH,
        level.height() as f32 * TILE_HEIGHT,
    )
}

/// Centre of a grid cell
pub fn cell_center(cell: &TileCell, field: Vec2) -> Vec2 {
    Vec2::new(
        (cell.col as f32 + 0.5) * TILE_WIDTH,
        field.y - (cell.row as f32 + 0.5) * TILE_HEIGHT,
    )
}

/// Where a new ball appears: above the paddle's current x
pub fn ball_spawn_point(paddle_x: f32) -> Vec2 {
    Vec2::new(paddle_x, PADDLE_Y + BALL_SPAWN_HEIGHT)
}

pub fn spawn_ball(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    position: Vec2,
    velocity: Vec2,
    material: Material,
    now: f64,
) -> EntityId {
    let id = entities.allocate_id();
    let body = physics.create_body(
        &BodySpec::new(id, BodyKind::Dynamic, position, Layer::Ball)
            .shape(Shape::Circle {
                radius: BALL_RADIUS,
            })
            .material(material)
            .linvel(velocity)
            .awake(),
    );
    entities.spawn(
        Entity::new(id, EntityData::Ball { energy: BALL_ENERGY }, now)
            .with_body(body)
            .placed(position)
            .sized(Vec2::splat(BALL_RADIUS)),
    )
}

/// Spawn the block for one grid cell. Blocks hang weightless until knocked
/// loose; fixed blocks never move at all.
pub fn spawn_block(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    level: &dyn LevelSource,
    cell: &TileCell,
    field: Vec2,
    now: f64,
) -> Result<EntityId, LevelError> {
    let param = level
        .tile_param(cell.tile_id)
        .ok_or(LevelError::MissingTileParam {
            tile_id: cell.tile_id,
            row: cell.row,
            col: cell.col,
        })?;

    let id = entities.allocate_id();
    let position = cell_center(cell, field);
    let half_extents = Vec2::new(TILE_WIDTH, TILE_HEIGHT) * 0.5 - Vec2::splat(BLOCK_GAP);
    let kind = if param.fixed {
        BodyKind::Fixed
    } else {
        BodyKind::Dynamic
    };
    let body = physics.create_body(
        &BodySpec::new(id, kind, position, Layer::Block)
            .shape(Shape::Box { half_extents })
            .material(param.material())
            .gravity_scale(0.0),
    );

    let data = BlockData {
        tile_id: cell.tile_id,
        energy: param.energy(),
        score: param.score,
        falling_gravity_scale: param.falling_gravity_scale(),
        min_impulse_for_damage: param.min_impulse_for_damage,
        min_impulse_for_kill: param.kill_impulse(),
        fixed: param.fixed,
    };
    Ok(entities.spawn(
        Entity::new(id, EntityData::Block(data), now)
            .with_body(body)
            .placed(position)
            .sized(half_extents),
    ))
}

pub fn spawn_wall(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    center: Vec2,
    half_extents: Vec2,
    material: Material,
    now: f64,
) -> EntityId {
    let id = entities.allocate_id();
    let body = physics.create_body(
        &BodySpec::new(id, BodyKind::Fixed, center, Layer::Boundary)
            .shape(Shape::Box { half_extents })
            .material(material),
    );
    entities.spawn(
        Entity::new(id, EntityData::Wall, now)
            .with_body(body)
            .placed(center)
            .sized(half_extents),
    )
}

/// Left, right and top walls around a field
pub fn spawn_walls(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    field: Vec2,
    material: Material,
    now: f64,
) -> [EntityId; 3] {
    let half = WALL_THICKNESS * 0.5;
    let side = Vec2::new(half, field.y * 0.5 + GROUND_DEPTH);
    let mid_y = field.y * 0.5 - GROUND_DEPTH;
    [
        spawn_wall(entities, physics, Vec2::new(-half, mid_y), side, material, now),
        spawn_wall(entities, physics, Vec2::new(field.x + half, mid_y), side, material, now),
        spawn_wall(
            entities,
            physics,
            Vec2::new(field.x * 0.5, field.y + half),
            Vec2::new(field.x * 0.5 + WALL_THICKNESS, half),
            material,
            now,
        ),
    ]
}

/// Sensor strip below the paddle rail; anything reaching it is out
pub fn spawn_ground(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    field: Vec2,
    now: f64,
) -> EntityId {
    let id = entities.allocate_id();
    let center = Vec2::new(field.x * 0.5, -GROUND_DEPTH);
    let half_extents = Vec2::new(field.x * 0.5 + WALL_THICKNESS, 0.5);
    let body = physics.create_body(
        &BodySpec::new(id, BodyKind::Fixed, center, Layer::Ground)
            .shape(Shape::Box { half_extents })
            .sensor(),
    );
    entities.spawn(
        Entity::new(id, EntityData::Ground, now)
            .with_body(body)
            .placed(center)
            .sized(half_extents),
    )
}

/// Paddle: a kinematic carriage sliding along the rail with the paddle
/// hinged on top of it.
pub fn spawn_paddle(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    x: f32,
    now: f64,
) -> EntityId {
    let id = entities.allocate_id();
    let position = Vec2::new(x, PADDLE_Y);
    let half_extents = Vec2::new(PADDLE_HALF_WIDTH, PADDLE_HALF_HEIGHT);

    let carriage = physics.create_body(&BodySpec::new(id, BodyKind::Kinematic, position, Layer::Paddle));
    let arm = physics.create_body(
        &BodySpec::new(id, BodyKind::Dynamic, position, Layer::Paddle)
            .shape(Shape::Box { half_extents })
            .material(Material::default_for(EntityKind::Paddle))
            .gravity_scale(0.0)
            .awake(),
    );
    let hinge = physics.create_hinge(carriage, arm, PADDLE_MAX_TILT);

    entities.spawn(
        Entity::new(id, EntityData::Paddle(PaddleData { carriage, hinge }), now)
            .with_body(arm)
            .placed(position)
            .sized(half_extents),
    )
}

/// Burst of short-lived particles. Returns how many were spawned.
pub fn spawn_explosion(
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    at: Vec2,
    settings: &Settings,
    rng: &mut Pcg32,
    now: f64,
) -> usize {
    for _ in 0..settings.explosion_particles {
        let angle = rng.random_range(0.0..TAU);
        let speed = settings.particle_speed * rng.random_range(0.5..1.0);
        let lifetime = settings.particle_lifetime * rng.random_range(0.7..1.3);
        let velocity = Vec2::from_angle(angle) * speed;

        let id = entities.allocate_id();
        let body = physics.create_body(
            &BodySpec::new(id, BodyKind::Dynamic, at, Layer::Particle)
                .shape(Shape::Circle {
                    radius: PARTICLE_RADIUS,
                })
                .material(Material::default_for(EntityKind::Particle))
                .linvel(velocity),
        );
        entities.spawn(
            Entity::new(id, EntityData::Particle, now)
                .with_body(body)
                .with_lifetime(lifetime)
                .placed(at)
                .sized(Vec2::splat(PARTICLE_RADIUS)),
        );
    }
    settings.explosion_particles
}

/// Floating "+N"/"-N" label
pub fn spawn_score_text(
    entities: &mut EntityStore,
    at: Vec2,
    delta: i64,
    lifetime: f64,
    now: f64,
) -> EntityId {
    let id = entities.allocate_id();
    let text = if delta >= 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    };
    entities.spawn(
        Entity::new(id, EntityData::Text { text }, now)
            .with_lifetime(lifetime)
            .placed(at),
    )
}

/// Build a level from already validated cells.
///
/// Walls, ground, blocks, paddle and the first ball are staged in `entities`
/// and created in `physics`.
pub fn populate_level(
    level: &dyn LevelSource,
    cells: &[TileCell],
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    now: f64,
) -> Result<LevelLayout, LevelError> {
    let field = field_size(level);
    spawn_walls(entities, physics, field, level.wall_material(), now);
    spawn_ground(entities, physics, field, now);
    for cell in cells {
        spawn_block(entities, physics, level, cell, field, now)?;
    }
    let paddle = spawn_paddle(entities, physics, field.x * 0.5, now);
    let ball = spawn_ball(
        entities,
        physics,
        ball_spawn_point(field.x * 0.5),
        Vec2::ZERO,
        level.ball_material(),
        now,
    );
    log::info!(
        "Built level '{}': {}x{} tiles, {} blocks",
        level.name(),
        level.width(),
        level.height(),
        cells.len()
    );
    Ok(LevelLayout {
        field,
        blocks: cells.len(),
        paddle,
        ball,
    })
}

/// Validate, then build. Nothing is created when validation fails.
pub fn build_level(
    level: &dyn LevelSource,
    entities: &mut EntityStore,
    physics: &mut PhysicsWorld,
    now: f64,
) -> Result<LevelLayout, LevelError> {
    let cells = level::validate(level)?;
    populate_level(level, &cells, entities, physics, now)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::SeedableRng;

    use super::*;
    use crate::sim::level::{LevelData, TileParam};

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&Settings::default().world_config(&sample()))
    }

    fn sample() -> LevelData {
        let mut params = BTreeMap::new();
        params.insert(1, TileParam::with_score(10));
        params.insert(
            2,
            TileParam {
                fixed: true,
                ..TileParam::with_score(50)
            },
        );
        LevelData::new(
            "sample",
            vec![
                vec![1, 1, 2, 1],
                vec![0, 1, 1, 0],
                vec![0, 0, 0, 0],
                vec![0, 0, 0, 0],
                vec![0, 0, 0, 0],
                vec![0, 0, 0, 0],
            ],
            params,
        )
    }

    #[test]
    fn test_build_level_counts() {
        let level = sample();
        let mut physics = world();
        let mut entities = EntityStore::new();
        let layout = build_level(&level, &mut entities, &mut physics, 0.0).unwrap();
        entities.merge_pending();

        assert_eq!(layout.blocks, 6);
        assert_eq!(entities.count_alive(EntityKind::Block), 6);
        assert_eq!(entities.count_alive(EntityKind::Wall), 3);
        assert_eq!(entities.count_alive(EntityKind::Ground), 1);
        assert_eq!(entities.count_alive(EntityKind::Paddle), 1);
        assert_eq!(entities.count_alive(EntityKind::Ball), 1);
        assert_eq!(layout.field, Vec2::new(8.0, 6.0));
        // One joint for the paddle hinge
        assert_eq!(physics.joint_count(), 1);
    }

    #[test]
    fn test_block_placement() {
        let level = sample();
        let mut physics = world();
        let mut entities = EntityStore::new();
        build_level(&level, &mut entities, &mut physics, 0.0).unwrap();
        entities.merge_pending();

        let top_left = entities
            .iter()
            .find(|e| e.kind() == EntityKind::Block)
            .unwrap();
        assert_eq!(top_left.position(), Vec2::new(1.0, 5.5));
        let body = top_left.body().unwrap();
        assert_eq!(physics.gravity_scale(body), Some(0.0));

        let anchored = entities
            .iter()
            .find(|e| e.block().is_some_and(|b| b.fixed))
            .unwrap();
        assert!(physics.is_fixed(anchored.body().unwrap()));
    }

    #[test]
    fn test_invalid_level_builds_nothing() {
        let mut level = sample();
        level.tiles[1][0] = 9;
        let mut physics = world();
        let mut entities = EntityStore::new();

        let err = build_level(&level, &mut entities, &mut physics, 0.0).unwrap_err();
        assert!(matches!(err, LevelError::MissingTileParam { tile_id: 9, .. }));
        assert_eq!(entities.pending_len(), 0);
        assert_eq!(physics.body_count(), 0);
    }

    #[test]
    fn test_explosion_is_seeded() {
        let settings = Settings::default();
        let mut physics = world();
        let mut a = EntityStore::new();
        let mut b = EntityStore::new();
        let mut rng_a = Pcg32::seed_from_u64(7);
        let mut rng_b = Pcg32::seed_from_u64(7);

        let n = spawn_explosion(&mut a, &mut physics, Vec2::ZERO, &settings, &mut rng_a, 0.0);
        spawn_explosion(&mut b, &mut physics, Vec2::ZERO, &settings, &mut rng_b, 0.0);
        a.merge_pending();
        b.merge_pending();
        assert_eq!(n, settings.explosion_particles);

        let lifetimes = |store: &EntityStore| -> Vec<f64> {
            store.iter().filter_map(Entity::lifetime).collect()
        };
        assert_eq!(lifetimes(&a), lifetimes(&b));
        assert_eq!(a.count_alive(EntityKind::Particle), n);
    }

    #[test]
    fn test_explosion_ignores_source_block() {
        let settings = Settings::default();
        let mut physics = world();
        let mut entities = EntityStore::new();
        build_level(&sample(), &mut entities, &mut physics, 0.0).unwrap();
        entities.merge_pending();
        let block = entities
            .iter()
            .find(|e| e.kind() == EntityKind::Block)
            .map(|e| (e.id(), e.position()))
            .unwrap();

        let mut rng = Pcg32::seed_from_u64(3);
        spawn_explosion(&mut entities, &mut physics, block.1, &settings, &mut rng, 0.0);
        entities.merge_pending();
        physics.step(SIM_DT);
        let is_particle = |id: EntityId| {
            entities
                .get(id)
                .is_some_and(|e| e.kind() == EntityKind::Particle)
        };
        let debris_hits = physics
            .drain_contacts()
            .into_iter()
            .filter(|c| {
                (c.a == block.0 && is_particle(c.b)) || (c.b == block.0 && is_particle(c.a))
            })
            .count();
        assert_eq!(debris_hits, 0);
    }

    #[test]
    fn test_score_text_label() {
        let mut entities = EntityStore::new();
        let plus = spawn_score_text(&mut entities, Vec2::ZERO, 25, 1.0, 0.0);
        let minus = spawn_score_text(&mut entities, Vec2::ZERO, -25, 1.0, 0.0);
        entities.merge_pending();
        assert_eq!(entities.get(plus).unwrap().text(), Some("+25"));
        assert_eq!(entities.get(minus).unwrap().text(), Some("-25"));
    }
}
