//! Gameplay reaction to physics contacts
//!
//! Runs after each physics step over the drained contact buffer. Each
//! contact is classified by the unordered kind pair of its two entities and
//! turned into entity mutations plus a list of [`Effect`]s for the state
//! machine to apply (score, sounds, explosions, spree kills, glare).
//!
//! An entity that was destroyed or otherwise resolved during a step is never
//! processed again in the same step, no matter how many contacts it shows up
//! in.

use std::collections::HashSet;

use glam::Vec2;

use super::entity::{EntityId, EntityKind, EntityStore};
use super::physics::{ContactEvent, PhysicsWorld};
use crate::audio::SoundEffect;
use crate::settings::Settings;

/// Side effect requested by the resolver
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Change the score, showing a label at `at`
    Score { delta: i64, at: Vec2 },
    Sound(SoundEffect),
    /// Spawn explosion particles
    Explosion { at: Vec2 },
    /// A block fell to the ball; feeds the killing-spree tracker
    BlockShattered { at: Vec2 },
    /// Flash the screen
    Glare,
}

/// Tuning the resolver reads from [`Settings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    pub catch_multiplier: i64,
    pub paddle_hit_audible_impulse: f32,
    pub damage_per_impulse: f32,
}

impl From<&Settings> for ResolverConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            catch_multiplier: settings.catch_multiplier,
            paddle_hit_audible_impulse: settings.paddle_hit_audible_impulse,
            damage_per_impulse: settings.damage_per_impulse,
        }
    }
}

/// Contact pair, ordered by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pair {
    BallBlock { block: EntityId },
    BallPaddle,
    BallGround { ball: EntityId },
    BlockPaddle { block: EntityId },
    BlockGround { block: EntityId },
}

impl Pair {
    /// Pairs are unordered; sorting by kind gives each one a single spelling
    fn classify(a: (EntityId, EntityKind), b: (EntityId, EntityKind)) -> Option<Self> {
        use EntityKind::*;
        let (first, second) = if a.1 <= b.1 { (a, b) } else { (b, a) };
        match (first.1, second.1) {
            (Ball, Block) => Some(Pair::BallBlock { block: second.0 }),
            (Ball, Paddle) => Some(Pair::BallPaddle),
            (Ball, Ground) => Some(Pair::BallGround { ball: first.0 }),
            (Block, Paddle) => Some(Pair::BlockPaddle { block: first.0 }),
            (Block, Ground) => Some(Pair::BlockGround { block: first.0 }),
            _ => None,
        }
    }
}

/// Applies the kind-pair rules to a step's contacts
#[derive(Debug, Clone)]
pub struct CollisionResolver {
    config: ResolverConfig,
    /// Entities already handled in the current step
    resolved: HashSet<EntityId>,
}

impl CollisionResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            resolved: HashSet::new(),
        }
    }

    /// Resolve one step's contacts in order.
    ///
    /// Contacts naming unknown or dead entities, and pairs without a rule,
    /// are skipped.
    pub fn resolve(
        &mut self,
        contacts: &[ContactEvent],
        entities: &mut EntityStore,
        physics: &mut PhysicsWorld,
    ) -> Vec<Effect> {
        self.resolved.clear();
        let mut effects = Vec::new();

        for contact in contacts {
            let Some(a) = entities.alive(contact.a).map(|e| (e.id(), e.kind())) else {
                continue;
            };
            let Some(b) = entities.alive(contact.b).map(|e| (e.id(), e.kind())) else {
                continue;
            };
            if self.resolved.contains(&a.0) || self.resolved.contains(&b.0) {
                continue;
            }
            let Some(pair) = Pair::classify(a, b) else {
                continue;
            };

            match pair {
                Pair::BallBlock { block } => {
                    self.ball_hits_block(block, contact, entities, physics, &mut effects);
                }
                Pair::BallPaddle => {
                    if contact.normal_impulse > self.config.paddle_hit_audible_impulse {
                        effects.push(Effect::Sound(SoundEffect::PaddleHit));
                    }
                }
                Pair::BallGround { ball } => {
                    if let Some(entity) = entities.get_mut(ball) {
                        entity.lethal_hit();
                    }
                    if entities.kill(ball) {
                        log::debug!("ball {ball} lost");
                        self.resolved.insert(ball);
                        effects.push(Effect::Glare);
                        effects.push(Effect::Sound(SoundEffect::BallLost));
                    }
                }
                Pair::BlockPaddle { block } => {
                    if contact.began {
                        self.paddle_touches_block(block, entities, physics, &mut effects);
                    }
                }
                Pair::BlockGround { block } => {
                    if entities.kill(block) {
                        log::debug!("block {block} fell out");
                        self.resolved.insert(block);
                    }
                }
            }
        }

        effects
    }

    fn ball_hits_block(
        &mut self,
        block: EntityId,
        contact: &ContactEvent,
        entities: &mut EntityStore,
        physics: &mut PhysicsWorld,
        effects: &mut Vec<Effect>,
    ) {
        let Some(entity) = entities.get_mut(block) else {
            return;
        };
        let body = entity.body();
        let at = body
            .and_then(|b| physics.placement(b))
            .map_or(entity.position(), |(position, _)| position);
        let Some(data) = entity.block().cloned() else {
            return;
        };
        let impulse = contact.normal_impulse;
        if impulse <= data.min_impulse_for_damage {
            return;
        }

        let destroyed = if impulse > data.min_impulse_for_kill {
            entity.lethal_hit()
        } else {
            entity.hit(self.damage(impulse))
        };

        if destroyed {
            entities.kill(block);
            self.resolved.insert(block);
            effects.push(Effect::Score {
                delta: data.score,
                at,
            });
            effects.push(Effect::Explosion { at });
            effects.push(Effect::Sound(SoundEffect::BlockDestroyed));
            effects.push(Effect::BlockShattered { at });
            return;
        }

        if let Some(body) = body.filter(|_| !data.fixed) {
            if physics.gravity_scale(body) == Some(0.0) {
                log::debug!("block {block} knocked loose");
                physics.set_gravity_scale(body, data.falling_gravity_scale);
            }
        }
        effects.push(Effect::Sound(SoundEffect::BlockHit));
    }

    fn paddle_touches_block(
        &mut self,
        block: EntityId,
        entities: &mut EntityStore,
        physics: &PhysicsWorld,
        effects: &mut Vec<Effect>,
    ) {
        let Some(entity) = entities.get(block) else {
            return;
        };
        let Some(score) = entity.block().map(|b| b.score) else {
            return;
        };
        let placement = entity.body().and_then(|b| physics.placement(b));
        let at = placement.map_or(entity.position(), |(position, _)| position);
        let falling = entity
            .body()
            .and_then(|b| physics.gravity_scale(b))
            .is_some_and(|scale| scale > 0.0);

        self.resolved.insert(block);
        if falling {
            entities.kill(block);
            effects.push(Effect::Score {
                delta: score.saturating_mul(self.config.catch_multiplier),
                at,
            });
            effects.push(Effect::Sound(SoundEffect::BlockCaught));
        } else {
            effects.push(Effect::Score { delta: -score, at });
            effects.push(Effect::Glare);
            effects.push(Effect::Sound(SoundEffect::Penalty));
        }
    }

    /// Energy removed by a ball impact; any damaging impact costs at least 1
    fn damage(&self, impulse: f32) -> u32 {
        ((impulse * self.config.damage_per_impulse).ceil() as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::entity::{BlockData, Entity, EntityData, PaddleData};
    use crate::sim::level::Material;
    use crate::sim::physics::{BodyKind, BodySpec, Layer, Shape, WorldConfig};

    struct Fixture {
        physics: PhysicsWorld,
        entities: EntityStore,
        resolver: CollisionResolver,
    }

    impl Fixture {
        fn new() -> Self {
            let physics = PhysicsWorld::new(&WorldConfig {
                gravity: DEFAULT_GRAVITY,
                velocity_iterations: 4,
                position_iterations: 1,
                contact_capacity: 64,
                particles_hit_ball: false,
            });
            Self {
                physics,
                entities: EntityStore::new(),
                resolver: CollisionResolver::new(ResolverConfig::from(&Settings::default())),
            }
        }

        fn add(&mut self, data: EntityData, layer: Layer, gravity_scale: f32) -> EntityId {
            let id = self.entities.allocate_id();
            let kind = data.kind();
            let body = self.physics.create_body(
                &BodySpec::new(id, BodyKind::Dynamic, Vec2::new(5.0, 5.0), layer)
                    .shape(Shape::Box {
                        half_extents: Vec2::new(0.5, 0.5),
                    })
                    .material(Material::default_for(kind))
                    .gravity_scale(gravity_scale),
            );
            self.entities
                .spawn(Entity::new(id, data, 0.0).with_body(body));
            self.entities.merge_pending();
            id
        }

        fn block(&mut self, energy: u32, score: i64) -> EntityId {
            self.add(
                EntityData::Block(BlockData {
                    tile_id: 1,
                    energy,
                    score,
                    falling_gravity_scale: 1.0,
                    min_impulse_for_damage: 0.1,
                    min_impulse_for_kill: 50.0,
                    fixed: false,
                }),
                Layer::Block,
                0.0,
            )
        }

        fn paddle(&mut self) -> EntityId {
            let id = self.entities.allocate_id();
            let carriage = self.physics.create_body(&BodySpec::new(
                id,
                BodyKind::Kinematic,
                Vec2::ZERO,
                Layer::Paddle,
            ));
            let arm = self.physics.create_body(
                &BodySpec::new(id, BodyKind::Dynamic, Vec2::ZERO, Layer::Paddle).shape(
                    Shape::Box {
                        half_extents: Vec2::new(PADDLE_HALF_WIDTH, PADDLE_HALF_HEIGHT),
                    },
                ),
            );
            let hinge = self.physics.create_hinge(carriage, arm, PADDLE_MAX_TILT);
            self.entities.spawn(
                Entity::new(id, EntityData::Paddle(PaddleData { carriage, hinge }), 0.0)
                    .with_body(arm),
            );
            self.entities.merge_pending();
            id
        }

        fn resolve(&mut self, contacts: &[ContactEvent]) -> Vec<Effect> {
            self.resolver
                .resolve(contacts, &mut self.entities, &mut self.physics)
        }
    }

    fn score_deltas(effects: &[Effect]) -> Vec<i64> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Score { delta, .. } => Some(*delta),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_block_resolved_once_per_step() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let block = fx.block(1, 100);

        let hit = ContactEvent::touch(ball, block, Vec2::ZERO).with_impulse(5.0);
        let effects = fx.resolve(&[hit.clone(), hit.clone(), hit]);

        assert_eq!(score_deltas(&effects), vec![100]);
        let shattered = effects
            .iter()
            .filter(|e| matches!(e, Effect::BlockShattered { .. }))
            .count();
        assert_eq!(shattered, 1);
        assert_eq!(fx.entities.drain_kills().len(), 1);
    }

    #[test]
    fn test_dead_entities_ignored() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let block = fx.block(1, 100);
        fx.entities.kill(block);

        let hit = ContactEvent::touch(ball, block, Vec2::ZERO).with_impulse(5.0);
        assert!(fx.resolve(&[hit]).is_empty());
        let stranger = ContactEvent::touch(ball, EntityId(999), Vec2::ZERO).with_impulse(5.0);
        assert!(fx.resolve(&[stranger]).is_empty());
    }

    #[test]
    fn test_weak_hit_only_dislodges() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let block = fx.block(DEFAULT_BLOCK_ENERGY, 100);

        // Below the damage threshold nothing happens
        let tap = ContactEvent::touch(ball, block, Vec2::ZERO).with_impulse(0.05);
        assert!(fx.resolve(&[tap]).is_empty());

        let hit = ContactEvent::touch(block, ball, Vec2::ZERO).with_impulse(1.0);
        let effects = fx.resolve(&[hit]);
        assert_eq!(effects, vec![Effect::Sound(SoundEffect::BlockHit)]);

        let entity = fx.entities.get(block).unwrap();
        assert!(entity.is_alive());
        assert!(entity.energy().unwrap() < DEFAULT_BLOCK_ENERGY);
        let body = entity.body().unwrap();
        assert_eq!(fx.physics.gravity_scale(body), Some(1.0));
    }

    #[test]
    fn test_kill_impulse_destroys_outright() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let block = fx.block(u32::MAX, 40);

        let smash = ContactEvent::touch(ball, block, Vec2::ZERO).with_impulse(60.0);
        let effects = fx.resolve(&[smash]);
        assert_eq!(score_deltas(&effects), vec![40]);
        assert!(!fx.entities.is_alive(block));
    }

    #[test]
    fn test_paddle_knocks_anchored_block() {
        let mut fx = Fixture::new();
        let paddle_id = fx.paddle();

        let block = fx.block(DEFAULT_BLOCK_ENERGY, 100);
        let touch = ContactEvent::touch(paddle_id, block, Vec2::ZERO);

        // Anchored: penalty, block survives
        let effects = fx.resolve(&[touch.clone()]);
        assert_eq!(score_deltas(&effects), vec![-100]);
        assert!(effects.contains(&Effect::Glare));
        assert!(effects.contains(&Effect::Sound(SoundEffect::Penalty)));
        assert!(fx.entities.is_alive(block));

        // Impulse-only reports of an ongoing touch are ignored
        assert!(fx.resolve(&[touch.clone().with_impulse(3.0)]).is_empty());

        // Knocked loose: caught for a bonus
        let body = fx.entities.get(block).unwrap().body().unwrap();
        fx.physics.set_gravity_scale(body, 1.0);
        let effects = fx.resolve(&[touch]);
        assert_eq!(score_deltas(&effects), vec![200]);
        assert!(effects.contains(&Effect::Sound(SoundEffect::BlockCaught)));
        assert!(!fx.entities.is_alive(block));
    }

    #[test]
    fn test_paddle_hit_audible_above_threshold() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let paddle = fx.paddle();
        let threshold = Settings::default().paddle_hit_audible_impulse;

        let quiet = ContactEvent::touch(ball, paddle, Vec2::ZERO).with_impulse(threshold * 0.9);
        assert!(fx.resolve(&[quiet]).is_empty());

        let loud = ContactEvent::touch(paddle, ball, Vec2::ZERO).with_impulse(threshold * 1.1);
        assert_eq!(
            fx.resolve(&[loud]),
            vec![Effect::Sound(SoundEffect::PaddleHit)]
        );
        // Neither contact touches energy or liveness
        assert!(fx.entities.is_alive(ball));
        assert_eq!(fx.entities.get(ball).unwrap().energy(), Some(BALL_ENERGY));
    }

    #[test]
    fn test_ball_lost_on_ground() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let ground = fx.add(EntityData::Ground, Layer::Ground, 0.0);

        let effects = fx.resolve(&[ContactEvent::touch(ground, ball, Vec2::ZERO)]);
        assert!(effects.contains(&Effect::Sound(SoundEffect::BallLost)));
        assert!(effects.contains(&Effect::Glare));
        assert_eq!(fx.entities.get(ball).unwrap().energy(), Some(0));
        let kills = fx.entities.drain_kills();
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].kind, EntityKind::Ball);
    }

    #[test]
    fn test_block_falls_out_without_score() {
        let mut fx = Fixture::new();
        let block = fx.block(DEFAULT_BLOCK_ENERGY, 100);
        let ground = fx.add(EntityData::Ground, Layer::Ground, 0.0);

        let effects = fx.resolve(&[ContactEvent::touch(block, ground, Vec2::ZERO)]);
        assert!(effects.is_empty());
        assert!(!fx.entities.is_alive(block));
    }

    #[test]
    fn test_unmapped_pair_ignored() {
        let mut fx = Fixture::new();
        let ball = fx.add(EntityData::Ball { energy: BALL_ENERGY }, Layer::Ball, 1.0);
        let wall = fx.add(EntityData::Wall, Layer::Boundary, 0.0);

        let bounce = ContactEvent::touch(ball, wall, Vec2::ZERO).with_impulse(9.0);
        assert!(fx.resolve(&[bounce]).is_empty());
        assert!(fx.entities.is_alive(wall));
    }
}
