//! Game entities
//!
//! An entity is a closed tagged variant: a shared lifecycle shell (identity,
//! alive/visible flags, age, body handle, render transform) around a
//! per-kind payload. Behaviour that differs by kind is a `match` on the
//! payload; static per-kind facts live in [`KindTraits`].
//!
//! Kill notifications are queued records, not callbacks: [`EntityStore::kill`]
//! appends a [`KillEvent`] the state machine drains once per step.

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec2;
use rapier2d::prelude::{ImpulseJointHandle, RigidBodyHandle};
use serde::{Deserialize, Serialize};

use super::physics::PhysicsWorld;
use crate::consts::*;
use crate::renderer::{Drawable, Sprite};

/// Stable entity identifier, never reused within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn to_user_data(self) -> u128 {
        u128::from(self.0)
    }

    /// Bodies without an owner carry user data 0
    pub fn from_user_data(data: u128) -> Option<Self> {
        u64::try_from(data).ok().filter(|&raw| raw != 0).map(Self)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Ball,
    Block,
    Paddle,
    Wall,
    Ground,
    Particle,
    Text,
}

/// Static facts about a kind
#[derive(Debug, Clone, Copy)]
pub struct KindTraits {
    /// Draw order; lower draws first
    pub z_index: i32,
    /// Carries energy and can be hit
    pub destructible: bool,
    /// Starts visible
    pub visible: bool,
}

impl EntityKind {
    pub const fn traits(self) -> KindTraits {
        match self {
            EntityKind::Ground => KindTraits {
                z_index: 0,
                destructible: false,
                visible: false,
            },
            EntityKind::Wall => KindTraits {
                z_index: 1,
                destructible: false,
                visible: true,
            },
            EntityKind::Block => KindTraits {
                z_index: 2,
                destructible: true,
                visible: true,
            },
            EntityKind::Particle => KindTraits {
                z_index: 3,
                destructible: false,
                visible: true,
            },
            EntityKind::Paddle => KindTraits {
                z_index: 4,
                destructible: false,
                visible: true,
            },
            EntityKind::Ball => KindTraits {
                z_index: 5,
                destructible: true,
                visible: true,
            },
            EntityKind::Text => KindTraits {
                z_index: 10,
                destructible: false,
                visible: true,
            },
        }
    }
}

/// Block payload, resolved from the tile's parameters at spawn
#[derive(Debug, Clone, PartialEq)]
pub struct BlockData {
    pub tile_id: u32,
    pub energy: u32,
    /// Points for destroying it
    pub score: i64,
    /// Gravity scale once knocked loose
    pub falling_gravity_scale: f32,
    pub min_impulse_for_damage: f32,
    pub min_impulse_for_kill: f32,
    pub fixed: bool,
}

/// Paddle payload: the kinematic carriage and the hinge holding the paddle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleData {
    pub carriage: RigidBodyHandle,
    pub hinge: ImpulseJointHandle,
}

/// Per-kind payload
#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    Ball { energy: u32 },
    Block(BlockData),
    Paddle(PaddleData),
    Wall,
    Ground,
    Particle,
    Text { text: String },
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Ball { .. } => EntityKind::Ball,
            EntityData::Block(_) => EntityKind::Block,
            EntityData::Paddle(_) => EntityKind::Paddle,
            EntityData::Wall => EntityKind::Wall,
            EntityData::Ground => EntityKind::Ground,
            EntityData::Particle => EntityKind::Particle,
            EntityData::Text { .. } => EntityKind::Text,
        }
    }
}

/// Record queued when an entity dies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KillEvent {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
}

/// A game object
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    data: EntityData,
    alive: bool,
    visible: bool,
    /// Simulation time at spawn (seconds)
    born: f64,
    lifetime: Option<f64>,
    body: Option<RigidBodyHandle>,
    position: Vec2,
    rotation: f32,
    half_extents: Vec2,
    alpha: f32,
}

impl Entity {
    pub fn new(id: EntityId, data: EntityData, born: f64) -> Self {
        let visible = data.kind().traits().visible;
        Self {
            id,
            data,
            alive: true,
            visible,
            born,
            lifetime: None,
            body: None,
            position: Vec2::ZERO,
            rotation: 0.0,
            half_extents: Vec2::ZERO,
            alpha: 1.0,
        }
    }

    pub fn with_body(mut self, body: RigidBodyHandle) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_lifetime(mut self, seconds: f64) -> Self {
        self.lifetime = Some(seconds);
        self
    }

    pub fn placed(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn sized(mut self, half_extents: Vec2) -> Self {
        self.half_extents = half_extents;
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    pub fn data(&self) -> &EntityData {
        &self.data
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.born
    }

    pub fn lifetime(&self) -> Option<f64> {
        self.lifetime
    }

    pub fn block(&self) -> Option<&BlockData> {
        match &self.data {
            EntityData::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn paddle(&self) -> Option<PaddleData> {
        match self.data {
            EntityData::Paddle(paddle) => Some(paddle),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            EntityData::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Remaining energy of destructible kinds
    pub fn energy(&self) -> Option<u32> {
        match &self.data {
            EntityData::Ball { energy } => Some(*energy),
            EntityData::Block(block) => Some(block.energy),
            _ => None,
        }
    }

    /// Subtract `amount` from energy, clamping at zero.
    ///
    /// Returns true when the resulting energy is zero. Kinds without energy
    /// are never destroyed by hits.
    pub fn hit(&mut self, amount: u32) -> bool {
        if !self.kind().traits().destructible {
            return false;
        }
        let energy = match &mut self.data {
            EntityData::Ball { energy } => energy,
            EntityData::Block(block) => &mut block.energy,
            _ => return false,
        };
        *energy = energy.saturating_sub(amount);
        *energy == 0
    }

    /// Drain all remaining energy
    pub fn lethal_hit(&mut self) -> bool {
        self.hit(u32::MAX)
    }

    /// One-way transition to dead.
    ///
    /// Yields the kill record only on the first call; later calls are no-ops.
    pub fn kill(&mut self) -> Option<KillEvent> {
        if !self.alive {
            return None;
        }
        self.alive = false;
        self.visible = false;
        Some(KillEvent {
            id: self.id,
            kind: self.kind(),
            position: self.position,
        })
    }

    /// Per-frame update: mirror the body, run kind effects, expire by age
    pub fn update(&mut self, dt: f32, now: f64, physics: &mut PhysicsWorld) -> Option<KillEvent> {
        if !self.alive {
            return None;
        }

        if let Some((position, rotation)) = self.body.and_then(|b| physics.placement(b)) {
            self.position = position;
            self.rotation = rotation;
        }

        let fade = self
            .lifetime
            .map(|lifetime| (1.0 - self.age(now) / lifetime).clamp(0.0, 1.0) as f32);

        match &self.data {
            EntityData::Ball { .. } => {
                if let Some(body) = self.body {
                    if let Some(velocity) = physics.velocity(body) {
                        if velocity.length() > BALL_MAX_SPEED {
                            physics.set_velocity(body, velocity.clamp_length_max(BALL_MAX_SPEED));
                        }
                    }
                }
            }
            EntityData::Particle => {
                if let Some(fade) = fade {
                    self.alpha = fade;
                }
            }
            EntityData::Text { .. } => {
                self.position.y += TEXT_RISE_SPEED * dt;
                if let Some(fade) = fade {
                    self.alpha = fade;
                }
            }
            EntityData::Block(_)
            | EntityData::Paddle(_)
            | EntityData::Wall
            | EntityData::Ground => {}
        }

        match self.lifetime {
            Some(lifetime) if self.age(now) > lifetime => self.kill(),
            _ => None,
        }
    }

    /// Destroy the entity's bodies in the world. Safe to call more than once.
    pub fn remove(&mut self, physics: &mut PhysicsWorld) {
        if let EntityData::Paddle(paddle) = &self.data {
            if physics.contains(paddle.carriage) {
                physics.remove_body(paddle.carriage);
            }
        }
        if let Some(body) = self.body.take() {
            physics.remove_body(body);
        }
    }

    /// Drop body handles without touching the world (the world is going away)
    fn forget_body(&mut self) {
        self.body = None;
    }
}

impl Drawable for Entity {
    fn z_index(&self) -> i32 {
        self.kind().traits().z_index
    }

    fn sprite(&self) -> Sprite<'_> {
        Sprite {
            id: self.id,
            kind: self.kind(),
            tile_id: self.block().map(|b| b.tile_id),
            position: self.position,
            rotation: self.rotation,
            half_extents: self.half_extents,
            alpha: self.alpha,
            text: self.text(),
        }
    }
}

/// Live entity collection with staged additions and a kill queue.
///
/// New entities are staged and only join the live set on
/// [`EntityStore::merge_pending`], so spawning during an update pass never
/// disturbs the iteration.
#[derive(Debug)]
pub struct EntityStore {
    live: BTreeMap<EntityId, Entity>,
    pending: Vec<Entity>,
    kills: Vec<KillEvent>,
    next_id: u64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            pending: Vec::new(),
            kills: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a fresh id (monotonic, survives resets)
    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Stage an entity; it becomes visible to lookups after the next merge
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.pending.push(entity);
        id
    }

    pub fn merge_pending(&mut self) {
        for entity in self.pending.drain(..) {
            self.live.insert(entity.id(), entity);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.live.get_mut(&id)
    }

    /// Live entity that hasn't died yet
    pub fn alive(&self, id: EntityId) -> Option<&Entity> {
        self.get(id).filter(|e| e.is_alive())
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.alive(id).is_some()
    }

    /// Kill an entity, queueing its kill record. Returns false if it was
    /// already dead or unknown.
    pub fn kill(&mut self, id: EntityId) -> bool {
        match self.live.get_mut(&id).and_then(Entity::kill) {
            Some(event) => {
                self.kills.push(event);
                true
            }
            None => false,
        }
    }

    /// Take the queued kill records in the order they happened
    pub fn drain_kills(&mut self) -> Vec<KillEvent> {
        std::mem::take(&mut self.kills)
    }

    /// Update every live entity
    pub fn update(&mut self, dt: f32, now: f64, physics: &mut PhysicsWorld) {
        for entity in self.live.values_mut() {
            if let Some(event) = entity.update(dt, now, physics) {
                self.kills.push(event);
            }
        }
    }

    /// Remove dead entities and their bodies. Returns how many went.
    pub fn purge_dead(&mut self, physics: &mut PhysicsWorld) -> usize {
        let dead: Vec<EntityId> = self
            .live
            .values()
            .filter(|e| !e.is_alive())
            .map(Entity::id)
            .collect();
        for id in &dead {
            if let Some(mut entity) = self.live.remove(id) {
                entity.remove(physics);
            }
        }
        dead.len()
    }

    /// Forget everything because the world itself is being replaced
    pub fn reset(&mut self) {
        self.merge_pending();
        for entity in self.live.values_mut() {
            entity.forget_body();
        }
        self.live.clear();
        self.kills.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.live.values()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn count_alive(&self, kind: EntityKind) -> usize {
        self.iter().filter(|e| e.is_alive() && e.kind() == kind).count()
    }
}
