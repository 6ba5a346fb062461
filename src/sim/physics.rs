//! Rigid-body world
//!
//! Wraps a rapier2d pipeline. The world owns every body, collider and joint;
//! entities only hold handles. Each rapier body carries its owning
//! [`EntityId`] in `user_data` so contacts map straight back to entities.
//!
//! Contacts are collected in two phases: rapier's event collector fills
//! channels during `step`, and the events are converted into a bounded
//! [`ContactEvent`] buffer once the step returns. Gameplay never runs inside
//! the solver.

use glam::Vec2;
use rapier2d::crossbeam::channel::unbounded;
use rapier2d::prelude::*;

use super::entity::EntityId;
use super::level::Material;
use crate::{from_rapier, to_rapier};

/// Hinge spring used to level the paddle when no kick is active
const HINGE_STIFFNESS: f32 = 400.0;
const HINGE_DAMPING: f32 = 40.0;
/// Motor strength while kicking
const HINGE_MOTOR_FACTOR: f32 = 60.0;

/// Collision layer an entity's collider lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ball,
    Paddle,
    Block,
    Particle,
    Boundary,
    Ground,
}

impl Layer {
    fn membership(self) -> Group {
        match self {
            Layer::Ball => Group::GROUP_1,
            Layer::Paddle => Group::GROUP_2,
            Layer::Block => Group::GROUP_3,
            Layer::Particle => Group::GROUP_4,
            Layer::Boundary => Group::GROUP_5,
            Layer::Ground => Group::GROUP_6,
        }
    }

    /// Layers this one collides with
    fn filter(self, particles_hit_ball: bool) -> Group {
        let ball = Layer::Ball.membership();
        let paddle = Layer::Paddle.membership();
        let block = Layer::Block.membership();
        let particle = Layer::Particle.membership();
        let boundary = Layer::Boundary.membership();
        let ground = Layer::Ground.membership();
        match self {
            Layer::Ball if particles_hit_ball => paddle | block | boundary | ground | particle,
            Layer::Ball => paddle | block | boundary | ground,
            Layer::Paddle => ball | block | boundary | particle,
            // Debris spawns inside the block it came from
            Layer::Block => ball | paddle | block | boundary | ground,
            Layer::Particle if particles_hit_ball => ball | paddle | boundary,
            Layer::Particle => paddle | boundary,
            Layer::Boundary => ball | paddle | block | particle,
            Layer::Ground => ball | block,
        }
    }

    pub fn groups(self, particles_hit_ball: bool) -> InteractionGroups {
        InteractionGroups::new(self.membership(), self.filter(particles_hit_ball))
    }
}

/// How the solver treats a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Fixed,
    /// Moved by setting its velocity
    Kinematic,
}

/// Collider shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { radius: f32 },
    Box { half_extents: Vec2 },
}

/// Everything needed to create a body and its collider
#[derive(Debug, Clone)]
pub struct BodySpec {
    pub owner: EntityId,
    pub kind: BodyKind,
    pub position: Vec2,
    pub linvel: Vec2,
    pub gravity_scale: f32,
    /// `None` for bodies without a collider (joint anchors)
    pub shape: Option<Shape>,
    pub material: Material,
    pub layer: Layer,
    pub sensor: bool,
    pub can_sleep: bool,
}

impl BodySpec {
    pub fn new(owner: EntityId, kind: BodyKind, position: Vec2, layer: Layer) -> Self {
        Self {
            owner,
            kind,
            position,
            linvel: Vec2::ZERO,
            gravity_scale: 1.0,
            shape: None,
            material: Material {
                density: 1.0,
                friction: 0.5,
                restitution: 0.0,
            },
            layer,
            sensor: false,
            can_sleep: true,
        }
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn linvel(mut self, linvel: Vec2) -> Self {
        self.linvel = linvel;
        self
    }

    pub fn gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    pub fn awake(mut self) -> Self {
        self.can_sleep = false;
        self
    }
}

/// One physics step's record of two touching entities
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    pub a: EntityId,
    pub b: EntityId,
    /// World-space contact point
    pub point: Vec2,
    /// Contact normal, pointing from `a` towards `b`
    pub normal: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    /// Negative while penetrating
    pub separation: f32,
    /// The pair started touching during this step
    pub began: bool,
}

impl ContactEvent {
    /// A contact carrying no impulse data (sensor overlap, test fixtures)
    pub fn touch(a: EntityId, b: EntityId, point: Vec2) -> Self {
        Self {
            a,
            b,
            point,
            normal: Vec2::ZERO,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            separation: 0.0,
            began: true,
        }
    }

    pub fn with_impulse(mut self, impulse: f32) -> Self {
        self.normal_impulse = impulse;
        self.began = false;
        self
    }
}

/// Solver and buffer settings for a world
#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    /// Downward gravity magnitude
    pub gravity: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    /// Contacts kept per step; the rest are dropped
    pub contact_capacity: usize,
    pub particles_hit_ball: bool,
}

/// The single rigid-body world of a game session
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    particles_hit_ball: bool,
    contacts: Vec<ContactEvent>,
    contact_capacity: usize,
    dropped_contacts: u64,
}

impl PhysicsWorld {
    pub fn new(config: &WorldConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        if let Some(iterations) = std::num::NonZeroUsize::new(config.velocity_iterations) {
            integration_parameters.num_solver_iterations = iterations;
        }
        integration_parameters.num_internal_stabilization_iterations = config.position_iterations;
        integration_parameters.warmstart_coefficient = 1.0;

        Self {
            gravity: vector![0.0, -config.gravity],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            particles_hit_ball: config.particles_hit_ball,
            contacts: Vec::with_capacity(config.contact_capacity),
            contact_capacity: config.contact_capacity,
            dropped_contacts: 0,
        }
    }

    /// Downward gravity magnitude
    pub fn gravity(&self) -> f32 {
        -self.gravity.y
    }

    /// Create a body (and its collider, if it has a shape)
    pub fn create_body(&mut self, spec: &BodySpec) -> RigidBodyHandle {
        let builder = match spec.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
        };
        let body = builder
            .translation(to_rapier(spec.position))
            .linvel(to_rapier(spec.linvel))
            .gravity_scale(spec.gravity_scale)
            .can_sleep(spec.can_sleep)
            .user_data(spec.owner.to_user_data())
            .build();
        let handle = self.bodies.insert(body);

        if let Some(shape) = spec.shape {
            let builder = match shape {
                Shape::Circle { radius } => ColliderBuilder::ball(radius),
                Shape::Box { half_extents } => ColliderBuilder::cuboid(half_extents.x, half_extents.y),
            };
            let events = if spec.sensor {
                ActiveEvents::COLLISION_EVENTS
            } else {
                ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS
            };
            let collider = builder
                .density(spec.material.density)
                .friction(spec.material.friction)
                .restitution(spec.material.restitution)
                .sensor(spec.sensor)
                .collision_groups(spec.layer.groups(self.particles_hit_ball))
                .active_events(events)
                .contact_force_event_threshold(0.0)
                .build();
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
        }

        handle
    }

    /// Remove a body with its colliders and joints
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        let removed = self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        if removed.is_none() {
            log::debug!("body {handle:?} was already gone");
        }
    }

    /// Join two bodies with a motorized revolute joint anchored at both origins
    pub fn create_hinge(
        &mut self,
        carrier: RigidBodyHandle,
        arm: RigidBodyHandle,
        max_angle: f32,
    ) -> ImpulseJointHandle {
        let joint = RevoluteJointBuilder::new()
            .local_anchor1(point![0.0, 0.0])
            .local_anchor2(point![0.0, 0.0])
            .limits([-max_angle, max_angle])
            .motor_position(0.0, HINGE_STIFFNESS, HINGE_DAMPING);
        self.impulse_joints.insert(carrier, arm, joint, true)
    }

    /// Spin the hinge motor at `velocity`, or spring back to level on `None`
    pub fn drive_hinge(&mut self, handle: ImpulseJointHandle, velocity: Option<f32>) {
        let Some((_, joint)) = self.impulse_joints.iter_mut().find(|(h, _)| *h == handle) else {
            return;
        };
        match velocity {
            Some(velocity) => {
                joint
                    .data
                    .set_motor_velocity(JointAxis::AngX, velocity, HINGE_MOTOR_FACTOR);
            }
            None => {
                joint
                    .data
                    .set_motor_position(JointAxis::AngX, 0.0, HINGE_STIFFNESS, HINGE_DAMPING);
            }
        }
    }

    /// Advance the simulation by `dt` seconds and buffer the step's contacts.
    ///
    /// Contacts left over from the previous step are discarded; callers drain
    /// them with [`PhysicsWorld::drain_contacts`] between steps.
    pub fn step(&mut self, dt: f32) {
        if !self.contacts.is_empty() {
            log::warn!("{} undrained contacts discarded", self.contacts.len());
            self.contacts.clear();
        }
        self.integration_parameters.dt = dt;

        let (collision_send, collision_recv) = unbounded::<CollisionEvent>();
        let (force_send, force_recv) = unbounded::<ContactForceEvent>();
        let collector = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &collector,
        );

        while let Ok(event) = collision_recv.try_recv() {
            if let CollisionEvent::Started(h1, h2, _flags) = event {
                if let Some(contact) = self.contact_between(h1, h2, 0.0, true) {
                    self.record(contact);
                }
            }
        }
        while let Ok(event) = force_recv.try_recv() {
            let impulse = event.total_force_magnitude * dt;
            if let Some(contact) = self.contact_between(event.collider1, event.collider2, impulse, false) {
                self.record(contact);
            }
        }
    }

    fn record(&mut self, contact: ContactEvent) {
        if self.contacts.len() < self.contact_capacity {
            self.contacts.push(contact);
        } else {
            self.dropped_contacts += 1;
            log::debug!("contact buffer full, dropped {} <-> {}", contact.a, contact.b);
        }
    }

    /// Build a contact record for two colliders, if both belong to entities
    fn contact_between(
        &self,
        h1: ColliderHandle,
        h2: ColliderHandle,
        normal_impulse: f32,
        began: bool,
    ) -> Option<ContactEvent> {
        let a = self.owner_of(h1)?;
        let b = self.owner_of(h2)?;

        let mut contact = ContactEvent {
            a,
            b,
            point: (self.collider_position(h1)? + self.collider_position(h2)?) * 0.5,
            normal: Vec2::ZERO,
            normal_impulse,
            tangent_impulse: 0.0,
            separation: 0.0,
            began,
        };

        if let Some(pair) = self.narrow_phase.contact_pair(h1, h2) {
            let flipped = pair.collider1 != h1;
            if let Some(manifold) = pair.manifolds.iter().find(|m| !m.points.is_empty()) {
                let normal = from_rapier(&manifold.data.normal);
                contact.normal = if flipped { -normal } else { normal };
                contact.tangent_impulse = manifold
                    .points
                    .iter()
                    .map(|p| p.data.tangent_impulse.norm())
                    .sum();
                contact.separation = manifold
                    .points
                    .iter()
                    .map(|p| p.dist)
                    .fold(f32::INFINITY, f32::min);
                if let Some(solver_contact) = manifold.data.solver_contacts.first() {
                    contact.point = Vec2::new(solver_contact.point.x, solver_contact.point.y);
                }
            }
        }

        Some(contact)
    }

    fn owner_of(&self, collider: ColliderHandle) -> Option<EntityId> {
        let parent = self.colliders.get(collider)?.parent()?;
        EntityId::from_user_data(self.bodies.get(parent)?.user_data)
    }

    fn collider_position(&self, collider: ColliderHandle) -> Option<Vec2> {
        let position = self.colliders.get(collider)?.position();
        Some(from_rapier(&position.translation.vector))
    }

    /// Hand over this step's contacts, leaving the buffer empty
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contacts)
    }

    /// Contacts dropped because the buffer was full, since creation
    pub fn dropped_contacts(&self) -> u64 {
        self.dropped_contacts
    }

    /// Position and rotation angle of a body
    pub fn placement(&self, handle: RigidBodyHandle) -> Option<(Vec2, f32)> {
        let body = self.bodies.get(handle)?;
        Some((from_rapier(body.translation()), body.rotation().angle()))
    }

    pub fn velocity(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|b| from_rapier(b.linvel()))
    }

    pub fn set_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(to_rapier(velocity), true);
        }
    }

    pub fn gravity_scale(&self, handle: RigidBodyHandle) -> Option<f32> {
        self.bodies.get(handle).map(RigidBody::gravity_scale)
    }

    pub fn set_gravity_scale(&mut self, handle: RigidBodyHandle, scale: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_gravity_scale(scale, true);
        }
    }

    pub fn is_fixed(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.get(handle).is_some_and(RigidBody::is_fixed)
    }

    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }
}
