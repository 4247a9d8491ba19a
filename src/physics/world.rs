//! Rapier-backed world
//!
//! One rapier rigid body per [`BodyHandle`], one cuboid collider per
//! [`BoxShape`]. Gravity is zero: pieces fall because the board gives them a
//! constant velocity. Piece rotation is locked; only the board turns a piece,
//! by teleporting it.
//!
//! Collision events are collected on a channel during the rapier step and
//! replayed to the [`ContactListener`] afterwards, sorted by fixture so
//! identical inputs report identically.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use glam::Vec2;
use rapier2d::prelude::*;

use super::{
    Aabb, BodyDef, BodyHandle, BodyKind, BoxShape, Contact, ContactListener, FixtureHandle,
    OwnerTag, Simulation, StepConfig, Transform,
};

struct Entry {
    handle: RigidBodyHandle,
    owner: Option<OwnerTag>,
    colliders: Vec<ColliderHandle>,
}

/// Rigid-body world driven by rapier2d
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector<Real>,

    bodies: BTreeMap<u32, Entry>,
    fixtures: HashMap<ColliderHandle, FixtureHandle>,
    next_id: u32,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.rigid_body_set.len())
            .field("colliders", &self.collider_set.len())
            .finish()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: vector![0.0, 0.0],
            bodies: BTreeMap::new(),
            fixtures: HashMap::new(),
            next_id: 0,
        }
    }

    fn rigid_body(&self, body: BodyHandle) -> Option<&RigidBody> {
        let entry = self.bodies.get(&body.0)?;
        self.rigid_body_set.get(entry.handle)
    }

    fn rigid_body_mut(&mut self, body: BodyHandle) -> Option<&mut RigidBody> {
        let entry = self.bodies.get(&body.0)?;
        self.rigid_body_set.get_mut(entry.handle)
    }

    /// Bounds from the body's current pose. Collider poses only catch up on
    /// the next step, so a teleport between steps would otherwise go unseen.
    fn collider_aabb(rb: &RigidBody, collider: &Collider) -> Aabb {
        let local = collider
            .position_wrt_parent()
            .copied()
            .unwrap_or_else(Isometry::identity);
        collider.shape().compute_aabb(&(rb.position() * local))
    }

    fn contact_for(&self, a: FixtureHandle, b: FixtureHandle) -> Contact {
        let (fixture_a, fixture_b) = if a <= b { (a, b) } else { (b, a) };
        Contact {
            fixture_a,
            fixture_b,
            owner_a: self.owner(fixture_a.body),
            owner_b: self.owner(fixture_b.body),
        }
    }

    fn apply_config(&mut self, config: &StepConfig) {
        self.integration_params.dt = config.dt;
        self.integration_params.num_solver_iterations =
            NonZeroUsize::new(config.velocity_iterations as usize).unwrap_or(NonZeroUsize::MIN);
        self.integration_params.num_internal_pgs_iterations =
            (config.position_iterations as usize).max(1);
    }
}

impl Simulation for PhysicsWorld {
    fn create_body(&mut self, def: &BodyDef, shapes: &[BoxShape]) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;

        let position = Isometry::new(vector![def.position.x, def.position.y], def.angle);
        let rb = match def.kind {
            BodyKind::Static => RigidBodyBuilder::fixed().position(position),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .position(position)
                .linvel(vector![def.linear_velocity.x, def.linear_velocity.y])
                .lock_rotations()
                .can_sleep(false),
        }
        .build();
        let rb_handle = self.rigid_body_set.insert(rb);

        let mut colliders = Vec::with_capacity(shapes.len());
        for (index, shape) in shapes.iter().enumerate() {
            let collider = ColliderBuilder::cuboid(shape.half_extents.x, shape.half_extents.y)
                .translation(vector![shape.center.x, shape.center.y])
                .friction(0.0)
                .restitution(0.0)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build();
            let collider_handle =
                self.collider_set
                    .insert_with_parent(collider, rb_handle, &mut self.rigid_body_set);
            self.fixtures.insert(
                collider_handle,
                FixtureHandle {
                    body: handle,
                    index: index as u32,
                },
            );
            colliders.push(collider_handle);
        }

        self.bodies.insert(
            handle.0,
            Entry {
                handle: rb_handle,
                owner: def.owner,
                colliders,
            },
        );
        handle
    }

    fn destroy_body(&mut self, body: BodyHandle) -> bool {
        let Some(entry) = self.bodies.remove(&body.0) else {
            return false;
        };
        for collider in &entry.colliders {
            self.fixtures.remove(collider);
        }
        self.rigid_body_set.remove(
            entry.handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        true
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body.0)
    }

    fn owner(&self, body: BodyHandle) -> Option<OwnerTag> {
        self.bodies.get(&body.0).and_then(|e| e.owner)
    }

    fn step(&mut self, config: &StepConfig, listener: &mut dyn ContactListener) {
        self.apply_config(config);

        let (collision_send, collision_recv) = rapier2d::crossbeam::channel::unbounded();
        let (force_send, _force_recv) = rapier2d::crossbeam::channel::unbounded();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &event_handler,
        );

        let mut begins = Vec::new();
        let mut ends = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            let (h1, h2, started) = match event {
                CollisionEvent::Started(h1, h2, _) => (h1, h2, true),
                CollisionEvent::Stopped(h1, h2, _) => (h1, h2, false),
            };
            // Colliders of destroyed bodies are already unmapped
            let (Some(&a), Some(&b)) = (self.fixtures.get(&h1), self.fixtures.get(&h2)) else {
                continue;
            };
            let contact = self.contact_for(a, b);
            if started {
                begins.push(contact);
            } else {
                ends.push(contact);
            }
        }

        let key = |c: &Contact| (c.fixture_a, c.fixture_b);
        begins.sort_by_key(key);
        ends.sort_by_key(key);
        for contact in &begins {
            listener.begin_contact(contact);
        }
        for contact in &ends {
            listener.end_contact(contact);
        }
    }

    fn transform(&self, body: BodyHandle) -> Option<Transform> {
        self.rigid_body(body).map(|rb| {
            let t = rb.translation();
            Transform::new(Vec2::new(t.x, t.y), rb.rotation().angle())
        })
    }

    fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_position(Isometry::new(vector![position.x, position.y], angle), true);
        }
    }

    fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body(body).map(|rb| {
            let v = rb.linvel();
            Vec2::new(v.x, v.y)
        })
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(rb) = self.rigid_body_mut(body) {
            if rb.is_dynamic() {
                rb.set_linvel(vector![velocity.x, velocity.y], true);
            }
        }
    }

    fn fixture_aabbs(&self, body: BodyHandle) -> Vec<Aabb> {
        let (Some(entry), Some(rb)) = (self.bodies.get(&body.0), self.rigid_body(body)) else {
            return Vec::new();
        };
        entry
            .colliders
            .iter()
            .filter_map(|&h| self.collider_set.get(h))
            .map(|collider| Self::collider_aabb(rb, collider))
            .collect()
    }

    fn fixtures(&self, body: BodyHandle) -> Vec<FixtureHandle> {
        self.bodies
            .get(&body.0)
            .map(|entry| {
                entry
                    .colliders
                    .iter()
                    .filter_map(|h| self.fixtures.get(h).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    fn fixture_count(&self) -> usize {
        self.collider_set.len()
    }
}
