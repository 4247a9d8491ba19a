//! Rigid-body simulation contract
//!
//! The board never touches engine internals. Everything it needs from physics
//! goes through [`Simulation`]:
//! - create/destroy bodies made of box fixtures
//! - tag a body with an opaque owner at creation
//! - advance by a fixed delta with configurable solver iterations
//! - query transform, velocity and bounds
//! - receive begin/end contact notifications synchronously during `step`
//!
//! [`PhysicsWorld`] wraps rapier2d. Bounds are parry's [`Aabb`], the same
//! type rapier computes for its colliders.

pub mod world;

pub use rapier2d::parry::bounding_volume::Aabb;
pub use world::PhysicsWorld;

use glam::Vec2;
use rapier2d::parry::bounding_volume::BoundingVolume;
use serde::{Deserialize, Serialize};

/// Handle to a simulated body. Handles are never reused within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub(crate) u32);

/// Handle to one fixture (collision box) of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixtureHandle {
    pub body: BodyHandle,
    pub index: u32,
}

/// Opaque tag attached to a body so contact routing can find its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerTag(u64);

impl OwnerTag {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// How the engine treats a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves; only dynamic bodies are pushed out of it
    Static,
    /// Integrated every step
    Dynamic,
}

/// Box-shaped fixture in body-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl BoxShape {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Square box of edge `size` centred in the unit cell at (`col`, `row`)
    pub fn cell(col: f32, row: f32, size: f32) -> Self {
        Self::new(
            Vec2::new(col + 0.5, row + 0.5),
            Vec2::splat(size / 2.0),
        )
    }
}

/// Body creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub owner: Option<OwnerTag>,
}

impl BodyDef {
    pub fn new_static(position: Vec2) -> Self {
        Self {
            kind: BodyKind::Static,
            position,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            owner: None,
        }
    }

    pub fn new_dynamic(position: Vec2, linear_velocity: Vec2) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            position,
            angle: 0.0,
            linear_velocity,
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: OwnerTag) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Position and orientation of a body (angle in radians, rotation about the
/// body's local origin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub angle: f32,
}

impl Transform {
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }
}

/// Fixed-step advance parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub dt: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

/// A pair of fixtures that started or stopped touching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub fixture_a: FixtureHandle,
    pub fixture_b: FixtureHandle,
    pub owner_a: Option<OwnerTag>,
    pub owner_b: Option<OwnerTag>,
}

impl Contact {
    pub fn body_a(&self) -> BodyHandle {
        self.fixture_a.body
    }

    pub fn body_b(&self) -> BodyHandle {
        self.fixture_b.body
    }
}

/// Receives contact notifications from inside [`Simulation::step`]
pub trait ContactListener {
    fn begin_contact(&mut self, contact: &Contact);

    fn end_contact(&mut self, _contact: &Contact) {}
}

/// Narrow contract the board depends on
pub trait Simulation {
    /// Create a body with one fixture per shape
    fn create_body(&mut self, def: &BodyDef, shapes: &[BoxShape]) -> BodyHandle;

    /// Destroy a body and its fixtures. Returns false for an unknown handle.
    fn destroy_body(&mut self, body: BodyHandle) -> bool;

    fn contains(&self, body: BodyHandle) -> bool;

    fn owner(&self, body: BodyHandle) -> Option<OwnerTag>;

    /// Advance the whole world. Contact callbacks fire before this returns.
    fn step(&mut self, config: &StepConfig, listener: &mut dyn ContactListener);

    fn transform(&self, body: BodyHandle) -> Option<Transform>;

    fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32);

    fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2>;

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2);

    /// World-space bounds of every fixture, in creation order
    fn fixture_aabbs(&self, body: BodyHandle) -> Vec<Aabb>;

    fn fixtures(&self, body: BodyHandle) -> Vec<FixtureHandle>;

    /// Union of the body's fixture bounds
    fn body_aabb(&self, body: BodyHandle) -> Option<Aabb> {
        self.fixture_aabbs(body)
            .into_iter()
            .reduce(|acc, aabb| acc.merged(&aabb))
    }

    fn body_count(&self) -> usize;

    fn fixture_count(&self) -> usize;
}
