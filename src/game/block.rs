//! The live falling piece
//!
//! A `Block` owns exactly one simulated body. Geometry is never cached: bounds
//! are read back from the simulation whenever asked for.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::template::{BlockTemplate, Color};
use crate::consts::{BOMB_ID, PIVOT_SHIFT};
use crate::physics::{Aabb, BodyHandle, Simulation};

/// Number of quarter turns in a full rotation
pub const ROTATIONS_PER_TURN: u32 = 4;

/// Player commands applied to the moving piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveCommand {
    Left,
    Right,
    SoftDrop,
    Rotate,
}

/// Everything needed to put a recreated piece back exactly where it was
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformSnapshot {
    pub position: Vec2,
    pub angle: f32,
    pub times_rotated: u32,
}

/// Position shift applied before each -90° turn.
///
/// The engine turns a body about its local origin, while template cells sit
/// in a 4x4 box centred on (2, 2). Shifting by this offset first makes the
/// piece turn in place. The offset is the vector (0, 4) carried through the
/// piece's current orientation, so it cycles up, right, down, left and the
/// four shifts cancel over a full turn.
pub fn pivot_offset(times_rotated: u32) -> Vec2 {
    const OFFSETS: [Vec2; ROTATIONS_PER_TURN as usize] = [
        Vec2::new(0.0, PIVOT_SHIFT),
        Vec2::new(PIVOT_SHIFT, 0.0),
        Vec2::new(0.0, -PIVOT_SHIFT),
        Vec2::new(-PIVOT_SHIFT, 0.0),
    ];
    OFFSETS[(times_rotated % ROTATIONS_PER_TURN) as usize]
}

/// The moving piece
#[derive(Debug, PartialEq)]
pub struct Block {
    template_id: usize,
    color: Color,
    cell_count: usize,
    times_rotated: u32,
    body: BodyHandle,
}

impl Block {
    pub(crate) fn new(template: &BlockTemplate, body: BodyHandle) -> Self {
        Self {
            template_id: template.id,
            color: template.color,
            cell_count: template.cells.len(),
            times_rotated: 0,
            body,
        }
    }

    pub fn template_id(&self) -> usize {
        self.template_id
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn is_bomb(&self) -> bool {
        self.template_id == BOMB_ID
    }

    pub fn times_rotated(&self) -> u32 {
        self.times_rotated
    }

    pub fn set_times_rotated(&mut self, times_rotated: u32) {
        self.times_rotated = times_rotated;
    }

    /// Union of all cell bounds
    pub fn bounding_box<S: Simulation + ?Sized>(&self, sim: &S) -> Option<Aabb> {
        sim.body_aabb(self.body)
    }

    /// Bounds of each cell, in template order
    pub fn cell_boxes<S: Simulation + ?Sized>(&self, sim: &S) -> Vec<Aabb> {
        sim.fixture_aabbs(self.body)
    }

    pub fn velocity<S: Simulation + ?Sized>(&self, sim: &S) -> Vec2 {
        sim.linear_velocity(self.body).unwrap_or(Vec2::ZERO)
    }

    pub fn snapshot<S: Simulation + ?Sized>(&self, sim: &S) -> Option<TransformSnapshot> {
        sim.transform(self.body).map(|t| TransformSnapshot {
            position: t.position,
            angle: t.angle,
            times_rotated: self.times_rotated,
        })
    }

    /// Put the body (and rotation count) back to a snapshot
    pub fn restore<S: Simulation + ?Sized>(&mut self, sim: &mut S, snapshot: &TransformSnapshot) {
        sim.set_transform(self.body, snapshot.position, snapshot.angle);
        self.times_rotated = snapshot.times_rotated;
    }

    /// Release the body. The block is gone afterwards.
    pub fn destroy<S: Simulation + ?Sized>(self, sim: &mut S) -> bool {
        sim.destroy_body(self.body)
    }
}
