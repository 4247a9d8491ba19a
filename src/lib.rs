//! Tetris Reloaded - falling blocks on a rigid-body simulation
//!
//! Core modules:
//! - `physics`: Simulation contract plus its rapier2d world
//! - `game`: Board controller, piece catalogs, floor grid, contact routing
//! - `settings`: Tunable heuristics and host preferences
//! - `input`: Host command vocabulary

pub mod game;
pub mod input;
pub mod physics;
pub mod settings;

pub use game::{Board, BoardEvent, Mode, ModeSelection, MoveCommand, MoveStatus};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const TIME_STEP: f32 = 1.0 / 60.0;

    /// Solver iterations for normal play (rapier solver / internal PGS)
    pub const VELOCITY_ITERATIONS: u32 = 6;
    pub const POSITION_ITERATIONS: u32 = 2;
    /// Solver iterations for disconnected mode (loose collisions)
    pub const DISCONNECT_VELOCITY_ITERATIONS: u32 = 2;
    pub const DISCONNECT_POSITION_ITERATIONS: u32 = 6;

    /// Classic board dimensions; reloaded doubles both
    pub const CLASSIC_NUM_COLS: usize = 10;
    pub const CLASSIC_NUM_ROWS: usize = 24;
    /// Classic vertical fall speed (units/s, negative is down); reloaded doubles it
    pub const CLASSIC_FALL_SPEED: f32 = -6.0;

    /// Template id reserved for the bomb
    pub const BOMB_ID: usize = 7;

    /// Edge of a cell's collision box. Smaller than 1 so neighbours never touch.
    pub const CELL_SIZE: f32 = 0.8;

    /// Position shift before each quarter turn (twice the 4x4 box's centre)
    pub const PIVOT_SHIFT: f32 = 4.0;

    /// Half height of the static ground slab; its top edge is y = 0
    pub const GROUND_HALF_DEPTH: f32 = 10.0;
    /// Half width of the ground slab
    pub const GROUND_HALF_WIDTH: f32 = 50.0;
    /// Thickness of each side wall
    pub const WALL_THICKNESS: f32 = 10.0;

    /// Vertical speed below which a piece stopped by the floor counts as resting
    pub const RESTING_SPEED: f32 = 0.05;

    /// Rows at the top that end the game when a settled tile reaches them
    pub const CEILING_MARGIN: usize = 2;
}
