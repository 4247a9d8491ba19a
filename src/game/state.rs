//! Board-level state types

use serde::{Deserialize, Serialize};

use super::floor::FloorGrid;
use super::template::{Catalog, Color};
use crate::physics::Aabb;

/// Game mode. Only moves forward: SelectingMode -> Classic/Reloaded -> GameOver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Waiting for the player to pick a mode
    #[default]
    SelectingMode,
    Classic,
    /// Double-scale board, double fall speed
    Reloaded,
    /// Terminal; the simulation no longer advances
    GameOver,
}

impl Mode {
    pub fn is_playing(self) -> bool {
        matches!(self, Mode::Classic | Mode::Reloaded)
    }

    /// Board scale relative to classic
    pub fn scale(self) -> usize {
        match self {
            Mode::Reloaded => 2,
            _ => 1,
        }
    }

    pub fn catalog(self) -> Catalog {
        match self {
            Mode::Reloaded => Catalog::Reloaded,
            _ => Catalog::Classic,
        }
    }
}

/// Per-step legality of the moving piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveStatus {
    /// A command moved the piece; the next step confirms or rejects it
    PendingValidation,
    /// The piece touched something it must not overlap
    IllegalDetected,
    /// The piece touched the floor (or the tiles settled on it)
    HitGround,
    #[default]
    Ok,
}

/// Host-facing mode choices (select-mode 1..4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeSelection {
    Classic,
    Reloaded,
    /// Reloaded with loose collision solving ("blitz")
    Disconnected,
    /// Classic with bombs in the piece mix
    Bomb,
}

impl ModeSelection {
    /// Map the 1-based menu number
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(ModeSelection::Classic),
            2 => Some(ModeSelection::Reloaded),
            3 => Some(ModeSelection::Disconnected),
            4 => Some(ModeSelection::Bomb),
            _ => None,
        }
    }

    pub fn mode(self) -> Mode {
        match self {
            ModeSelection::Classic | ModeSelection::Bomb => Mode::Classic,
            ModeSelection::Reloaded | ModeSelection::Disconnected => Mode::Reloaded,
        }
    }
}

/// Things a host may want to react to (sounds, effects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardEvent {
    PieceSpawned { template_id: usize },
    PieceReverted { template_id: usize },
    PieceSettled { template_id: usize },
    RowCleared { row: usize, score: u64 },
    BombExploded { row: usize, col: usize },
    GameOver { score: u64 },
}

/// Read-only view of a board for rendering or dumping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub mode: Mode,
    pub score: u64,
    pub move_status: MoveStatus,
    pub num_rows: usize,
    pub num_cols: usize,
    pub floor: FloorGrid,
    pub moving_template: Option<usize>,
    pub moving_color: Option<Color>,
    pub moving_cells: Vec<Aabb>,
}
