//! Board rules on top of the simulation
//!
//! The simulation decides what touches what; this module decides what that
//! means: illegal moves are reverted, landed pieces become floor tiles,
//! complete rows collapse, bombs blow holes.

pub mod block;
pub mod board;
pub mod contact;
pub mod floor;
pub mod generator;
pub mod state;
pub mod template;

pub use block::{Block, MoveCommand, TransformSnapshot, pivot_offset};
pub use board::Board;
pub use contact::{ContactNotice, ContactObserver};
pub use floor::{FloorGrid, Tile};
pub use generator::{BlockGenerator, SpawnContext};
pub use state::{BoardEvent, BoardSnapshot, Mode, ModeSelection, MoveStatus};
pub use template::{BlockTemplate, Catalog, Color, TemplateLibrary};
