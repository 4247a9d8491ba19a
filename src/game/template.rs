//! Piece shape catalogs
//!
//! Shapes are lists of cell offsets inside a 4x4 box; the board rotates them
//! about that box's centre (see `block::pivot_offset`).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::BOMB_ID;

/// RGB colour, components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Colour of an empty tile
    pub const EMPTY: Color = Color::new(0.0, 0.0, 0.0);
    /// One-frame explosion colour left by a bomb
    pub const FLASH: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::EMPTY
    }
}

/// Which catalog a mode draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Catalog {
    Classic,
    Reloaded,
}

/// Immutable piece shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub id: usize,
    pub cells: Vec<Vec2>,
    pub color: Color,
}

impl BlockTemplate {
    fn new(id: usize, cells: &[(f32, f32)], color: Color) -> Self {
        Self {
            id,
            cells: cells.iter().map(|&(x, y)| Vec2::new(x, y)).collect(),
            color,
        }
    }

    pub fn is_bomb(&self) -> bool {
        self.id == BOMB_ID
    }
}

/// Both catalogs, built once per game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLibrary {
    classic: Vec<BlockTemplate>,
    reloaded: Vec<BlockTemplate>,
    bomb: BlockTemplate,
}

impl TemplateLibrary {
    /// Build the catalogs. With `bomb_mode` the bomb joins the classic set.
    pub fn new(bomb_mode: bool) -> Self {
        let mut classic = vec![
            // Four in a row
            BlockTemplate::new(
                0,
                &[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0)],
                Color::new(0.0, 1.0, 1.0),
            ),
            // Backwards L
            BlockTemplate::new(
                1,
                &[(1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (1.0, 2.0)],
                Color::new(0.0, 0.0, 1.0),
            ),
            // L
            BlockTemplate::new(
                2,
                &[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (2.0, 2.0)],
                Color::new(1.0, 0.7, 1.0),
            ),
            // Square
            BlockTemplate::new(
                3,
                &[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)],
                Color::new(1.0, 1.0, 0.0),
            ),
            // Backwards Z
            BlockTemplate::new(
                4,
                &[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (3.0, 2.0)],
                Color::new(0.0, 1.0, 0.0),
            ),
            // T
            BlockTemplate::new(
                5,
                &[(1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (2.0, 2.0)],
                Color::new(0.5, 0.0, 0.5),
            ),
            // Z
            BlockTemplate::new(
                6,
                &[(1.0, 1.0), (2.0, 1.0), (2.0, 0.0), (3.0, 0.0)],
                Color::new(1.0, 0.0, 0.0),
            ),
        ];

        let reloaded = vec![
            // Domino
            BlockTemplate::new(0, &[(1.0, 2.0), (2.0, 2.0)], Color::new(1.0, 0.0, 0.0)),
            // Hook
            BlockTemplate::new(
                1,
                &[
                    (0.0, 2.0),
                    (1.0, 2.0),
                    (2.0, 2.0),
                    (2.0, 1.0),
                    (3.0, 2.0),
                    (3.0, 1.0),
                ],
                Color::new(0.0, 1.0, 0.0),
            ),
            // Tall corner
            BlockTemplate::new(
                2,
                &[
                    (0.0, 0.0),
                    (1.0, 0.0),
                    (2.0, 0.0),
                    (3.0, 0.0),
                    (2.0, 1.0),
                    (3.0, 1.0),
                    (3.0, 2.0),
                    (3.0, 3.0),
                ],
                Color::new(0.0, 0.0, 1.0),
            ),
            // Thick corner
            BlockTemplate::new(
                3,
                &[
                    (0.0, 0.0),
                    (1.0, 0.0),
                    (2.0, 0.0),
                    (2.0, 1.0),
                    (2.0, 2.0),
                    (3.0, 0.0),
                    (3.0, 1.0),
                    (3.0, 2.0),
                ],
                Color::new(1.0, 0.0, 1.0),
            ),
        ];

        let bomb = BlockTemplate::new(BOMB_ID, &[(2.0, 2.0)], Color::new(0.8, 0.8, 0.8));
        if bomb_mode {
            classic.push(bomb.clone());
        }

        Self {
            classic,
            reloaded,
            bomb,
        }
    }

    pub fn catalog(&self, catalog: Catalog) -> &[BlockTemplate] {
        match catalog {
            Catalog::Classic => &self.classic,
            Catalog::Reloaded => &self.reloaded,
        }
    }

    /// Look a template up by id. The bomb resolves in any catalog.
    pub fn template(&self, catalog: Catalog, id: usize) -> Option<&BlockTemplate> {
        if id == BOMB_ID {
            return Some(&self.bomb);
        }
        self.catalog(catalog).iter().find(|t| t.id == id)
    }
}
