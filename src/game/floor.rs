//! Settled board state
//!
//! Row 0 is the bottom row. Storage is a flat row-major `Vec` so a row
//! collapse is a single slice rotation.

use serde::{Deserialize, Serialize};

use super::template::Color;
use crate::physics::FixtureHandle;

/// One grid cell
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub color: Color,
    /// Fixture on the floor body that makes this cell solid
    pub fixture: Option<FixtureHandle>,
}

impl Tile {
    pub const EMPTY: Tile = Tile {
        color: Color::EMPTY,
        fixture: None,
    };

    /// Bomb debris: looks lit for one frame, holds nothing
    pub const FLASH: Tile = Tile {
        color: Color::FLASH,
        fixture: None,
    };

    /// A freshly settled cell; its fixture is attached when the floor is rebuilt
    pub fn settled(color: Color) -> Self {
        Self {
            color,
            fixture: None,
        }
    }

    pub fn is_flash(&self) -> bool {
        self.color == Color::FLASH && self.fixture.is_none()
    }

    /// Holds a settled piece cell
    pub fn is_occupied(&self) -> bool {
        self.color != Color::EMPTY && !self.is_flash()
    }

    pub fn is_solid(&self) -> bool {
        self.fixture.is_some()
    }
}

/// Fixed-size grid of settled tiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorGrid {
    num_rows: usize,
    num_cols: usize,
    tiles: Vec<Tile>,
}

impl FloorGrid {
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            tiles: vec![Tile::EMPTY; num_rows * num_cols],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.num_rows && col < self.num_cols).then(|| row * self.num_cols + col)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Tile> {
        self.index(row, col).map(|i| &self.tiles[i])
    }

    /// Overwrite a tile. Returns false when out of bounds.
    pub fn set(&mut self, row: usize, col: usize, tile: Tile) -> bool {
        match self.index(row, col) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    pub fn row(&self, row: usize) -> &[Tile] {
        if row >= self.num_rows {
            return &[];
        }
        let start = row * self.num_cols;
        &self.tiles[start..start + self.num_cols]
    }

    /// Every occupied tile with its (row, col)
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, &Tile)> + '_ {
        self.tiles.iter().enumerate().filter_map(|(i, tile)| {
            tile.is_occupied()
                .then(|| (i / self.num_cols, i % self.num_cols, tile))
        })
    }

    pub(crate) fn tile_mut(&mut self, row: usize, col: usize) -> Option<&mut Tile> {
        self.index(row, col).map(|i| &mut self.tiles[i])
    }

    /// Every cell holds something. Bomb flash counts: a bomb that lands in
    /// the last gap of a row completes it.
    pub fn is_row_complete(&self, row: usize) -> bool {
        self.num_cols > 0
            && row < self.num_rows
            && self.row(row).iter().all(|tile| tile.color != Color::EMPTY)
    }

    /// Empty `row`, drop every row above it by one and put the emptied row on top
    pub fn collapse_row(&mut self, row: usize) {
        if row >= self.num_rows {
            return;
        }
        let start = row * self.num_cols;
        for tile in &mut self.tiles[start..start + self.num_cols] {
            *tile = Tile::EMPTY;
        }
        self.tiles[start..].rotate_left(self.num_cols);
    }

    /// Clear every complete row, bottom up. A row that drops into a just
    /// cleared index is checked again. Returns the cleared indices in order.
    pub fn check_complete_rows(&mut self) -> Vec<usize> {
        let mut cleared = Vec::new();
        let mut row = 0;
        while row < self.num_rows {
            if self.is_row_complete(row) {
                self.collapse_row(row);
                cleared.push(row);
            } else {
                row += 1;
            }
        }
        cleared
    }

    /// Flash the 3x3 neighbourhood of (row, col), clamped to the grid.
    /// Returns how many tiles were hit.
    pub fn explode(&mut self, row: usize, col: usize) -> usize {
        if self.num_rows == 0 || self.num_cols == 0 {
            return 0;
        }
        let rows = row.saturating_sub(1)..=(row + 1).min(self.num_rows - 1);
        let cols = col.saturating_sub(1)..=(col + 1).min(self.num_cols - 1);

        let mut hit = 0;
        for r in rows {
            for c in cols.clone() {
                if self.set(r, c, Tile::FLASH) {
                    hit += 1;
                }
            }
        }
        hit
    }

    /// Downgrade flash tiles to empty. Returns how many were downgraded.
    pub fn tick_effects(&mut self) -> usize {
        let mut downgraded = 0;
        for tile in &mut self.tiles {
            if tile.is_flash() {
                *tile = Tile::EMPTY;
                downgraded += 1;
            }
        }
        downgraded
    }

    /// True when any settled tile sits in the top `margin` rows
    pub fn reaches_ceiling(&self, margin: usize) -> bool {
        let limit = self.num_rows.saturating_sub(margin);
        self.occupied().any(|(row, _, _)| row >= limit)
    }

    /// Drop every fixture reference (the floor body is about to be rebuilt)
    pub(crate) fn detach_fixtures(&mut self) {
        for tile in &mut self.tiles {
            tile.fixture = None;
        }
    }
}
