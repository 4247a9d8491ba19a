//! Piece spawning

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::block::Block;
use super::template::{Catalog, TemplateLibrary};
use crate::consts::CELL_SIZE;
use crate::physics::{BodyDef, BoxShape, OwnerTag, Simulation};

/// Where and how a new piece enters the board
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnContext {
    pub catalog: Catalog,
    pub num_cols: usize,
    pub num_rows: usize,
    /// Initial vertical velocity (negative is down)
    pub fall_speed: f32,
    pub owner: OwnerTag,
}

impl SpawnContext {
    /// Horizontal centre, top row
    pub fn spawn_position(&self) -> Vec2 {
        Vec2::new(self.num_cols as f32 / 2.0, self.num_rows as f32)
    }
}

/// Builds pieces from the template catalogs
#[derive(Debug, Clone)]
pub struct BlockGenerator {
    library: TemplateLibrary,
    rng: Pcg32,
}

impl BlockGenerator {
    pub fn new(bomb_mode: bool, seed: u64) -> Self {
        Self {
            library: TemplateLibrary::new(bomb_mode),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Uniformly pick a template from the active catalog and spawn it
    pub fn create_random_block<S: Simulation + ?Sized>(
        &mut self,
        sim: &mut S,
        ctx: &SpawnContext,
    ) -> Option<Block> {
        let catalog = self.library.catalog(ctx.catalog);
        if catalog.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..catalog.len());
        let id = catalog[index].id;
        self.create_block_by_template(sim, ctx, id)
    }

    /// Spawn a specific template at the top centre of the board
    pub fn create_block_by_template<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        ctx: &SpawnContext,
        id: usize,
    ) -> Option<Block> {
        let Some(template) = self.library.template(ctx.catalog, id) else {
            log::warn!("No template {} in {:?} catalog", id, ctx.catalog);
            return None;
        };

        let shapes: Vec<BoxShape> = template
            .cells
            .iter()
            .map(|cell| BoxShape::cell(cell.x, cell.y, CELL_SIZE))
            .collect();
        let def = BodyDef::new_dynamic(ctx.spawn_position(), Vec2::new(0.0, ctx.fall_speed))
            .with_owner(ctx.owner);
        let body = sim.create_body(&def, &shapes);

        Some(Block::new(template, body))
    }
}
