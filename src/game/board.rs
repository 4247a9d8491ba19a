//! Board controller
//!
//! Owns the simulation, the floor and the moving piece, and turns contacts
//! into game rules. One call to [`Board::step`] is one frame.

use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;

use super::block::{Block, MoveCommand, TransformSnapshot, pivot_offset};
use super::contact::{ContactNotice, ContactObserver};
use super::floor::{FloorGrid, Tile};
use super::generator::{BlockGenerator, SpawnContext};
use super::state::{BoardEvent, BoardSnapshot, Mode, ModeSelection, MoveStatus};
use super::template::Catalog;
use crate::consts::*;
use crate::physics::{
    BodyDef, BodyHandle, BoxShape, OwnerTag, PhysicsWorld, Simulation, StepConfig,
};
use crate::settings::Settings;

/// Owner tags are unique per board for the lifetime of the process
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// A game board driving a simulation
#[derive(Debug)]
pub struct Board<S: Simulation = PhysicsWorld> {
    sim: S,
    settings: Settings,
    seed: u64,
    owner: OwnerTag,
    observer: ContactObserver,
    /// Built on the first spawn, once the bomb flag is final
    generator: Option<BlockGenerator>,

    mode: Mode,
    catalog: Catalog,
    is_bomb_mode: bool,
    is_disconnected_mode: bool,
    scale: usize,
    num_rows: usize,
    num_cols: usize,
    expected_fall_speed: f32,

    floor: FloorGrid,
    floor_body: Option<BodyHandle>,
    walls: Vec<BodyHandle>,

    moving: Option<Block>,
    move_status: MoveStatus,
    /// Where the piece was before the move now awaiting validation
    last_legal: Option<TransformSnapshot>,
    /// `last_legal` came from a player command rather than the fall
    commanded: bool,
    illegal_steps: u32,

    score: u64,
    ticks: u64,
    events: Vec<BoardEvent>,
}

impl Board<PhysicsWorld> {
    /// Board on a rapier world with default settings
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::with_simulation(PhysicsWorld::new(), settings)
    }
}

impl Default for Board<PhysicsWorld> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Simulation> Board<S> {
    /// Board on any simulation. Nothing is created in it until a mode is set.
    pub fn with_simulation(sim: S, settings: Settings) -> Self {
        let seed = settings.resolve_seed();
        let owner = OwnerTag::new(NEXT_OWNER.fetch_add(1, Ordering::Relaxed));
        log::debug!("New board (owner {}, seed {})", owner.value(), seed);

        Self {
            sim,
            settings,
            seed,
            owner,
            observer: ContactObserver::new(),
            generator: None,

            mode: Mode::SelectingMode,
            catalog: Catalog::Classic,
            is_bomb_mode: false,
            is_disconnected_mode: false,
            scale: 1,
            num_rows: CLASSIC_NUM_ROWS,
            num_cols: CLASSIC_NUM_COLS,
            expected_fall_speed: CLASSIC_FALL_SPEED,

            floor: FloorGrid::new(CLASSIC_NUM_ROWS, CLASSIC_NUM_COLS),
            floor_body: None,
            walls: Vec::new(),

            moving: None,
            move_status: MoveStatus::Ok,
            last_legal: None,
            commanded: false,
            illegal_steps: 0,

            score: 0,
            ticks: 0,
            events: Vec::new(),
        }
    }

    // === Accessors ===

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn moving_block(&self) -> Option<&Block> {
        self.moving.as_ref()
    }

    pub fn floor(&self) -> &FloorGrid {
        &self.floor
    }

    pub fn floor_body(&self) -> Option<BodyHandle> {
        self.floor_body
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Also the total row/column count divided by the classic one
    pub fn block_to_tile_ratio(&self) -> usize {
        self.scale
    }

    pub fn expected_fall_speed(&self) -> f32 {
        self.expected_fall_speed
    }

    pub fn move_status(&self) -> MoveStatus {
        self.move_status
    }

    pub fn last_legal_transform(&self) -> Option<TransformSnapshot> {
        self.last_legal
    }

    pub fn is_bomb_mode(&self) -> bool {
        self.is_bomb_mode
    }

    pub fn is_disconnected_mode(&self) -> bool {
        self.is_disconnected_mode
    }

    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Frames advanced while playing
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn simulation(&self) -> &S {
        &self.sim
    }

    pub fn simulation_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    pub fn body_count(&self) -> usize {
        self.sim.body_count()
    }

    pub fn fixture_count(&self) -> usize {
        self.sim.fixture_count()
    }

    /// Events since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            mode: self.mode,
            score: self.score,
            move_status: self.move_status,
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            floor: self.floor.clone(),
            moving_template: self.moving.as_ref().map(Block::template_id),
            moving_color: self.moving.as_ref().map(Block::color),
            moving_cells: self
                .moving
                .as_ref()
                .map(|b| b.cell_boxes(&self.sim))
                .unwrap_or_default(),
        }
    }

    // === Mode ===

    /// Bombs join the classic catalog. Only honoured before the first spawn.
    pub fn set_bomb_mode(&mut self, enabled: bool) {
        if self.generator.is_some() && enabled != self.is_bomb_mode {
            log::warn!("Bomb mode changed after the first spawn; ignored");
            return;
        }
        self.is_bomb_mode = enabled;
    }

    /// Loose collision solving
    pub fn set_disconnected_mode(&mut self, enabled: bool) {
        self.is_disconnected_mode = enabled;
    }

    /// Apply a menu choice. Only valid while selecting a mode.
    pub fn select_mode(&mut self, selection: ModeSelection) -> bool {
        if self.mode != Mode::SelectingMode {
            log::warn!("Mode already chosen ({:?}); ignoring {:?}", self.mode, selection);
            return false;
        }
        self.set_disconnected_mode(selection == ModeSelection::Disconnected);
        self.set_bomb_mode(selection == ModeSelection::Bomb);
        self.set_mode(selection.mode())
    }

    /// Move to `mode`. Entering a play mode sizes the board and builds the
    /// floor and walls; anything but a forward transition is ignored.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        match (self.mode, mode) {
            (Mode::SelectingMode, Mode::Classic | Mode::Reloaded) => {}
            (from, Mode::GameOver) if from != Mode::GameOver => {
                self.end_game();
                return true;
            }
            (from, to) => {
                log::warn!("Ignoring mode change {:?} -> {:?}", from, to);
                return false;
            }
        }

        self.mode = mode;
        self.catalog = mode.catalog();
        self.scale = mode.scale();
        self.num_rows = CLASSIC_NUM_ROWS * self.scale;
        self.num_cols = CLASSIC_NUM_COLS * self.scale;
        self.expected_fall_speed = CLASSIC_FALL_SPEED * self.scale as f32;
        self.score = 0;
        self.floor = FloorGrid::new(self.num_rows, self.num_cols);

        self.build_ground_floor();
        self.initialize_walls();

        log::info!(
            "Mode {:?}: {}x{} board, fall speed {}, bombs {}, disconnected {}",
            mode,
            self.num_cols,
            self.num_rows,
            self.expected_fall_speed,
            self.is_bomb_mode,
            self.is_disconnected_mode
        );
        true
    }

    // === Frame ===

    fn step_config(&self) -> StepConfig {
        let (velocity_iterations, position_iterations) = if self.is_disconnected_mode {
            (DISCONNECT_VELOCITY_ITERATIONS, DISCONNECT_POSITION_ITERATIONS)
        } else {
            (VELOCITY_ITERATIONS, POSITION_ITERATIONS)
        };
        StepConfig {
            dt: TIME_STEP,
            velocity_iterations,
            position_iterations,
        }
    }

    /// Advance one frame. Does nothing outside a play mode.
    pub fn step(&mut self) {
        if !self.mode.is_playing() {
            return;
        }

        self.floor.tick_effects();

        let pre_step = self.moving.as_ref().and_then(|b| b.snapshot(&self.sim));
        let config = self.step_config();
        self.sim.step(&config, &mut self.observer);
        let notices = self.observer.drain();
        self.process_contacts(notices, pre_step);

        if self.moving.is_none() {
            self.spawn_new_random_block();
        }

        if self.move_status == MoveStatus::IllegalDetected {
            self.revert_illegal_move();
        }

        self.handle_block_dropping_on_floor();

        self.move_status = MoveStatus::Ok;
        self.last_legal = None;
        self.commanded = false;
        self.ticks += 1;
    }

    /// Route this frame's contact notices. The floor outranks everything
    /// else, so one frame touching both counts as a ground hit.
    fn process_contacts(&mut self, notices: Vec<ContactNotice>, pre_step: Option<TransformSnapshot>) {
        let Some(body) = self.moving.as_ref().map(Block::body) else {
            return;
        };

        let mut touched = None;
        for notice in notices {
            if notice.owner != self.owner || notice.body != body {
                continue;
            }
            log::trace!("Piece {:?} touched {:?}", notice.body, notice.other);
            if Some(notice.other) == self.floor_body {
                touched = Some(notice.other);
                break;
            }
            touched.get_or_insert(notice.other);
        }

        if let Some(other) = touched {
            self.illegal_move_callback(other, pre_step);
        }
    }

    /// The moving piece touched `other`. Only the first violation since the
    /// last frame counts.
    fn illegal_move_callback(&mut self, other: BodyHandle, pre_step: Option<TransformSnapshot>) {
        if matches!(
            self.move_status,
            MoveStatus::IllegalDetected | MoveStatus::HitGround
        ) {
            return;
        }
        // A pending command already recorded where it came from
        if self.last_legal.is_none() {
            self.last_legal = pre_step;
        }
        self.move_status = if Some(other) == self.floor_body {
            MoveStatus::HitGround
        } else {
            MoveStatus::IllegalDetected
        };
    }

    // === Player commands ===

    /// Apply a player command to the moving piece. Returns false when it had
    /// no effect (no piece, not playing, or blocked by the board edge).
    pub fn move_block(&mut self, command: MoveCommand) -> bool {
        if !self.mode.is_playing() {
            return false;
        }
        let Some(block) = self.moving.as_mut() else {
            return false;
        };
        let body = block.body();

        match command {
            MoveCommand::Left | MoveCommand::Right => {
                let Some(bounds) = block.bounding_box(&self.sim) else {
                    return false;
                };
                let (dx, inside) = if command == MoveCommand::Left {
                    (-1.0, bounds.mins.x - 1.0 >= 0.0)
                } else {
                    (1.0, bounds.maxs.x + 1.0 <= self.num_cols as f32)
                };
                if !inside {
                    return false;
                }
                let Some(snapshot) = block.snapshot(&self.sim) else {
                    return false;
                };
                self.sim
                    .set_transform(body, snapshot.position + Vec2::new(dx, 0.0), snapshot.angle);
                self.last_legal = Some(snapshot);
                self.commanded = true;
                self.move_status = MoveStatus::PendingValidation;
            }
            MoveCommand::SoftDrop => {
                let speed = self.settings.soft_drop_multiplier * self.expected_fall_speed;
                self.sim.set_linear_velocity(body, Vec2::new(0.0, speed));
                if !self.is_disconnected_mode {
                    self.move_status = MoveStatus::PendingValidation;
                }
            }
            MoveCommand::Rotate => {
                let Some(snapshot) = block.snapshot(&self.sim) else {
                    return false;
                };
                let position = snapshot.position + pivot_offset(snapshot.times_rotated);
                self.sim
                    .set_transform(body, position, snapshot.angle - FRAC_PI_2);
                block.set_times_rotated(snapshot.times_rotated + 1);
                self.last_legal = Some(snapshot);
                self.commanded = true;
                self.move_status = MoveStatus::PendingValidation;
            }
        }
        true
    }

    // === Pieces ===

    fn spawn_context(&self) -> SpawnContext {
        SpawnContext {
            catalog: self.catalog,
            num_cols: self.num_cols,
            num_rows: self.num_rows,
            fall_speed: self.expected_fall_speed,
            owner: self.owner,
        }
    }

    /// Replace the moving piece with a random one from the active catalog
    pub fn spawn_new_random_block(&mut self) -> bool {
        if !self.mode.is_playing() {
            return false;
        }
        self.discard_moving_block();

        let ctx = self.spawn_context();
        let (bomb, seed) = (self.is_bomb_mode, self.seed);
        let generator = self
            .generator
            .get_or_insert_with(|| BlockGenerator::new(bomb, seed));
        let block = generator.create_random_block(&mut self.sim, &ctx);
        self.install_block(block)
    }

    /// Replace the moving piece with a specific template
    pub fn spawn_block_by_template(&mut self, id: usize) -> bool {
        if !self.mode.is_playing() {
            return false;
        }
        self.discard_moving_block();

        let ctx = self.spawn_context();
        let (bomb, seed) = (self.is_bomb_mode, self.seed);
        let generator = self
            .generator
            .get_or_insert_with(|| BlockGenerator::new(bomb, seed));
        let block = generator.create_block_by_template(&mut self.sim, &ctx, id);
        self.install_block(block)
    }

    fn discard_moving_block(&mut self) {
        if let Some(block) = self.moving.take() {
            block.destroy(&mut self.sim);
        }
    }

    fn install_block(&mut self, block: Option<Block>) -> bool {
        let Some(block) = block else {
            return false;
        };
        log::debug!(
            "Spawned template {} ({} cells)",
            block.template_id(),
            block.cell_count()
        );
        self.events.push(BoardEvent::PieceSpawned {
            template_id: block.template_id(),
        });
        self.moving = Some(block);
        self.move_status = MoveStatus::Ok;
        self.last_legal = None;
        self.commanded = false;
        self.illegal_steps = 0;
        true
    }

    /// Recreate the piece at its last legal transform. A fresh body sheds
    /// any contact state and collision response from the offending frame.
    fn revert_illegal_move(&mut self) {
        let Some(block) = self.moving.take() else {
            return;
        };
        let id = block.template_id();
        block.destroy(&mut self.sim);

        let ctx = self.spawn_context();
        let Some(generator) = self.generator.as_ref() else {
            return;
        };
        let Some(mut block) = generator.create_block_by_template(&mut self.sim, &ctx, id) else {
            return;
        };

        match self.last_legal {
            Some(snapshot) => block.restore(&mut self.sim, &snapshot),
            None => log::warn!("Reverting template {} without a legal transform", id),
        }
        log::debug!("Reverted template {}", id);
        self.events.push(BoardEvent::PieceReverted { template_id: id });
        self.moving = Some(block);
    }

    /// Decide whether the moving piece has come to rest, and commit it
    fn handle_block_dropping_on_floor(&mut self) {
        let mut finished = false;

        if !self.is_disconnected_mode && self.move_status == MoveStatus::HitGround {
            // The fall itself met the floor and the solver stopped it:
            // resting. A command that pushed the piece into the floor is
            // only a bump; the piece keeps falling.
            if let Some(block) = &self.moving {
                finished = !self.commanded && block.velocity(&self.sim).y > -RESTING_SPEED;
            }
            self.revert_illegal_move();
        }

        if matches!(
            self.move_status,
            MoveStatus::HitGround | MoveStatus::IllegalDetected
        ) {
            self.illegal_steps += 1;
            if self.illegal_steps > self.settings.stuck_step_limit {
                log::debug!("Piece stuck for {} steps; committing", self.illegal_steps);
                finished = true;
            }
        } else {
            self.illegal_steps = 0;
        }

        let Some(block) = &self.moving else {
            return;
        };
        let vy = block.velocity(&self.sim).y;
        if finished || vy > self.expected_fall_speed + self.settings.settle_velocity_margin {
            self.commit_moving_block();
        }
    }

    /// Write the moving piece into the floor grid, clear rows, rebuild the
    /// floor and spawn the next piece
    fn commit_moving_block(&mut self) {
        let Some(block) = self.moving.take() else {
            return;
        };

        let mut cells = Vec::with_capacity(block.cell_count());
        for aabb in block.cell_boxes(&self.sim) {
            let col = aabb.mins.x.round();
            let row = aabb.mins.y.round();
            if row < 0.0 || col < 0.0 || col as usize >= self.num_cols {
                log::info!("Piece settled outside the board at ({}, {})", row, col);
                self.moving = Some(block);
                self.end_game();
                return;
            }
            cells.push((row as usize, col as usize));
        }

        // Settled tiles are never overwritten: a piece that ends up inside
        // the stack is raised until it sits clear of it
        let mut lift = 0;
        while cells.iter().any(|&(row, col)| {
            self.floor
                .get(row + lift, col)
                .is_some_and(Tile::is_occupied)
        }) {
            lift += 1;
        }
        if lift > 0 {
            log::debug!("Piece overlapped the stack; raised {} rows", lift);
        }
        for cell in &mut cells {
            cell.0 += lift;
        }

        if let Some(&(row, col)) = cells.iter().find(|&&(row, _)| row >= self.num_rows) {
            log::info!("Piece settled outside the board at ({}, {})", row, col);
            self.moving = Some(block);
            self.end_game();
            return;
        }

        if block.is_bomb() {
            for &(row, col) in &cells {
                self.floor.explode(row, col);
                self.events.push(BoardEvent::BombExploded { row, col });
            }
        } else {
            for &(row, col) in &cells {
                self.floor.set(row, col, Tile::settled(block.color()));
            }
        }

        let template_id = block.template_id();
        log::debug!("Settled template {} at {:?}", template_id, cells);
        self.events.push(BoardEvent::PieceSettled { template_id });
        block.destroy(&mut self.sim);

        for row in self.floor.check_complete_rows() {
            self.score += 1;
            log::info!("Cleared row {}; score {}", row, self.score);
            self.events.push(BoardEvent::RowCleared {
                row,
                score: self.score,
            });
        }

        self.build_ground_floor();

        if self.mode.is_playing() {
            self.spawn_new_random_block();
        }
    }

    // === Static geometry ===

    /// Replace the floor body with one carrying the ground slab plus a cell
    /// fixture per settled tile. Ends the game if the stack reaches the top.
    fn build_ground_floor(&mut self) {
        if let Some(old) = self.floor_body.take() {
            self.sim.destroy_body(old);
        }
        self.floor.detach_fixtures();

        let mut shapes = vec![BoxShape::new(
            Vec2::ZERO,
            Vec2::new(GROUND_HALF_WIDTH, GROUND_HALF_DEPTH),
        )];
        let mut placed = Vec::new();

        let topped_out = self.floor.reaches_ceiling(CEILING_MARGIN);
        if !topped_out {
            for (row, col, _) in self.floor.occupied() {
                shapes.push(BoxShape::cell(
                    col as f32,
                    row as f32 + GROUND_HALF_DEPTH,
                    CELL_SIZE,
                ));
                placed.push((row, col));
            }
        }

        let def = BodyDef::new_static(Vec2::new(0.0, -GROUND_HALF_DEPTH));
        let body = self.sim.create_body(&def, &shapes);
        self.floor_body = Some(body);

        // Fixture 0 is the slab; tiles follow in placement order
        let fixtures = self.sim.fixtures(body);
        for (&(row, col), fixture) in placed.iter().zip(fixtures.iter().skip(1)) {
            if let Some(tile) = self.floor.tile_mut(row, col) {
                tile.fixture = Some(*fixture);
            }
        }

        if topped_out {
            log::info!("Stack reached the ceiling");
            self.end_game();
        }
    }

    /// Side walls just outside columns 0 and `num_cols`
    fn initialize_walls(&mut self) {
        for wall in self.walls.drain(..) {
            self.sim.destroy_body(wall);
        }

        let half_height = self.num_rows as f32 / 2.0;
        let half_extents = Vec2::new(WALL_THICKNESS / 2.0, half_height);
        for x in [
            -WALL_THICKNESS / 2.0,
            self.num_cols as f32 + WALL_THICKNESS / 2.0,
        ] {
            let def = BodyDef::new_static(Vec2::new(x, half_height));
            let wall = self
                .sim
                .create_body(&def, &[BoxShape::new(Vec2::ZERO, half_extents)]);
            self.walls.push(wall);
        }
    }

    fn end_game(&mut self) {
        if self.mode == Mode::GameOver {
            return;
        }
        self.mode = Mode::GameOver;
        log::info!("Game over; score {}", self.score);
        self.events.push(BoardEvent::GameOver { score: self.score });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::template::Color;
    use crate::physics::{Aabb, ContactListener, FixtureHandle, Transform};

    const RED: Color = Color::new(1.0, 0.0, 0.0);

    fn seeded() -> Settings {
        Settings {
            seed: Some(7),
            ..Default::default()
        }
    }

    fn classic() -> Board {
        let mut board = Board::with_settings(seeded());
        assert!(board.set_mode(Mode::Classic));
        board
    }

    fn settle_tile<S: Simulation>(board: &mut Board<S>, row: usize, col: usize) {
        board.floor.set(row, col, Tile::settled(RED));
    }

    fn position(board: &Board) -> Vec2 {
        let block = board.moving_block().unwrap();
        board.simulation().transform(block.body()).unwrap().position
    }

    /// Step until `pred` matches an emitted event
    fn step_until(board: &mut Board, limit: usize, pred: impl Fn(&BoardEvent) -> bool) -> Vec<BoardEvent> {
        let mut seen = Vec::new();
        for _ in 0..limit {
            board.step();
            let events = board.drain_events();
            let hit = events.iter().any(&pred);
            seen.extend(events);
            if hit {
                return seen;
            }
        }
        panic!("no matching event within {} steps: {:?}", limit, seen);
    }

    #[test]
    fn test_selecting_mode_is_inert() {
        let mut board = Board::with_settings(seeded());
        board.step();
        assert_eq!(board.mode(), Mode::SelectingMode);
        assert_eq!(board.body_count(), 0);
        assert_eq!(board.ticks(), 0);
        assert!(!board.move_block(MoveCommand::Left));
        assert!(!board.spawn_new_random_block());
    }

    #[test]
    fn test_first_step_spawns_piece() {
        let mut board = classic();
        assert_eq!(board.body_count(), 3);
        assert_eq!(board.fixture_count(), 3);

        board.step();
        let cells = board.moving_block().unwrap().cell_count();
        assert_eq!(board.body_count(), 4);
        assert_eq!(board.fixture_count(), 3 + cells);
        assert!(matches!(
            board.drain_events().as_slice(),
            [BoardEvent::PieceSpawned { .. }]
        ));
    }

    #[test]
    fn test_spawn_position_and_speed() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        assert_eq!(position(&board), Vec2::new(5.0, 24.0));
        let block = board.moving_block().unwrap();
        assert_eq!(block.velocity(board.simulation()), Vec2::new(0.0, CLASSIC_FALL_SPEED));
    }

    #[test]
    fn test_reloaded_dimensions() {
        let mut board = Board::with_settings(seeded());
        assert!(board.set_mode(Mode::Reloaded));
        assert_eq!(board.num_rows(), 48);
        assert_eq!(board.num_cols(), 20);
        assert_eq!(board.block_to_tile_ratio(), 2);
        assert_eq!(board.expected_fall_speed(), 2.0 * CLASSIC_FALL_SPEED);
        assert_eq!(board.floor().num_rows(), 48);
    }

    #[test]
    fn test_mode_only_moves_forward() {
        let mut board = classic();
        assert!(!board.set_mode(Mode::Reloaded));
        assert!(!board.select_mode(ModeSelection::Reloaded));
        assert_eq!(board.num_rows(), 24);
        assert!(board.set_mode(Mode::GameOver));
        assert!(!board.set_mode(Mode::Classic));
        assert!(!board.set_mode(Mode::GameOver));
        assert_eq!(board.mode(), Mode::GameOver);
    }

    #[test]
    fn test_select_mode_flags() {
        let mut board = Board::with_settings(seeded());
        assert!(board.select_mode(ModeSelection::Disconnected));
        assert_eq!(board.mode(), Mode::Reloaded);
        assert!(board.is_disconnected_mode());
        assert!(!board.is_bomb_mode());

        let mut board = Board::with_settings(seeded());
        assert!(board.select_mode(ModeSelection::Bomb));
        assert_eq!(board.mode(), Mode::Classic);
        assert!(board.is_bomb_mode());
        assert!(!board.is_disconnected_mode());
    }

    #[test]
    fn test_move_left_validated_next_step() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let before = position(&board);

        assert!(board.move_block(MoveCommand::Left));
        assert_eq!(board.move_status(), MoveStatus::PendingValidation);
        assert_eq!(board.last_legal_transform().unwrap().position, before);

        board.step();
        assert_eq!(board.move_status(), MoveStatus::Ok);
        let after = position(&board);
        assert!((after.x - (before.x - 1.0)).abs() < 1e-5);
        assert!(after.y < before.y);
    }

    #[test]
    fn test_move_left_blocked_at_edge() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let mut moves = 0;
        while board.move_block(MoveCommand::Left) {
            moves += 1;
            assert!(moves < 10);
        }
        // Cells span local x 0..4 from x = 5
        assert_eq!(moves, 5);

        board.step();
        let at_edge = position(&board);
        assert!(!board.move_block(MoveCommand::Left));
        assert_eq!(position(&board), at_edge);
        assert_eq!(board.move_status(), MoveStatus::Ok);
    }

    #[test]
    fn test_move_right_blocked_at_edge() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let mut moves = 0;
        while board.move_block(MoveCommand::Right) {
            moves += 1;
            assert!(moves < 10);
        }
        assert_eq!(moves, 1);
        let bounds = board.moving_block().unwrap().bounding_box(board.simulation()).unwrap();
        assert!(bounds.maxs.x <= 10.0);
    }

    #[test]
    fn test_four_rotations_restore_pose() {
        let mut board = classic();
        board.spawn_block_by_template(5);
        let start = position(&board);

        for _ in 0..4 {
            assert!(board.move_block(MoveCommand::Rotate));
        }
        let block = board.moving_block().unwrap();
        assert_eq!(block.times_rotated() % 4, 0);
        assert_eq!(pivot_offset(block.times_rotated()), pivot_offset(0));
        let end = position(&board);
        assert!((end - start).length() < 1e-5);
    }

    #[test]
    fn test_rotation_turns_in_place() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let before = board.moving_block().unwrap().bounding_box(board.simulation()).unwrap();

        board.move_block(MoveCommand::Rotate);
        let after = board.moving_block().unwrap().bounding_box(board.simulation()).unwrap();
        // Horizontal bar becomes vertical inside the same 4x4 box
        assert!(after.extents().y > after.extents().x);
        assert!(after.mins.x >= before.mins.x - 0.2);
        assert!(after.maxs.x <= before.maxs.x + 0.2);
    }

    #[test]
    fn test_soft_drop() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        assert!(board.move_block(MoveCommand::SoftDrop));
        assert_eq!(board.move_status(), MoveStatus::PendingValidation);
        let block = board.moving_block().unwrap();
        assert_eq!(block.velocity(board.simulation()).y, 3.0 * CLASSIC_FALL_SPEED);

        let mut board = Board::with_settings(seeded());
        board.select_mode(ModeSelection::Disconnected);
        board.spawn_block_by_template(0);
        board.move_block(MoveCommand::SoftDrop);
        assert_eq!(board.move_status(), MoveStatus::Ok);
    }

    #[test]
    fn test_rotation_into_wall_is_reverted() {
        let mut board = classic();
        board.spawn_block_by_template(6);
        // Fall until the piece's lower cells are beside the wall
        for _ in 0..60 {
            board.step();
        }
        assert_eq!(board.moving_block().unwrap().template_id(), 6);
        while board.move_block(MoveCommand::Left) {}
        board.step();
        let before = board.moving_block().unwrap().snapshot(board.simulation()).unwrap();

        assert!(board.move_block(MoveCommand::Rotate));
        board.step();

        let block = board.moving_block().unwrap();
        assert_eq!(block.template_id(), 6);
        assert_eq!(block.times_rotated(), 0);
        let after = block.snapshot(board.simulation()).unwrap();
        assert_eq!(after.position, before.position);
        assert_eq!(after.angle, 0.0);
        assert!(
            board
                .drain_events()
                .contains(&BoardEvent::PieceReverted { template_id: 6 })
        );
    }

    #[test]
    fn test_sideways_into_tile_is_reverted() {
        let mut board = classic();
        // Column of tiles left of the piece's leftmost cell
        for row in 0..10 {
            settle_tile(&mut board, row, 4);
        }
        board.build_ground_floor();
        board.spawn_block_by_template(3);
        for _ in 0..180 {
            board.step();
        }
        // Square cells occupy columns 6 and 7, beside tile rows 7 and 8
        let before = position(&board);
        assert!(board.move_block(MoveCommand::Left));
        board.step();
        assert!(board.move_block(MoveCommand::Left));
        board.step();

        let block = board.moving_block().unwrap();
        assert_eq!(block.template_id(), 3);
        let bounds = block.bounding_box(board.simulation()).unwrap();
        assert!(bounds.mins.x > 5.0, "piece entered the tile column: {:?}", bounds);
        assert!(position(&board).x > before.x - 2.0);
        assert!(
            board
                .drain_events()
                .contains(&BoardEvent::PieceReverted { template_id: 3 })
        );
    }

    #[test]
    fn test_contact_priority() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let body = board.moving_block().unwrap().body();
        let floor = board.floor_body().unwrap();
        let wall = board.walls[0];
        let owner = board.owner();
        let pre = board.moving_block().unwrap().snapshot(board.simulation());

        let notice = |other| ContactNotice { owner, body, other };

        board.process_contacts(vec![notice(wall), notice(floor)], pre);
        assert_eq!(board.move_status(), MoveStatus::HitGround);
        assert_eq!(board.last_legal_transform(), pre);

        board.move_status = MoveStatus::Ok;
        board.last_legal = None;
        board.process_contacts(vec![notice(wall)], pre);
        assert_eq!(board.move_status(), MoveStatus::IllegalDetected);

        // Latched until the next frame
        board.process_contacts(vec![notice(floor)], pre);
        assert_eq!(board.move_status(), MoveStatus::IllegalDetected);

        board.move_status = MoveStatus::Ok;
        let stranger = ContactNotice {
            owner: OwnerTag::new(u64::MAX),
            body,
            other: floor,
        };
        let stale = ContactNotice {
            owner,
            body: BodyHandle(9999),
            other: floor,
        };
        board.process_contacts(vec![stranger, stale], pre);
        assert_eq!(board.move_status(), MoveStatus::Ok);
    }

    #[test]
    fn test_row_clear_during_play() {
        let mut board = classic();
        for col in [0, 1, 2, 3, 4, 9] {
            settle_tile(&mut board, 0, col);
        }
        settle_tile(&mut board, 1, 9);
        board.build_ground_floor();
        board.spawn_block_by_template(0);

        let events = step_until(&mut board, 400, |e| {
            matches!(e, BoardEvent::PieceSettled { template_id: 0 })
        });
        assert!(events.contains(&BoardEvent::RowCleared { row: 0, score: 1 }));
        assert_eq!(board.score(), 1);
        // The tile above dropped into row 0
        assert!(board.floor().get(0, 9).unwrap().is_occupied());
        assert!(!board.floor().get(0, 5).unwrap().is_occupied());
        assert_eq!(board.floor().occupied().count(), 1);
        assert_eq!(board.mode(), Mode::Classic);
        assert!(board.moving_block().is_some());
    }

    #[test]
    fn test_settled_piece_lands_on_bottom_row() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        step_until(&mut board, 400, |e| matches!(e, BoardEvent::PieceSettled { .. }));

        for col in 5..9 {
            let tile = board.floor().get(0, col).unwrap();
            assert!(tile.is_occupied(), "column {}", col);
            assert!(tile.is_solid());
        }
        assert_eq!(board.floor().occupied().count(), 4);
        // Slab plus four tiles
        let floor = board.floor_body().unwrap();
        assert_eq!(board.simulation().fixtures(floor).len(), 5);
    }

    #[test]
    fn test_bomb_flashes_neighbourhood() {
        let mut board = Board::with_settings(seeded());
        assert!(board.select_mode(ModeSelection::Bomb));
        for col in 6..=8 {
            settle_tile(&mut board, 0, col);
        }
        board.build_ground_floor();
        board.spawn_block_by_template(BOMB_ID);

        let events = step_until(&mut board, 400, |e| {
            matches!(e, BoardEvent::BombExploded { .. })
        });
        assert!(events.contains(&BoardEvent::BombExploded { row: 1, col: 7 }));

        for row in 0..=2 {
            for col in 6..=8 {
                let tile = board.floor().get(row, col).unwrap();
                assert!(tile.is_flash(), "({}, {})", row, col);
                assert!(!tile.is_solid());
            }
        }
        let floor = board.floor_body().unwrap();
        assert_eq!(board.simulation().fixtures(floor).len(), 1);

        // Flash lasts one frame
        board.step();
        assert!(board.floor().get(1, 7).unwrap().color == Color::EMPTY);
    }

    #[test]
    fn test_bomb_in_gap_completes_row() {
        let mut board = Board::with_settings(seeded());
        assert!(board.select_mode(ModeSelection::Bomb));
        for col in (0..10).filter(|&c| c != 7) {
            settle_tile(&mut board, 0, col);
        }
        board.build_ground_floor();
        board.spawn_block_by_template(BOMB_ID);

        let events = step_until(&mut board, 400, |e| {
            matches!(e, BoardEvent::PieceSettled { template_id: BOMB_ID })
        });
        assert!(events.contains(&BoardEvent::BombExploded { row: 0, col: 7 }));
        assert!(events.contains(&BoardEvent::RowCleared { row: 0, score: 1 }));
        assert_eq!(board.score(), 1);
        // Row 1's flash cells dropped into row 0; nothing solid is left
        assert_eq!(board.floor().occupied().count(), 0);
    }

    #[test]
    fn test_embedded_piece_is_not_committed_over_tiles() {
        let mut board = classic();
        for row in 0..5 {
            settle_tile(&mut board, row, 6);
            settle_tile(&mut board, row, 7);
        }
        board.build_ground_floor();
        board.spawn_block_by_template(3);
        let color = board.moving_block().unwrap().color();
        // Square cells land on rows 2 and 3 of the tile stack
        let body = board.moving_block().unwrap().body();
        board.simulation_mut().set_transform(body, Vec2::new(5.0, 1.0), 0.0);

        step_until(&mut board, 100, |e| {
            matches!(e, BoardEvent::PieceSettled { template_id: 3 })
        });

        for row in 0..5 {
            for col in [6, 7] {
                assert_eq!(board.floor().get(row, col).unwrap().color, RED, "({}, {})", row, col);
            }
        }
        for row in [5, 6] {
            for col in [6, 7] {
                let tile = board.floor().get(row, col).unwrap();
                assert!(tile.is_solid(), "({}, {})", row, col);
                assert_eq!(tile.color, color);
            }
        }
        assert_eq!(board.floor().occupied().count(), 14);
        assert_eq!(board.mode(), Mode::Classic);
    }

    #[test]
    fn test_disconnected_mode_settles() {
        let mut board = Board::with_settings(seeded());
        board.select_mode(ModeSelection::Disconnected);
        step_until(&mut board, 1000, |e| matches!(e, BoardEvent::PieceSettled { .. }));
        assert!(board.floor().occupied().count() > 0);
        assert_eq!(board.mode(), Mode::Reloaded);
    }

    #[test]
    fn test_stuck_piece_committed_after_limit() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let body = board.moving_block().unwrap().body();
        board.simulation_mut().set_transform(body, Vec2::new(2.0, 5.0), 0.0);
        let limit = board.settings().stuck_step_limit;

        for _ in 0..limit {
            board.move_status = MoveStatus::IllegalDetected;
            board.handle_block_dropping_on_floor();
        }
        assert_eq!(board.floor().occupied().count(), 0);

        board.move_status = MoveStatus::IllegalDetected;
        board.handle_block_dropping_on_floor();
        assert_eq!(board.floor().occupied().count(), 4);
        assert!(board.floor().get(6, 2).unwrap().is_solid());
    }

    #[test]
    fn test_ceiling_ends_game() {
        let mut board = classic();
        board.step();
        settle_tile(&mut board, 22, 3);
        board.build_ground_floor();
        assert_eq!(board.mode(), Mode::GameOver);
        assert!(board.drain_events().contains(&BoardEvent::GameOver { score: 0 }));

        let ticks = board.ticks();
        board.step();
        assert_eq!(board.ticks(), ticks);
        assert!(!board.move_block(MoveCommand::Rotate));
    }

    #[test]
    fn test_commit_above_board_ends_game() {
        let mut board = classic();
        board.spawn_block_by_template(0);
        let body = board.moving_block().unwrap().body();
        board.simulation_mut().set_transform(body, Vec2::new(2.0, 30.0), 0.0);
        board.commit_moving_block();
        assert_eq!(board.mode(), Mode::GameOver);
        assert_eq!(board.floor().occupied().count(), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut board = classic();
        board.step();
        let snapshot = board.snapshot();
        assert_eq!(snapshot.mode, Mode::Classic);
        assert_eq!(
            snapshot.moving_cells.len(),
            board.moving_block().unwrap().cell_count()
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: BoardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_cols, 10);
    }

    #[test]
    fn test_same_seed_same_pieces() {
        let spawned = |board: &mut Board| {
            let mut ids = Vec::new();
            for _ in 0..5 {
                board.spawn_new_random_block();
                ids.push(board.moving_block().unwrap().template_id());
            }
            ids
        };
        let mut a = classic();
        let mut b = classic();
        assert_eq!(spawned(&mut a), spawned(&mut b));
    }

    /// Rapier world that counts steps
    #[derive(Debug, Default)]
    struct CountingWorld {
        inner: PhysicsWorld,
        steps: usize,
    }

    impl Simulation for CountingWorld {
        fn create_body(&mut self, def: &BodyDef, shapes: &[BoxShape]) -> BodyHandle {
            self.inner.create_body(def, shapes)
        }
        fn destroy_body(&mut self, body: BodyHandle) -> bool {
            self.inner.destroy_body(body)
        }
        fn contains(&self, body: BodyHandle) -> bool {
            self.inner.contains(body)
        }
        fn owner(&self, body: BodyHandle) -> Option<OwnerTag> {
            self.inner.owner(body)
        }
        fn step(&mut self, config: &StepConfig, listener: &mut dyn ContactListener) {
            self.steps += 1;
            self.inner.step(config, listener)
        }
        fn transform(&self, body: BodyHandle) -> Option<Transform> {
            self.inner.transform(body)
        }
        fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32) {
            self.inner.set_transform(body, position, angle)
        }
        fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2> {
            self.inner.linear_velocity(body)
        }
        fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
            self.inner.set_linear_velocity(body, velocity)
        }
        fn fixture_aabbs(&self, body: BodyHandle) -> Vec<Aabb> {
            self.inner.fixture_aabbs(body)
        }
        fn fixtures(&self, body: BodyHandle) -> Vec<FixtureHandle> {
            self.inner.fixtures(body)
        }
        fn body_count(&self) -> usize {
            self.inner.body_count()
        }
        fn fixture_count(&self) -> usize {
            self.inner.fixture_count()
        }
    }

    #[test]
    fn test_engine_untouched_outside_play() {
        let mut board = Board::with_simulation(CountingWorld::default(), seeded());
        board.step();
        assert_eq!(board.simulation().steps, 0);

        board.set_mode(Mode::Classic);
        board.step();
        board.step();
        assert_eq!(board.simulation().steps, 2);

        board.set_mode(Mode::GameOver);
        board.step();
        assert_eq!(board.simulation().steps, 2);
    }

    #[test]
    fn test_boards_have_distinct_owners() {
        let a = Board::new();
        let b = Board::new();
        assert_ne!(a.owner(), b.owner());
    }
}
