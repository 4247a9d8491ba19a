//! Tetris Reloaded headless host
//!
//! Reads one command per line from stdin, runs the board and prints a status
//! line after each. `RUST_LOG=debug` shows piece-level events.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tetris_reloaded::input::HostCommand;
use tetris_reloaded::settings::SETTINGS_ENV;
use tetris_reloaded::{Board, BoardEvent, Settings};

const HELP: &str = "\
1-4: classic, reloaded, disconnected, bomb
a/d: left/right   s: soft drop   w/z: rotate
step [n]: advance frames (empty line = 1)
dump: print board JSON   q: quit";

fn settings_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(SETTINGS_ENV))
        .map(PathBuf::from)
}

/// Cue name a frontend would play for an event
fn cue(event: &BoardEvent) -> &'static str {
    match event {
        BoardEvent::PieceSpawned { .. } => "spawn",
        BoardEvent::PieceReverted { .. } => "bump",
        BoardEvent::PieceSettled { .. } => "land",
        BoardEvent::RowCleared { .. } => "clear",
        BoardEvent::BombExploded { .. } => "boom",
        BoardEvent::GameOver { .. } => "game-over",
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    log::info!("Tetris Reloaded (headless) starting...");

    let settings = Settings::load_or_default(settings_path().as_deref());
    let frames_per_line = settings.frames_per_line;
    let mut board = Board::with_settings(settings);
    log::info!("Game initialized with seed: {}", board.seed());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", HELP)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let command = match line.parse::<HostCommand>() {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };

        match command {
            HostCommand::Quit => break,
            HostCommand::Dump => {
                writeln!(out, "{}", serde_json::to_string_pretty(&board.snapshot())?)?;
                continue;
            }
            HostCommand::Step(_) => {
                command.apply(&mut board);
            }
            _ => {
                command.apply(&mut board);
                for _ in 0..frames_per_line {
                    board.step();
                }
            }
        }

        for event in board.drain_events() {
            log::debug!("{} {:?}", cue(&event), event);
        }

        writeln!(
            out,
            "mode={:?} score={} status={:?} tick={}",
            board.mode(),
            board.score(),
            board.move_status(),
            board.ticks()
        )?;
    }

    log::info!("Final score: {}", board.score());
    Ok(())
}
