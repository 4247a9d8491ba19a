//! Host commands
//!
//! One command per whitespace-separated token line. Keys follow the usual
//! keyboard layout so a terminal session feels like the game.

use std::str::FromStr;

use crate::game::{Board, ModeSelection, MoveCommand};
use crate::physics::Simulation;

/// Something the host asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    SelectMode(ModeSelection),
    Move(MoveCommand),
    /// Run this many frames
    Step(u32),
    /// Print the board
    Dump,
    Quit,
}

/// Line that is not a command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for HostCommand {
    type Err = UnknownCommand;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default().to_ascii_lowercase();
        let command = match head.as_str() {
            "1" | "2" | "3" | "4" => head
                .parse()
                .ok()
                .and_then(ModeSelection::from_number)
                .map(HostCommand::SelectMode),
            "a" | "left" => Some(HostCommand::Move(MoveCommand::Left)),
            "d" | "right" => Some(HostCommand::Move(MoveCommand::Right)),
            "s" | "down" => Some(HostCommand::Move(MoveCommand::SoftDrop)),
            "w" | "z" | "rotate" => Some(HostCommand::Move(MoveCommand::Rotate)),
            "" | "step" => match words.next() {
                Some(n) => n.parse().ok().map(HostCommand::Step),
                None => Some(HostCommand::Step(1)),
            },
            "p" | "dump" => Some(HostCommand::Dump),
            "q" | "quit" | "exit" => Some(HostCommand::Quit),
            _ => None,
        };
        command.ok_or_else(|| UnknownCommand(line.trim().to_string()))
    }
}

impl HostCommand {
    /// Apply a board-facing command. Dump and Quit are the host's business
    /// and report false here.
    pub fn apply<S: Simulation>(self, board: &mut Board<S>) -> bool {
        match self {
            HostCommand::SelectMode(selection) => board.select_mode(selection),
            HostCommand::Move(command) => board.move_block(command),
            HostCommand::Step(frames) => {
                for _ in 0..frames {
                    board.step();
                }
                frames > 0
            }
            HostCommand::Dump | HostCommand::Quit => false,
        }
    }
}
