//! Authoritative game state: board layers, players, card effects, turn
//! machine. Everything in this module is pure with respect to IO; the
//! session layer owns the loop and the sockets.

pub mod board;
pub mod cards;
pub mod core;
pub mod effect;
pub mod player;
pub mod resolver;

/// Side length of the board.
pub const BOARD_N: usize = 4;

/// Number of cells on the board.
pub const BOARD_CELLS: usize = BOARD_N * BOARD_N;

/// Maximum cards a hand can hold; draws beyond this are silently dropped.
pub const MAX_HAND_SIZE: usize = 5;

/// Turns a freshly frozen square stays frozen.
pub const FROST_TURNS: u8 = 3;

/// Turns a freshly blocked square stays blocked.
pub const ROCK_TURNS: u8 = 3;

pub use board::Occupant;
pub use cards::Catalog;
pub use self::core::{GameCore, GameInput, Phase, Snapshot, StepOutcome};
pub use player::Side;
