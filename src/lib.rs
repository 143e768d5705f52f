//! Core of a real-time multiplayer chess server.
//!
//! The [`board`] layer is a bitboard rules engine and [`chess`] wraps it into
//! a game with history and termination rules. [`game`] runs one match per
//! task with its [`clock`], and [`hub`] connects clients, pairs seekers and
//! fans events out across instances through the [`collab`] traits.

pub mod board;
pub mod chess;
pub mod clock;
pub mod collab;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod hub;
pub mod rules;
pub mod zobrist;

pub use board::{Color, Move, Piece, Position, Square};
pub use chess::{Chess, PlayedMove, Status};
pub use rules::Rules;
