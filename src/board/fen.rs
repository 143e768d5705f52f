//! FEN parsing and serialization.

use crate::rules::Rules;

use super::error::FenError;
use super::{Color, Piece, Position, Square, CASTLE_BLACK_K, CASTLE_BLACK_Q, CASTLE_WHITE_K, CASTLE_WHITE_Q};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Position {
    /// Parse a position from FEN notation.
    ///
    /// All six fields are required. Piece placement must describe exactly
    /// eight ranks of eight squares with one king per side, and the en
    /// passant square must sit on the rank the side to move can capture on.
    pub fn try_from_fen(rules: &Rules, fen: &str) -> Result<Self, FenError> {
        let mut pos = Position::empty();
        let parts: Vec<&str> = fen.split(' ').collect();

        if parts.len() != 6 {
            return Err(FenError::WrongFieldCount { found: parts.len() });
        }

        let ranks: Vec<&str> = parts[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::WrongRankCount { found: ranks.len() });
        }

        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0;
            let mut previous_was_digit = false;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if previous_was_digit || skip == 0 || skip > 8 {
                        return Err(FenError::InvalidRank { rank: rank_idx });
                    }
                    file += skip as usize;
                    previous_was_digit = true;
                } else {
                    let piece = Piece::from_char(c).ok_or(FenError::InvalidPiece { char: c })?;
                    if file >= 8 {
                        return Err(FenError::WrongFileCount {
                            rank: rank_idx,
                            files: file + 1,
                        });
                    }
                    let color = if c.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    pos.set_piece(Square(rank, file), color, piece);
                    file += 1;
                    previous_was_digit = false;
                }
            }
            if file != 8 {
                return Err(FenError::WrongFileCount {
                    rank: rank_idx,
                    files: file,
                });
            }
        }

        for color in Color::BOTH {
            let kings = pos.pieces(color, Piece::King).popcount();
            if kings != 1 {
                return Err(FenError::KingCount {
                    color,
                    found: kings as usize,
                });
            }
        }

        pos.side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        if parts[2] != "-" {
            if parts[2].is_empty() {
                return Err(FenError::InvalidCastling { char: ' ' });
            }
            for c in parts[2].chars() {
                match c {
                    'K' => pos.castling_rights.set(Color::White, true),
                    'Q' => pos.castling_rights.set(Color::White, false),
                    'k' => pos.castling_rights.set(Color::Black, true),
                    'q' => pos.castling_rights.set(Color::Black, false),
                    _ => return Err(FenError::InvalidCastling { char: c }),
                }
            }
        }

        pos.en_passant_target = if parts[3] == "-" {
            None
        } else {
            let sq: Square = parts[3].parse().map_err(|_| FenError::InvalidEnPassant {
                found: parts[3].to_string(),
            })?;
            // White captures onto rank 6, black onto rank 3
            let expected_rank = match pos.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            if sq.rank() != expected_rank {
                return Err(FenError::InvalidEnPassant {
                    found: parts[3].to_string(),
                });
            }
            Some(sq)
        };

        pos.halfmove_clock = parts[4].parse().map_err(|_| FenError::InvalidHalfmoveClock {
            found: parts[4].to_string(),
        })?;

        pos.fullmove_number = match parts[5].parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(FenError::InvalidFullmoveNumber {
                    found: parts[5].to_string(),
                })
            }
        };

        pos.ply = (pos.fullmove_number - 1) * 2
            + if pos.side_to_move == Color::Black { 1 } else { 0 };
        pos.hash = pos.compute_hash(rules);
        Ok(pos)
    }

    /// Convert the position to FEN notation.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut rows: Vec<String> = Vec::with_capacity(8);
        for rank in (0..8).rev() {
            let mut row = String::new();
            let mut empty = 0;
            for file in 0..8 {
                if let Some((color, piece)) = self.piece_at(Square(rank, file)) {
                    if empty > 0 {
                        row.push_str(&empty.to_string());
                        empty = 0;
                    }
                    row.push(piece.to_fen_char(color));
                } else {
                    empty += 1;
                }
            }
            if empty > 0 {
                row.push_str(&empty.to_string());
            }
            rows.push(row);
        }

        let active = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };
        let rights = self.castling_rights.as_u8();
        let mut castling = String::new();
        if rights & CASTLE_WHITE_K != 0 {
            castling.push('K');
        }
        if rights & CASTLE_WHITE_Q != 0 {
            castling.push('Q');
        }
        if rights & CASTLE_BLACK_K != 0 {
            castling.push('k');
        }
        if rights & CASTLE_BLACK_Q != 0 {
            castling.push('q');
        }
        if castling.is_empty() {
            castling.push('-');
        }
        let ep = self
            .en_passant_target
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {} {} {} {} {}",
            rows.join("/"),
            active,
            castling,
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}
