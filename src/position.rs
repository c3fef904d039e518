//! Position management for the engine.
//!
//! The rules of chess (move generation, legality, check detection, Zobrist
//! hashing) are owned by the `chess` crate; this module wraps its `Board` in
//! a `Position` that adds the bookkeeping the crate does not carry (the
//! fullmove number, which game-phase detection and time allocation need) and
//! exposes exactly the operations the search core consumes.
//!
//! Moves are applied copy-make: `apply` returns a new `Position` and never
//! mutates the parent, so every search frame owns its position exclusively
//! and there is nothing to restore on unwind.

use anyhow::{anyhow, bail, Context, Result};
use chess::{Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Position {
    board: Board,
    fullmove_number: u32,
}

impl Position {
    /// Creates the standard starting position.
    pub fn new() -> Self {
        Position {
            board: Board::default(),
            fullmove_number: 1,
        }
    }

    /// Parses a FEN string, including the fullmove counter in field six
    /// (which `chess::Board` itself ignores).
    pub fn from_fen(fen: &str) -> Result<Self> {
        let board = Board::from_str(fen).map_err(|e| anyhow!("invalid FEN '{}': {}", fen, e))?;
        let fullmove_number = match fen.split_whitespace().nth(5) {
            Some(field) => field
                .parse::<u32>()
                .with_context(|| format!("invalid fullmove counter in FEN '{}'", fen))?,
            None => 1,
        };
        Ok(Position {
            board,
            fullmove_number,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Applies a move, returning the resulting position. The parent is left
    /// untouched; callers keep it for the unwind path.
    pub fn apply(&self, mv: ChessMove) -> Position {
        let fullmove_number = if self.board.side_to_move() == Color::Black {
            self.fullmove_number + 1
        } else {
            self.fullmove_number
        };
        Position {
            board: self.board.make_move_new(mv),
            fullmove_number,
        }
    }

    /// All legal moves in generation order.
    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    /// A move is a capture if the destination is occupied or a pawn changes
    /// file onto an empty square (en passant).
    pub fn is_capture(&self, mv: ChessMove) -> bool {
        if self.board.piece_on(mv.get_dest()).is_some() {
            return true;
        }
        self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
    }

    /// Whether the move delivers check, determined on a scratch copy of the
    /// position; the position itself is never disturbed.
    pub fn gives_check(&self, mv: ChessMove) -> bool {
        self.board.make_move_new(mv).checkers().popcnt() > 0
    }

    pub fn is_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    pub fn status(&self) -> BoardStatus {
        self.board.status()
    }

    /// Canonical transposition key: the board's Zobrist hash.
    pub fn key(&self) -> u64 {
        self.board.get_hash()
    }

    /// Locates the king of the given color, or `None` if the board somehow
    /// has no such king.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        let mut kings = self.board.pieces(Piece::King) & self.board.color_combined(color);
        kings.next()
    }

    /// Parses a move in UCI coordinate notation (e.g. `e2e4`, `e7e8q`) and
    /// validates it against the legal moves of this position.
    pub fn parse_uci_move(&self, token: &str) -> Result<ChessMove> {
        let bytes = token.as_bytes();
        if bytes.len() < 4 || bytes.len() > 5 {
            bail!("malformed move token '{}'", token);
        }
        let src = square_from_bytes(bytes[0], bytes[1])
            .ok_or_else(|| anyhow!("malformed move token '{}'", token))?;
        let dest = square_from_bytes(bytes[2], bytes[3])
            .ok_or_else(|| anyhow!("malformed move token '{}'", token))?;
        let promotion = if bytes.len() == 5 {
            Some(match bytes[4] {
                b'q' => Piece::Queen,
                b'r' => Piece::Rook,
                b'b' => Piece::Bishop,
                b'n' => Piece::Knight,
                _ => bail!("malformed promotion in move token '{}'", token),
            })
        } else {
            None
        };
        let mv = ChessMove::new(src, dest, promotion);
        if !MoveGen::new_legal(&self.board).any(|m| m == mv) {
            bail!("illegal move '{}' in this position", token);
        }
        Ok(mv)
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

fn square_from_bytes(file: u8, rank: u8) -> Option<Square> {
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

/// Formats a move in UCI coordinate notation.
pub fn format_uci_move(mv: ChessMove) -> String {
    let mut s = format!("{}{}", mv.get_source(), mv.get_dest());
    match mv.get_promotion() {
        Some(Piece::Queen) => s.push('q'),
        Some(Piece::Rook) => s.push('r'),
        Some(Piece::Bishop) => s.push('b'),
        Some(Piece::Knight) => s.push('n'),
        _ => {}
    }
    s
}
