//! Canonical position keys.
//!
//! A key encodes piece placement, side to move, castling rights and the
//! en-passant target. The halfmove and fullmove counters are dropped so
//! games reaching the same position through different move orders collapse
//! to one key.

use shakmaty::{fen::Fen, Chess, EnPassantMode};

/// Key for the standard starting position.
pub const INITIAL_POSITION_KEY: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

/// Derive the canonical key for a board state.
///
/// The en-passant field is only populated when a legal en-passant capture
/// exists, so a double pawn push with no capturing pawn nearby keys the same
/// as the position reached without it.
pub fn position_key(pos: &Chess) -> String {
    let fen = Fen::from_position(pos, EnPassantMode::Legal).to_string();
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}
