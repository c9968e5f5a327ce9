//! Chess rules helpers built on shakmaty.

use crate::models::{LessonError, Result};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};

/// Parse and legality-check a FEN string.
pub fn parse_position(fen: &str) -> Result<Chess> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| LessonError::invalid_position(fen, e))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| LessonError::invalid_position(fen, e))
}

pub fn is_checkmate(fen: &str) -> Result<bool> {
    Ok(parse_position(fen)?.is_checkmate())
}

pub fn white_to_move(fen: &str) -> Result<bool> {
    Ok(parse_position(fen)?.turn() == Color::White)
}

/// Position reached after one legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Move in UCI notation
    pub uci: String,
    /// FEN after the move
    pub position: String,
    /// Side that made the move
    pub mover_is_white: bool,
    pub checkmate: bool,
    pub stalemate: bool,
}

/// Every legal reply from `fen`, in move-generation order.
pub fn reply_positions(fen: &str) -> Result<Vec<Reply>> {
    let pos = parse_position(fen)?;
    let mover_is_white = pos.turn() == Color::White;

    Ok(pos
        .legal_moves()
        .iter()
        .map(|m| {
            let mut next = pos.clone();
            next.play_unchecked(*m);
            Reply {
                uci: m.to_uci(CastlingMode::Standard).to_string(),
                checkmate: next.is_checkmate(),
                stalemate: next.is_stalemate(),
                position: Fen::from_position(&next, EnPassantMode::Legal).to_string(),
                mover_is_white,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    /// Fool's mate, White is mated
    const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
    /// Back-rank: Rd8# available
    const BACK_RANK: &str = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_position("not a fen").unwrap_err();
        assert!(err.is_invalid_input());
        assert!(parse_position(START).is_ok());
    }

    #[test]
    fn test_checkmate_detection() {
        assert!(is_checkmate(FOOLS_MATE).unwrap());
        assert!(!is_checkmate(START).unwrap());
        assert!(white_to_move(START).unwrap());
    }

    #[test]
    fn test_reply_positions() {
        let replies = reply_positions(START).unwrap();
        assert_eq!(replies.len(), 20);
        assert!(replies.iter().all(|r| r.mover_is_white && !r.checkmate));
        assert!(replies.iter().all(|r| r.position.contains(" b ")));

        let mates: Vec<_> = reply_positions(BACK_RANK)
            .unwrap()
            .into_iter()
            .filter(|r| r.checkmate)
            .collect();
        assert_eq!(mates.len(), 1);
        assert_eq!(mates[0].uci, "d1d8");
    }
}
