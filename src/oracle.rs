use crate::error::{FailureReason, ValidationFailure};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanError, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};

pub fn initial_position() -> Chess {
    Chess::default()
}

/// Loads a setup position, trying standard castling rights first.
pub fn position_from_fen(fen: &str, chess960: bool) -> Result<Chess, ValidationFailure> {
    let invalid = || ValidationFailure {
        move_text: String::new(),
        fen: fen.to_string(),
        reason: FailureReason::InvalidFen,
    };

    let parsed = Fen::from_ascii(fen.trim().as_bytes()).map_err(|_| invalid())?;
    let mode = if chess960 {
        CastlingMode::Chess960
    } else {
        CastlingMode::Standard
    };

    match parsed.clone().into_position::<Chess>(mode) {
        Ok(pos) => Ok(pos),
        Err(_) if mode == CastlingMode::Standard => parsed
            .into_position::<Chess>(CastlingMode::Chess960)
            .map_err(|_| invalid()),
        Err(_) => Err(invalid()),
    }
}

/// Validates a SAN or UCI token against `pos` and plays it.
pub fn apply(pos: &Chess, token: &str) -> Result<(Move, Chess), ValidationFailure> {
    let m = resolve(pos, token).map_err(|reason| ValidationFailure {
        move_text: token.to_string(),
        fen: fen(pos),
        reason,
    })?;

    let mut next = pos.clone();
    next.play_unchecked(m.clone());
    Ok((m, next))
}

fn resolve(pos: &Chess, token: &str) -> Result<Move, FailureReason> {
    if let Ok(san_plus) = token.parse::<SanPlus>() {
        match san_plus.san.to_move(pos) {
            Ok(m) => return Ok(m),
            Err(SanError::AmbiguousSan) => return Err(FailureReason::AmbiguousMove),
            // "e2e4" may parse as SAN yet only resolve as UCI.
            Err(_) => {}
        }
    }

    match token.parse::<UciMove>() {
        Ok(uci) => uci.to_move(pos).map_err(|_| FailureReason::IllegalMove),
        Err(_) if token.parse::<San>().is_ok() => Err(FailureReason::IllegalMove),
        Err(_) => Err(FailureReason::InvalidNotation),
    }
}

/// SAN with check/mate suffix, as it reads in `pos`.
pub fn render_san(pos: &Chess, m: &Move) -> String {
    let mut scratch = pos.clone();
    SanPlus::from_move_and_play_unchecked(&mut scratch, m.clone()).to_string()
}

pub fn render_uci(m: &Move) -> String {
    m.to_uci(CastlingMode::Standard).to_string()
}

pub fn fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// FEN without the move counters: board, turn, castling, en passant.
pub fn epd(pos: &Chess) -> String {
    fen(pos)
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `pos` with its full-move counter replaced.
pub(crate) fn with_fullmoves(pos: &Chess, fullmoves: u32) -> Option<Chess> {
    let fields: Vec<String> = fen(pos).split_whitespace().map(str::to_string).collect();
    if fields.len() != 6 {
        return None;
    }
    let renumbered = format!("{} {}", fields[..5].join(" "), fullmoves.max(1));
    position_from_fen(&renumbered, false).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::Color;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_apply_san_and_uci() {
        let start = initial_position();
        let (m, after) = apply(&start, "e4").unwrap();
        assert_eq!(render_san(&start, &m), "e4");
        assert_eq!(after.turn(), Color::Black);

        let (m, _) = apply(&start, "g1f3").unwrap();
        assert_eq!(render_san(&start, &m), "Nf3");
        assert_eq!(render_uci(&m), "g1f3");
    }

    #[test]
    fn test_apply_rejects_garbage_with_context() {
        let start = initial_position();
        let failure = apply(&start, "e9e5").unwrap_err();
        assert_eq!(failure.move_text, "e9e5");
        assert_eq!(failure.fen, START_FEN);
        assert_eq!(failure.reason, FailureReason::InvalidNotation);
    }

    #[test]
    fn test_apply_rejects_illegal_move() {
        let start = initial_position();
        let failure = apply(&start, "Ke2").unwrap_err();
        assert_eq!(failure.reason, FailureReason::IllegalMove);
    }

    #[test]
    fn test_render_san_marks_check_and_mate() {
        let mut pos = initial_position();
        for token in ["e4", "e5", "Qh5", "Nc6", "Bc4", "Nf6"] {
            pos = apply(&pos, token).unwrap().1;
        }
        let (m, _) = apply(&pos, "Qxf7").unwrap();
        assert_eq!(render_san(&pos, &m), "Qxf7#");
    }

    #[test]
    fn test_fen_and_epd() {
        let start = initial_position();
        assert_eq!(fen(&start), START_FEN);
        assert_eq!(
            epd(&start),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"
        );
    }

    #[test]
    fn test_position_from_fen_rejects_invalid_setup() {
        assert!(position_from_fen("8/8/8/8/8/8/8/K6k w - - 0 1", false).is_ok());
        let failure = position_from_fen("not a fen", false).unwrap_err();
        assert_eq!(failure.reason, FailureReason::InvalidFen);
    }

    #[test]
    fn test_with_fullmoves_resets_counter() {
        let mut pos = initial_position();
        for token in ["e4", "e5"] {
            pos = apply(&pos, token).unwrap().1;
        }
        let renumbered = with_fullmoves(&pos, 1).unwrap();
        assert!(fen(&renumbered).ends_with(" w KQkq - 0 1"));
    }
}
