use std::fmt;
use std::io;
use thiserror::Error;

/// Why the position oracle rejected a move token or a setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The token is neither SAN nor UCI.
    InvalidNotation,
    /// Well-formed notation that names no legal move.
    IllegalMove,
    /// SAN that matches more than one legal move.
    AmbiguousMove,
    /// A `FEN` header that does not describe a playable position.
    InvalidFen,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidNotation => "invalid notation",
            Self::IllegalMove => "illegal move",
            Self::AmbiguousMove => "ambiguous move",
            Self::InvalidFen => "invalid fen",
        })
    }
}

/// A move (or setup) the oracle refused, with enough context to diagnose it
/// without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal san: '{move_text}' in {fen} ({reason})")]
pub struct ValidationFailure {
    pub move_text: String,
    pub fen: String,
    pub reason: FailureReason,
}

#[derive(Debug, Error)]
pub enum PgnError {
    /// Unbalanced variation or comment delimiters, or a broken tag pair.
    #[error("malformed structure at line {line}: {reason}")]
    MalformedStructure { line: usize, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("invalid ply range {start}..={end} for a main line of {len} plies")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("failed to read PGN input: {0}")]
    Io(#[from] io::Error),
}

impl PgnError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedStructure {
            line,
            reason: reason.into(),
        }
    }

    /// Fills in the line of a structural error raised without one.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Self::MalformedStructure { line: 0, reason } => {
                Self::MalformedStructure { line, reason }
            }
            other => other,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedStructure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_message_names_illegal_san() {
        let failure = ValidationFailure {
            move_text: "e9e5".to_string(),
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            reason: FailureReason::InvalidNotation,
        };

        let msg = PgnError::from(failure).to_string();
        assert!(msg.starts_with("illegal san: 'e9e5' in rnbqkbnr/"));
        assert!(msg.ends_with("(invalid notation)"));
    }

    #[test]
    fn test_invalid_range_message_carries_bounds() {
        let err = PgnError::InvalidRange {
            start: 8,
            end: 7,
            len: 16,
        };
        assert_eq!(
            err.to_string(),
            "invalid ply range 8..=7 for a main line of 16 plies"
        );
    }

    #[test]
    fn test_malformed_helper() {
        let err = PgnError::malformed(3, "unbalanced ')'");
        assert!(err.is_malformed());
        assert_eq!(
            err.to_string(),
            "malformed structure at line 3: unbalanced ')'"
        );
    }
}
