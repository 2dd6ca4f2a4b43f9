use crate::error::{PgnError, ValidationFailure};
use crate::headers::Headers;
use crate::oracle;
use crate::tree::{Game, NodeId};
use shakmaty::Chess;
use std::mem;
use tracing::{debug, warn};

/// Receives the token stream of one game.
///
/// The reader calls `begin_game` before the first token of a game and
/// `end_game` after its last one. Returning an error from any method aborts
/// the current read.
pub trait Visitor {
    type Output;

    fn begin_game(&mut self) {}

    fn tag(&mut self, _name: &str, _value: &str) -> Result<(), PgnError> {
        Ok(())
    }

    /// A move token, SAN or UCI, with move numbers and suffixes stripped.
    fn san(&mut self, token: &str) -> Result<(), PgnError>;

    fn comment(&mut self, _comment: &str) -> Result<(), PgnError> {
        Ok(())
    }

    fn nag(&mut self, _nag: u8) -> Result<(), PgnError> {
        Ok(())
    }

    fn begin_variation(&mut self) -> Result<(), PgnError> {
        Ok(())
    }

    fn end_variation(&mut self) -> Result<(), PgnError> {
        Ok(())
    }

    fn outcome(&mut self, _result: &str) -> Result<(), PgnError> {
        Ok(())
    }

    fn end_game(&mut self) -> Result<Self::Output, PgnError>;
}

/// Reaction to a move the position oracle rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the failure on the game, truncate the line, keep going.
    #[default]
    Lenient,
    /// Abort the whole read on the first failure.
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub policy: ErrorPolicy,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            policy: ErrorPolicy::Strict,
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: ErrorPolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Live,
    /// A move failed; `discarded` tokens were dropped after it.
    Failed { discarded: usize },
    /// Position unknown for the whole line.
    Dead,
}

#[derive(Debug, Clone)]
struct Frame {
    /// Node the next move is added under.
    at: NodeId,
    /// Position at `at`.
    pos: Chess,
    /// `at`'s parent and its position, where variations on `at` branch off.
    prev: Option<(NodeId, Chess)>,
    moves: usize,
    state: LineState,
    starting_comments: Vec<String>,
}

impl Frame {
    fn live(at: NodeId, pos: Chess) -> Self {
        Self {
            at,
            pos,
            prev: None,
            moves: 0,
            state: LineState::Live,
            starting_comments: Vec::new(),
        }
    }

    fn dead(at: NodeId, pos: Chess) -> Self {
        Self {
            state: LineState::Dead,
            ..Self::live(at, pos)
        }
    }
}

/// Builds a [`Game`] tree from the token stream.
///
/// One builder can be reused for any number of games; each `end_game` hands
/// over the finished game and resets the builder.
pub struct GameBuilder {
    policy: ErrorPolicy,
    headers: Headers,
    game: Game,
    frames: Vec<Frame>,
    in_movetext: bool,
}

impl GameBuilder {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            headers: Headers::new(),
            game: Game::default(),
            frames: Vec::new(),
            in_movetext: false,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    fn reset(&mut self) {
        self.headers = Headers::new();
        self.game = Game::default();
        self.frames = vec![Frame::live(NodeId::ROOT, oracle::initial_position())];
        self.in_movetext = false;
    }

    /// Applies the setup position once the tag section is over.
    fn enter_movetext(&mut self) -> Result<(), PgnError> {
        if self.in_movetext {
            return Ok(());
        }
        self.in_movetext = true;

        let Some(fen) = self.headers.fen() else {
            return Ok(());
        };
        match oracle::position_from_fen(fen, self.headers.is_chess960()) {
            Ok(pos) => {
                self.game.set_initial(pos.clone());
                self.frames = vec![Frame::live(NodeId::ROOT, pos)];
                Ok(())
            }
            Err(failure) => {
                self.reject(failure)?;
                self.frames = vec![Frame::dead(NodeId::ROOT, oracle::initial_position())];
                Ok(())
            }
        }
    }

    /// Lenient: record and carry on. Strict: fail.
    fn reject(&mut self, failure: ValidationFailure) -> Result<(), PgnError> {
        match self.policy {
            ErrorPolicy::Strict => Err(failure.into()),
            ErrorPolicy::Lenient => {
                warn!(
                    move_text = %failure.move_text,
                    fen = %failure.fen,
                    reason = %failure.reason,
                    "validation failure recorded, line truncated"
                );
                self.game.push_error(failure);
                Ok(())
            }
        }
    }

    fn current(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }
}

impl Default for GameBuilder {
    fn default() -> Self {
        Self::new(ErrorPolicy::default())
    }
}

impl Visitor for GameBuilder {
    type Output = Game;

    fn begin_game(&mut self) {
        self.reset();
    }

    fn tag(&mut self, name: &str, value: &str) -> Result<(), PgnError> {
        self.headers.insert(name, value);
        Ok(())
    }

    fn san(&mut self, token: &str) -> Result<(), PgnError> {
        self.enter_movetext()?;
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };

        match &mut frame.state {
            LineState::Live => {}
            LineState::Failed { discarded } => {
                *discarded += 1;
                debug!(token, "discarding move on truncated line");
                return Ok(());
            }
            LineState::Dead => {
                debug!(token, "discarding move on unreachable line");
                return Ok(());
            }
        }

        match oracle::apply(&frame.pos, token) {
            Ok((m, next)) => {
                let id = self.game.add_node(frame.at, m);
                let node = self.game.node_mut(id);
                for comment in frame.starting_comments.drain(..) {
                    node.push_starting_comment(comment);
                }
                let before = mem::replace(&mut frame.pos, next);
                frame.prev = Some((frame.at, before));
                frame.at = id;
                frame.moves += 1;
                Ok(())
            }
            Err(failure) => {
                frame.state = LineState::Failed { discarded: 0 };
                self.reject(failure)
            }
        }
    }

    fn comment(&mut self, comment: &str) -> Result<(), PgnError> {
        self.enter_movetext()?;
        let depth = self.frames.len();
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };

        if frame.state != LineState::Live {
            debug!(comment, "discarding comment on truncated line");
        } else if frame.moves > 0 {
            self.game.node_mut(frame.at).push_comment(comment.to_string());
        } else if depth == 1 {
            self.game.node_mut(NodeId::ROOT).push_comment(comment.to_string());
        } else {
            frame.starting_comments.push(comment.to_string());
        }
        Ok(())
    }

    fn nag(&mut self, nag: u8) -> Result<(), PgnError> {
        self.enter_movetext()?;
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };

        if frame.state == LineState::Live && frame.moves > 0 {
            self.game.node_mut(frame.at).insert_nag(nag);
        } else {
            debug!(nag, "discarding nag without a move");
        }
        Ok(())
    }

    fn begin_variation(&mut self) -> Result<(), PgnError> {
        self.enter_movetext()?;
        let Some(frame) = self.current() else {
            return Ok(());
        };

        let child = match frame.state {
            LineState::Live => match &frame.prev {
                Some((at, pos)) => Frame::live(*at, pos.clone()),
                None => {
                    return Err(PgnError::malformed(0, "variation before any move"));
                }
            },
            // Alternative to the move that failed: same start position.
            LineState::Failed { discarded: 0 } => Frame::live(frame.at, frame.pos.clone()),
            LineState::Failed { .. } | LineState::Dead => {
                Frame::dead(frame.at, frame.pos.clone())
            }
        };
        self.frames.push(child);
        Ok(())
    }

    fn end_variation(&mut self) -> Result<(), PgnError> {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
        Ok(())
    }

    fn outcome(&mut self, result: &str) -> Result<(), PgnError> {
        self.enter_movetext()?;
        self.game.set_result(Some(result.to_string()));
        Ok(())
    }

    fn end_game(&mut self) -> Result<Game, PgnError> {
        self.enter_movetext()?;
        let mut game = mem::take(&mut self.game);
        game.set_headers(mem::take(&mut self.headers));
        self.frames.clear();
        self.in_movetext = false;
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;

    fn build(policy: ErrorPolicy, events: &[&str]) -> Result<Game, PgnError> {
        let mut builder = GameBuilder::new(policy);
        builder.begin_game();
        for event in events {
            match *event {
                "(" => builder.begin_variation()?,
                ")" => builder.end_variation()?,
                e if e.starts_with('{') => builder.comment(e.trim_matches(['{', '}']))?,
                e if e.starts_with('$') => builder.nag(e[1..].parse().unwrap())?,
                e => builder.san(e)?,
            }
        }
        builder.end_game()
    }

    #[test]
    fn test_builds_mainline_with_variation() {
        let game = build(ErrorPolicy::Lenient, &["e4", "e5", "(", "c5", ")", "Nf3"]).unwrap();
        assert_eq!(game.mainline_sans(), vec!["e4", "e5", "Nf3"]);

        let e4 = game.mainline().next().unwrap();
        let alternatives = game.node(e4).variations();
        assert_eq!(alternatives.len(), 2);
        assert_eq!(game.san(alternatives[1]).as_deref(), Some("c5"));
        assert!(game.errors().is_empty());
    }

    #[test]
    fn test_lenient_records_and_truncates() {
        let game = build(ErrorPolicy::Lenient, &["e4", "Ke3", "Nf3", "Nc6"]).unwrap();
        assert_eq!(game.mainline_sans(), vec!["e4"]);
        assert_eq!(game.errors().len(), 1);
        assert_eq!(game.errors()[0].move_text, "Ke3");
        assert_eq!(game.errors()[0].reason, FailureReason::IllegalMove);
    }

    #[test]
    fn test_strict_fails_fast() {
        let err = build(ErrorPolicy::Strict, &["e4", "Ke3", "Nf3"]).unwrap_err();
        assert!(matches!(err, PgnError::Validation(_)));
        assert!(err.to_string().contains("illegal san"));
    }

    #[test]
    fn test_variation_right_after_failure_is_alternative_to_it() {
        let game = build(
            ErrorPolicy::Lenient,
            &["e4", "Ke3", "(", "e5", "Nf3", ")", "Nc6"],
        )
        .unwrap();
        assert_eq!(game.errors().len(), 1);

        let e4 = game.mainline().next().unwrap();
        // The variation replaces the failed reply, so it becomes e4's only child.
        assert_eq!(game.node(e4).variations().len(), 1);
        assert_eq!(game.mainline_sans(), vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_variation_after_discarded_moves_is_dropped() {
        let game = build(
            ErrorPolicy::Lenient,
            &["e4", "Ke3", "Nf3", "(", "d4", ")", "Nc6"],
        )
        .unwrap();
        assert_eq!(game.node_count(), 2);
        assert_eq!(game.errors().len(), 1);
    }

    #[test]
    fn test_failure_inside_variation_keeps_mainline() {
        let game = build(
            ErrorPolicy::Lenient,
            &["e4", "e5", "(", "c5", "Qxf7", ")", "Nf3", "Nc6"],
        )
        .unwrap();
        assert_eq!(game.mainline_sans(), vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(game.errors().len(), 1);
        assert_eq!(game.errors()[0].move_text, "Qxf7");
    }

    #[test]
    fn test_comments_and_nags_attach_to_nodes() {
        let game = build(
            ErrorPolicy::Lenient,
            &["{opening}", "e4", "$1", "{best}", "e5", "(", "{alt}", "c5", ")"],
        )
        .unwrap();
        assert_eq!(game.node(game.root()).comments(), &["opening".to_string()]);

        let e4 = game.mainline().next().unwrap();
        assert_eq!(game.node(e4).nags(), &[1]);
        assert_eq!(game.node(e4).comments(), &["best".to_string()]);

        let c5 = game.node(e4).variations()[1];
        assert_eq!(game.node(c5).starting_comments(), &["alt".to_string()]);
    }

    #[test]
    fn test_variation_before_any_move_is_malformed() {
        let err = build(ErrorPolicy::Lenient, &["(", "e4", ")"]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_fen_header_sets_initial_position() {
        let mut builder = GameBuilder::new(ErrorPolicy::Strict);
        builder.begin_game();
        builder.tag("SetUp", "1").unwrap();
        builder
            .tag("FEN", "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1")
            .unwrap();
        builder.san("e4").unwrap();
        builder.san("Kd7").unwrap();
        let game = builder.end_game().unwrap();

        assert_eq!(game.mainline_sans(), vec!["e4", "Kd7"]);
        assert_eq!(
            oracle::fen(game.initial_position()),
            "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"
        );
    }

    #[test]
    fn test_invalid_fen_header_lenient_vs_strict() {
        for policy in [ErrorPolicy::Lenient, ErrorPolicy::Strict] {
            let mut builder = GameBuilder::new(policy);
            builder.begin_game();
            builder.tag("FEN", "garbage").unwrap();
            let result = builder.san("e4");
            match policy {
                ErrorPolicy::Strict => assert!(result.is_err()),
                ErrorPolicy::Lenient => {
                    result.unwrap();
                    let game = builder.end_game().unwrap();
                    assert_eq!(game.ply_count(), 0);
                    assert_eq!(game.errors()[0].reason, FailureReason::InvalidFen);
                }
            }
        }
    }
}
