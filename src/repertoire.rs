use crate::export::{comment_token, move_number};
use crate::oracle;
use crate::tree::{Game, NodeId};
use shakmaty::{Chess, Color, Position};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepertoireEntry {
    /// Full FEN before the opponent's move.
    pub fen: String,
    pub move_text: String,
}

pub fn extract(game: &Game, side: Color) -> RepertoirePositions<'_> {
    RepertoirePositions::new(game, side)
}

/// Lazy depth-first walk, main line first.
pub struct RepertoirePositions<'a> {
    game: &'a Game,
    side: Color,
    /// Move node, position before it, whether it is on the main line.
    stack: Vec<(NodeId, Chess, bool)>,
    seen: HashSet<String>,
}

impl<'a> RepertoirePositions<'a> {
    fn new(game: &'a Game, side: Color) -> Self {
        let mut walk = Self {
            game,
            side,
            stack: Vec::new(),
            seen: HashSet::new(),
        };
        walk.push_children(NodeId::ROOT, game.initial_position(), true);
        walk
    }

    fn push_children(&mut self, id: NodeId, pos: &Chess, mainline: bool) {
        let children = self.game.node(id).variations();
        for (i, &child) in children.iter().enumerate().rev() {
            self.stack.push((child, pos.clone(), mainline && i == 0));
        }
    }

    fn move_text(&self, id: NodeId, before: &Chess, after: &Chess) -> String {
        let node = self.game.node(id);
        let mut parts = vec![move_number(before)];
        if let Some(m) = node.mv() {
            parts.push(oracle::render_san(before, m));
        }
        parts.extend(node.comments().iter().map(|c| comment_token(c)));

        if let Some(reply) = node.main_child() {
            let reply = self.game.node(reply);
            if let Some(m) = reply.mv() {
                if after.turn() == Color::White {
                    parts.push(move_number(after));
                }
                parts.push(oracle::render_san(after, m));
                parts.extend(reply.comments().iter().map(|c| comment_token(c)));
            }
        }
        parts.join(" ")
    }
}

impl Iterator for RepertoirePositions<'_> {
    type Item = RepertoireEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, before, mainline)) = self.stack.pop() {
            let Some(m) = self.game.node(id).mv() else {
                continue;
            };
            let mut after = before.clone();
            after.play_unchecked(m.clone());
            self.push_children(id, &after, mainline);

            if before.turn() == self.side {
                continue;
            }
            if mainline && !self.seen.insert(oracle::epd(&before)) {
                continue;
            }

            return Some(RepertoireEntry {
                fen: oracle::fen(&before),
                move_text: self.move_text(id, &before, &after),
            });
        }
        None
    }
}

impl Game {
    pub fn repertoire(&self, side: Color) -> RepertoirePositions<'_> {
        extract(self, side)
    }
}
