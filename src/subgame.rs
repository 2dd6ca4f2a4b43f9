use crate::error::PgnError;
use crate::oracle;
use crate::tree::{Game, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubGameOptions {
    /// Copy the alternatives to each copied main-line move.
    pub variations: bool,
    /// Restart move numbers at 1.
    pub renumber: bool,
}

/// Main-line plies `start..=end` (1-indexed) as a game of their own.
pub fn extract(game: &Game, start: usize, end: usize) -> Result<Game, PgnError> {
    extract_with(game, start, end, SubGameOptions::default())
}

/// Like [`extract`], with control over variations and numbering.
///
/// The new game starts from the position right before `start`. Headers and
/// result are kept; a `FEN` header, if any, is moved to the new start.
pub fn extract_with(
    game: &Game,
    start: usize,
    end: usize,
    options: SubGameOptions,
) -> Result<Game, PgnError> {
    let mainline: Vec<NodeId> = game.mainline().collect();
    let len = mainline.len();
    if start == 0 || start > end || end > len {
        return Err(PgnError::InvalidRange { start, end, len });
    }

    let first = mainline[start - 1];
    let before = game.node(first).parent().unwrap_or(NodeId::ROOT);
    let mut initial = game.position_at(before);
    if options.renumber
        && let Some(renumbered) = oracle::with_fullmoves(&initial, 1)
    {
        initial = renumbered;
    }

    let mut headers = game.headers().clone();
    if headers.contains("FEN") {
        headers.insert("FEN", oracle::fen(&initial));
    }

    let mut sub = Game::new(headers, initial);
    sub.set_result(game.result().map(str::to_string));
    if start == 1 {
        for comment in game.node(NodeId::ROOT).comments() {
            sub.node_mut(NodeId::ROOT).push_comment(comment.clone());
        }
    }

    let mut at = NodeId::ROOT;
    for &id in &mainline[start - 1..end] {
        let copied = sub.attach(at, game.node(id));
        if options.variations {
            let parent = game.node(id).parent().unwrap_or(NodeId::ROOT);
            for &alt in &game.node(parent).variations()[1..] {
                copy_subtree(game, alt, &mut sub, at);
            }
        }
        at = copied;
    }

    Ok(sub)
}

/// Deep-copies `src` and everything below it under `dst_parent`.
fn copy_subtree(game: &Game, src: NodeId, sub: &mut Game, dst_parent: NodeId) {
    let mut stack = vec![(src, dst_parent)];
    while let Some((src, parent)) = stack.pop() {
        let copied = sub.attach(parent, game.node(src));
        for &child in game.node(src).variations().iter().rev() {
            stack.push((child, copied));
        }
    }
}

impl Game {
    pub fn subgame(&self, start: usize, end: usize) -> Result<Game, PgnError> {
        extract(self, start, end)
    }
}
