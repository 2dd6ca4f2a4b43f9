use crate::annotations::{self, Eval};
use crate::error::ValidationFailure;
use crate::headers::Headers;
use crate::oracle;
use shakmaty::{Chess, Move, Position};
use smallvec::SmallVec;
use std::time::Duration;

/// NAG codes on one node, sorted and free of duplicates.
pub type Nags = SmallVec<[u8; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameNode {
    mv: Option<Move>,
    parent: Option<NodeId>,
    variations: Vec<NodeId>,
    comments: Vec<String>,
    starting_comments: Vec<String>,
    nags: Nags,
}

impl GameNode {
    fn new(mv: Option<Move>, parent: Option<NodeId>) -> Self {
        Self {
            mv,
            parent,
            variations: Vec::new(),
            comments: Vec::new(),
            starting_comments: Vec::new(),
            nags: Nags::new(),
        }
    }

    /// Move leading to this node; `None` for the root.
    pub fn mv(&self) -> Option<&Move> {
        self.mv.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children, main continuation first.
    pub fn variations(&self) -> &[NodeId] {
        &self.variations
    }

    pub fn main_child(&self) -> Option<NodeId> {
        self.variations.first().copied()
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Comments written before the move, at the start of a variation.
    pub fn starting_comments(&self) -> &[String] {
        &self.starting_comments
    }

    pub fn nags(&self) -> &[u8] {
        &self.nags
    }

    pub(crate) fn push_comment(&mut self, comment: String) {
        self.comments.push(comment);
    }

    pub(crate) fn push_starting_comment(&mut self, comment: String) {
        self.starting_comments.push(comment);
    }

    pub(crate) fn insert_nag(&mut self, nag: u8) {
        if let Err(at) = self.nags.binary_search(&nag) {
            self.nags.insert(at, nag);
        }
    }

    /// Copy of the annotations without the tree links.
    pub(crate) fn detached(&self, parent: Option<NodeId>) -> Self {
        Self {
            mv: self.mv.clone(),
            parent,
            variations: Vec::new(),
            comments: self.comments.clone(),
            starting_comments: self.starting_comments.clone(),
            nags: self.nags.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Game {
    headers: Headers,
    nodes: Vec<GameNode>,
    initial: Chess,
    result: Option<String>,
    errors: Vec<ValidationFailure>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new(Headers::new(), oracle::initial_position())
    }
}

impl Game {
    pub(crate) fn new(headers: Headers, initial: Chess) -> Self {
        Self {
            headers,
            nodes: vec![GameNode::new(None, None)],
            initial,
            result: None,
            errors: Vec::new(),
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Validation failures recorded while building leniently.
    pub fn errors(&self) -> &[ValidationFailure] {
        &self.errors
    }

    /// Result token found at the end of the movetext.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn initial_position(&self) -> &Chess {
        &self.initial
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &GameNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[GameNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Main-line nodes after the root, in order. The n-th item is ply n.
    pub fn mainline(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(NodeId::ROOT).main_child(), |id| {
            self.node(*id).main_child()
        })
    }

    pub fn mainline_moves(&self) -> Vec<Move> {
        self.mainline()
            .filter_map(|id| self.node(id).mv.clone())
            .collect()
    }

    pub fn mainline_sans(&self) -> Vec<String> {
        let mut pos = self.initial.clone();
        let mut sans = Vec::new();
        for m in self.mainline_moves() {
            sans.push(oracle::render_san(&pos, &m));
            pos.play_unchecked(m);
        }
        sans
    }

    pub fn ply_count(&self) -> usize {
        self.mainline().count()
    }

    /// Distance from the root: 0 for the root, 1 for the first move.
    pub fn ply(&self, id: NodeId) -> usize {
        self.path_from_root(id).len()
    }

    pub fn is_mainline(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            if self.node(parent).main_child() != Some(current) {
                return false;
            }
            current = parent;
        }
        true
    }

    /// Position reached at `id`, replayed from the initial position.
    pub fn position_at(&self, id: NodeId) -> Chess {
        let mut pos = self.initial.clone();
        for step in self.path_from_root(id) {
            if let Some(m) = &self.node(step).mv {
                pos.play_unchecked(m.clone());
            }
        }
        pos
    }

    pub fn fen_at(&self, id: NodeId) -> String {
        oracle::fen(&self.position_at(id))
    }

    /// SAN of the move leading to `id`.
    pub fn san(&self, id: NodeId) -> Option<String> {
        let node = self.node(id);
        let m = node.mv.as_ref()?;
        let before = self.position_at(node.parent?);
        Some(oracle::render_san(&before, m))
    }

    pub fn uci(&self, id: NodeId) -> Option<String> {
        self.node(id).mv.as_ref().map(oracle::render_uci)
    }

    /// Clock time left after the move at `id`, from `[%clk]` markup.
    pub fn clock(&self, id: NodeId) -> Option<Duration> {
        self.node(id)
            .comments
            .iter()
            .find_map(|comment| annotations::clock(comment))
    }

    /// Engine evaluation after the move at `id`, from `[%eval]` markup.
    pub fn eval(&self, id: NodeId) -> Option<Eval> {
        self.node(id)
            .comments
            .iter()
            .find_map(|comment| annotations::eval(comment))
    }

    /// Nodes from the first move down to `id`, root excluded.
    fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            path.push(current);
            current = parent;
        }
        path.reverse();
        path
    }

    pub(crate) fn add_node(&mut self, parent: NodeId, mv: Move) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(GameNode::new(Some(mv), Some(parent)));
        self.nodes[parent.0].variations.push(id);
        id
    }

    /// Appends a detached copy of `node` under `parent`.
    pub(crate) fn attach(&mut self, parent: NodeId, node: &GameNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node.detached(Some(parent)));
        self.nodes[parent.0].variations.push(id);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut GameNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn set_result(&mut self, result: Option<String>) {
        self.result = result;
    }

    pub(crate) fn set_headers(&mut self, headers: Headers) {
        self.headers = headers;
    }

    pub(crate) fn set_initial(&mut self, initial: Chess) {
        self.initial = initial;
    }

    pub(crate) fn push_error(&mut self, failure: ValidationFailure) {
        self.errors.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_from_sans(sans: &[&str]) -> Game {
        let mut game = Game::default();
        let mut pos = oracle::initial_position();
        let mut at = game.root();
        for san in sans {
            let (m, next) = oracle::apply(&pos, san).unwrap();
            at = game.add_node(at, m);
            pos = next;
        }
        game
    }

    #[test]
    fn test_mainline_and_ply_numbering() {
        let game = game_from_sans(&["e4", "e5", "Nf3"]);
        let ids: Vec<_> = game.mainline().collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(game.ply(ids[0]), 1);
        assert_eq!(game.ply(ids[2]), 3);
        assert_eq!(game.ply(game.root()), 0);
        assert_eq!(game.mainline_sans(), vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_position_is_replayed_not_stored() {
        let game = game_from_sans(&["e4", "e5"]);
        let last = game.mainline().last().unwrap();
        assert_eq!(
            game.fen_at(last),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
        );
        assert_eq!(game.san(last).as_deref(), Some("e5"));
        assert_eq!(game.uci(last).as_deref(), Some("e7e5"));
    }

    #[test]
    fn test_variation_is_not_mainline() {
        let mut game = game_from_sans(&["e4", "e5"]);
        let e4 = game.mainline().next().unwrap();
        let pos = game.position_at(e4);
        let (m, _) = oracle::apply(&pos, "c5").unwrap();
        let c5 = game.add_node(e4, m);

        assert!(!game.is_mainline(c5));
        assert!(game.is_mainline(e4));
        assert_eq!(game.node(e4).variations().len(), 2);
        assert_eq!(game.ply_count(), 2);
    }

    #[test]
    fn test_nags_are_a_sorted_set() {
        let mut game = game_from_sans(&["e4"]);
        let e4 = game.mainline().next().unwrap();
        let node = game.node_mut(e4);
        node.insert_nag(14);
        node.insert_nag(1);
        node.insert_nag(14);
        assert_eq!(game.node(e4).nags(), &[1, 14]);
    }

    #[test]
    fn test_clock_and_eval_from_comments() {
        let mut game = game_from_sans(&["d4"]);
        let d4 = game.mainline().next().unwrap();
        game.node_mut(d4)
            .push_comment("[%eval 0.25] [%clk 1:30:43]".to_string());

        assert_eq!(game.clock(d4), Some(Duration::from_secs(5443)));
        assert_eq!(game.eval(d4), Some(Eval::Pawns(0.25)));
    }
}
