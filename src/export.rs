use crate::oracle;
use crate::tree::{Game, NodeId};
use shakmaty::{Chess, Color, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub headers: bool,
    /// Comments and NAGs.
    pub comments: bool,
    pub variations: bool,
    /// Maximum line width; `None` writes the movetext on one line.
    pub columns: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            headers: true,
            comments: true,
            variations: true,
            columns: Some(80),
        }
    }
}

impl ExportOptions {
    /// Main line only, no headers or annotations, one line.
    pub fn bare() -> Self {
        Self {
            headers: false,
            comments: false,
            variations: false,
            columns: None,
        }
    }
}

pub fn export(game: &Game, options: &ExportOptions) -> String {
    let mut out = String::new();

    if options.headers {
        let mut lines: Vec<String> = game
            .headers()
            .iter()
            .map(|(name, value)| tag_line(name, value))
            .collect();
        let initial = oracle::fen(game.initial_position());
        if !game.headers().contains("FEN") && initial != oracle::fen(&oracle::initial_position())
        {
            if !game.headers().contains("SetUp") {
                lines.push(tag_line("SetUp", "1"));
            }
            lines.push(tag_line("FEN", &initial));
        }
        if !lines.is_empty() {
            out.push_str(&lines.join("\n"));
            out.push_str("\n\n");
        }
    }

    let mut writer = MovetextWriter::new(game, options);
    writer.root();
    writer.line(game.root(), game.initial_position().clone(), true);
    writer.push(result_token(game));

    out.push_str(&layout(&writer.tokens, options.columns));
    out
}

/// `Result` header, else the movetext result, else `*`.
pub fn result_token(game: &Game) -> String {
    game.headers()
        .result()
        .or(game.result())
        .unwrap_or("*")
        .to_string()
}

impl Game {
    /// PGN text with [`ExportOptions::default`].
    pub fn to_pgn(&self) -> String {
        export(self, &ExportOptions::default())
    }
}

fn tag_line(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{name} \"{escaped}\"]")
}

pub(crate) fn comment_token(comment: &str) -> String {
    format!("{{ {} }}", comment.replace('}', "").trim())
}

/// `N.` for White, `N...` for Black.
pub(crate) fn move_number(pos: &Chess) -> String {
    match pos.turn() {
        Color::White => format!("{}.", pos.fullmoves()),
        Color::Black => format!("{}...", pos.fullmoves()),
    }
}

struct MovetextWriter<'a> {
    game: &'a Game,
    options: &'a ExportOptions,
    tokens: Vec<String>,
}

impl<'a> MovetextWriter<'a> {
    fn new(game: &'a Game, options: &'a ExportOptions) -> Self {
        Self {
            game,
            options,
            tokens: Vec::new(),
        }
    }

    fn push(&mut self, token: String) {
        self.tokens.push(token);
    }

    fn root(&mut self) {
        if self.options.comments {
            for comment in self.game.node(NodeId::ROOT).comments() {
                self.push(comment_token(comment));
            }
        }
    }

    /// Writes the continuation below `from`, whose position is `pos`.
    fn line(&mut self, from: NodeId, mut pos: Chess, mut force_number: bool) {
        let game = self.game;
        let mut at = from;
        while let Some(main) = game.node(at).main_child() {
            force_number = self.write_move(main, &pos, force_number);

            if self.options.variations {
                for &alt in &game.node(at).variations()[1..] {
                    self.push("(".to_string());
                    let after_comment = self.write_move(alt, &pos, true);
                    if let Some(m) = game.node(alt).mv() {
                        let mut next = pos.clone();
                        next.play_unchecked(m.clone());
                        self.line(alt, next, after_comment);
                    }
                    self.push(")".to_string());
                    force_number = true;
                }
            }

            let Some(m) = game.node(main).mv() else {
                break;
            };
            pos.play_unchecked(m.clone());
            at = main;
        }
    }

    /// Returns whether the next move needs its number repeated.
    fn write_move(&mut self, id: NodeId, before: &Chess, mut force_number: bool) -> bool {
        let node = self.game.node(id);
        let Some(m) = node.mv() else {
            return force_number;
        };

        if self.options.comments && !node.starting_comments().is_empty() {
            for comment in node.starting_comments() {
                self.push(comment_token(comment));
            }
            force_number = true;
        }

        if before.turn() == Color::White || force_number {
            self.push(move_number(before));
        }
        self.push(oracle::render_san(before, m));

        if !self.options.comments {
            return false;
        }
        for nag in node.nags() {
            self.push(format!("${nag}"));
        }
        for comment in node.comments() {
            self.push(comment_token(comment));
        }
        !node.comments().is_empty()
    }
}

/// Joins tokens with single spaces, gluing parentheses to their contents.
fn layout(tokens: &[String], columns: Option<usize>) -> String {
    let mut out = String::new();
    let mut line_len = 0;
    let mut prev: Option<&str> = None;

    for token in tokens {
        let glued = prev.is_none() || prev == Some("(") || token == ")";
        let width = token.chars().count();
        let sep = usize::from(!glued);

        match columns {
            Some(max) if prev.is_some() && line_len + sep + width > max => {
                out.push('\n');
                line_len = 0;
            }
            _ if !glued => {
                out.push(' ');
                line_len += 1;
            }
            _ => {}
        }
        out.push_str(token);
        line_len += width;
        prev = Some(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_game;
    use crate::visitor::ParseOptions;

    fn game(pgn: &str) -> Game {
        parse_game(pgn, ParseOptions::strict()).unwrap().unwrap()
    }

    #[test]
    fn test_bare_mainline() {
        let g = game("1. e4 e5 2. Nf3 (2. Nc3) Nc6 { dev } 3. Bb5 $1 1-0");
        assert_eq!(
            export(&g, &ExportOptions::bare()),
            "1. e4 e5 2. Nf3 Nc6 3. Bb5 1-0"
        );
    }

    #[test]
    fn test_full_movetext_with_variations_and_comments() {
        let g = game("{ start } 1. e4 e5 2. Nf3 (2. Nc3 { closed } 2... Nf6) Nc6 { dev } 3. Bb5 $1 *");
        let options = ExportOptions {
            headers: false,
            columns: None,
            ..ExportOptions::default()
        };
        assert_eq!(
            export(&g, &options),
            "{ start } 1. e4 e5 2. Nf3 (2. Nc3 { closed } 2... Nf6) 2... Nc6 { dev } 3. Bb5 $1 *"
        );
    }

    #[test]
    fn test_black_variation_starts_with_ellipsis() {
        let g = game("1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *");
        let options = ExportOptions {
            headers: false,
            columns: None,
            ..ExportOptions::default()
        };
        assert_eq!(
            export(&g, &options),
            "1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *"
        );
    }

    #[test]
    fn test_headers_and_result_fallback() {
        let g = game("[Event \"Say \\\"hi\\\"\"]\n[White \"A\"]\n\n1. d4 d5 0-1");
        assert_eq!(
            g.to_pgn(),
            "[Event \"Say \\\"hi\\\"\"]\n[White \"A\"]\n\n1. d4 d5 0-1"
        );

        let no_result = game("1. d4");
        assert_eq!(export(&no_result, &ExportOptions::bare()), "1. d4 *");
    }

    #[test]
    fn test_result_header_wins_over_movetext() {
        let g = game("[Result \"1/2-1/2\"]\n\n1. d4 d5 *");
        assert_eq!(export(&g, &ExportOptions::bare()), "1. d4 d5 1/2-1/2");
    }

    #[test]
    fn test_setup_tags_for_custom_start() {
        let g = game("[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 7\"]\n\n7... Kd7 8. e4 *");
        let pgn = export(&g, &ExportOptions::default());
        assert!(pgn.starts_with("[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 7\"]\n\n7... Kd7 8. e4 *"));
    }

    #[test]
    fn test_wrapping_respects_columns() {
        let g = game("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7 6. Re1 b5 7. Bb3 d6 *");
        let options = ExportOptions {
            headers: false,
            columns: Some(20),
            ..ExportOptions::default()
        };
        let text = export(&g, &options);
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|line| line.chars().count() <= 20));
        assert!(!text.ends_with('\n'));
        assert_eq!(
            text.split_whitespace().collect::<Vec<_>>().join(" "),
            "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7 6. Re1 b5 7. Bb3 d6 *"
        );
    }

    #[test]
    fn test_empty_game() {
        assert_eq!(export(&Game::default(), &ExportOptions::bare()), "*");
        assert_eq!(Game::default().to_pgn(), "*");
    }
}
