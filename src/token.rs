use crate::error::PgnError;
use std::collections::VecDeque;
use std::io::BufRead;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Tag { name: String, value: String },
    Move(String),
    /// Comment body, trimmed, otherwise verbatim.
    Comment(String),
    Nag(u8),
    VariationOpen,
    VariationClose,
    Result(String),
    /// The next game's tag section starts here.
    GameBoundary,
}

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Tags,
    Movetext,
    /// A result token closed the game.
    Ended,
}

pub struct TokenReader<R> {
    input: R,
    line: Vec<char>,
    col: usize,
    line_no: usize,
    eof: bool,
    phase: Phase,
    depth: usize,
    blank_after_tags: bool,
    pending: VecDeque<Token>,
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: Vec::new(),
            col: 0,
            line_no: 0,
            eof: false,
            phase: Phase::Start,
            depth: 0,
            blank_after_tags: false,
            pending: VecDeque::new(),
        }
    }

    /// Current variation depth; 0 is the main line.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, PgnError> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(Some(token));
        }

        loop {
            let Some(ch) = self.peek()? else {
                return self.finish();
            };

            if self.col == 0 && ch == '%' {
                self.col = self.line.len();
                continue;
            }
            if ch.is_whitespace() || ch == '\u{feff}' {
                self.col += 1;
                continue;
            }

            if ch != '[' {
                self.blank_after_tags = false;
                if self.phase == Phase::Ended {
                    return self.boundary();
                }
            }

            match ch {
                '[' if matches!(self.phase, Phase::Movetext | Phase::Ended) => {
                    return self.boundary();
                }
                // A blank line between tag sections separates two games.
                '[' if self.phase == Phase::Tags && self.blank_after_tags => {
                    return self.boundary();
                }
                '[' => {
                    self.phase = Phase::Tags;
                    return self.read_tag().map(Some);
                }
                '{' => {
                    self.col += 1;
                    self.phase = Phase::Movetext;
                    return self.read_brace_comment().map(Some);
                }
                ';' => {
                    self.col += 1;
                    self.phase = Phase::Movetext;
                    let text: String = self.line[self.col..].iter().collect();
                    self.col = self.line.len();
                    return Ok(Some(Token::Comment(text.trim().to_string())));
                }
                '}' => {
                    self.col += 1;
                    return Err(PgnError::malformed(self.line_no, "unmatched '}'"));
                }
                '(' => {
                    self.col += 1;
                    self.phase = Phase::Movetext;
                    self.depth += 1;
                    return Ok(Some(Token::VariationOpen));
                }
                ')' => {
                    self.col += 1;
                    if self.depth == 0 {
                        return Err(PgnError::malformed(self.line_no, "unmatched ')'"));
                    }
                    self.depth -= 1;
                    return Ok(Some(Token::VariationClose));
                }
                '$' => {
                    self.col += 1;
                    self.phase = Phase::Movetext;
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    if let Ok(nag) = digits.parse::<u8>() {
                        return Ok(Some(Token::Nag(nag)));
                    }
                    debug!(nag = %digits, line = self.line_no, "dropping unreadable nag");
                }
                _ => {
                    let word = self.read_word();
                    self.phase = Phase::Movetext;
                    if let Some(token) = self.classify(&word) {
                        return Ok(Some(token));
                    }
                }
            }
        }
    }

    /// Discards tokens up to the next game boundary or the end of input.
    ///
    /// Used after a fatal error so the following game can still be read.
    pub fn skip_game(&mut self) {
        self.pending.clear();
        while self.phase != Phase::Start {
            match self.next_token() {
                Ok(None) | Ok(Some(Token::GameBoundary)) => break,
                Ok(Some(_)) => {}
                Err(PgnError::Io(_)) => break,
                Err(_) => {}
            }
        }
        self.depth = 0;
    }

    fn finish(&mut self) -> Result<Option<Token>, PgnError> {
        if self.depth > 0 {
            self.depth = 0;
            return Err(PgnError::malformed(
                self.line_no,
                "unterminated variation at end of input",
            ));
        }
        Ok(None)
    }

    fn boundary(&mut self) -> Result<Option<Token>, PgnError> {
        self.phase = Phase::Start;
        self.blank_after_tags = false;
        if self.depth > 0 {
            self.depth = 0;
            return Err(PgnError::malformed(
                self.line_no,
                "unterminated variation before next game",
            ));
        }
        Ok(Some(Token::GameBoundary))
    }

    fn read_tag(&mut self) -> Result<Token, PgnError> {
        let result = self.read_tag_inner();
        if result.is_err() {
            self.col = self.line.len();
        }
        result
    }

    fn read_tag_inner(&mut self) -> Result<Token, PgnError> {
        self.col += 1;
        self.skip_inline_spaces();
        let name = self.take_while(|c| !c.is_whitespace() && c != '"' && c != ']');
        if name.is_empty() {
            return Err(PgnError::malformed(self.line_no, "tag without a name"));
        }

        self.skip_inline_spaces();
        if self.current() != Some('"') {
            return Err(PgnError::malformed(
                self.line_no,
                format!("tag '{name}' has no quoted value"),
            ));
        }
        self.col += 1;

        let mut value = String::new();
        loop {
            match self.current() {
                Some('\\') => {
                    self.col += 1;
                    match self.current() {
                        Some(c) if c != '\n' => {
                            value.push(c);
                            self.col += 1;
                        }
                        _ => value.push('\\'),
                    }
                }
                Some('"') => {
                    self.col += 1;
                    break;
                }
                Some('\n') | Some('\r') | None => {
                    return Err(PgnError::malformed(
                        self.line_no,
                        format!("unterminated value for tag '{name}'"),
                    ));
                }
                Some(c) => {
                    value.push(c);
                    self.col += 1;
                }
            }
        }

        self.skip_inline_spaces();
        if self.current() != Some(']') {
            return Err(PgnError::malformed(
                self.line_no,
                format!("tag '{name}' is missing ']'"),
            ));
        }
        self.col += 1;

        Ok(Token::Tag { name, value })
    }

    fn read_brace_comment(&mut self) -> Result<Token, PgnError> {
        let start_line = self.line_no;
        let mut text = String::new();
        loop {
            let Some(ch) = self.peek()? else {
                return Err(PgnError::malformed(start_line, "unterminated comment"));
            };
            self.col += 1;
            if ch == '}' {
                break;
            }
            text.push(ch);
        }
        Ok(Token::Comment(text.trim().to_string()))
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        if let Some(first) = self.current() {
            word.push(first);
            self.col += 1;
        }
        word.push_str(&self.take_while(|c| {
            !c.is_whitespace() && !matches!(c, '{' | '}' | '(' | ')' | '[' | ']' | ';' | '$' | '"')
        }));
        word
    }

    fn classify(&mut self, word: &str) -> Option<Token> {
        if RESULTS.contains(&word) {
            // Results inside variations carry no meaning for the game.
            if self.depth > 0 {
                return None;
            }
            self.phase = Phase::Ended;
            return Some(Token::Result(word.to_string()));
        }

        let word = if word.starts_with("0-0") {
            word.replace('0', "O")
        } else {
            word.to_string()
        };

        let after_number = word.trim_start_matches(|c: char| c.is_ascii_digit());
        if after_number.is_empty() {
            return None;
        }
        let rest = after_number.trim_start_matches('.');
        if rest.is_empty() {
            return None;
        }

        let body = rest.trim_end_matches(['!', '?']);
        let nag = suffix_nag(&rest[body.len()..]);

        if body.is_empty() {
            return nag.map(Token::Nag);
        }
        if let Some(nag) = nag {
            self.pending.push_back(Token::Nag(nag));
        }
        Some(Token::Move(body.to_string()))
    }

    fn current(&self) -> Option<char> {
        self.line.get(self.col).copied()
    }

    fn peek(&mut self) -> Result<Option<char>, PgnError> {
        while self.col >= self.line.len() {
            if self.eof || !self.fill_line()? {
                return Ok(None);
            }
        }
        Ok(Some(self.line[self.col]))
    }

    fn fill_line(&mut self) -> Result<bool, PgnError> {
        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.line = String::from_utf8_lossy(&buf).chars().collect();
        self.col = 0;
        self.line_no += 1;
        if self.phase == Phase::Tags && self.line.iter().all(|c| c.is_whitespace()) {
            self.blank_after_tags = true;
        }
        Ok(true)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.col;
        while let Some(c) = self.current() {
            if !pred(c) {
                break;
            }
            self.col += 1;
        }
        self.line[start..self.col].iter().collect()
    }

    fn skip_inline_spaces(&mut self) {
        while matches!(self.current(), Some(' ') | Some('\t')) {
            self.col += 1;
        }
    }
}

impl<R: BufRead> Iterator for TokenReader<R> {
    type Item = Result<Token, PgnError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

fn suffix_nag(suffix: &str) -> Option<u8> {
    match suffix {
        "!" => Some(1),
        "?" => Some(2),
        "!!" => Some(3),
        "??" => Some(4),
        "!?" => Some(5),
        "?!" => Some(6),
        _ => None,
    }
}
