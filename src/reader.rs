use crate::error::PgnError;
use crate::token::{Token, TokenReader};
use crate::tree::Game;
use crate::visitor::{GameBuilder, ParseOptions, Visitor};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use zstd::stream::read::Decoder as ZstdDecoder;

pub type PgnInput = Box<dyn Read + Send>;

/// Reads games one at a time from a PGN stream.
pub struct PgnReader<R> {
    tokens: TokenReader<R>,
    builder: GameBuilder,
}

impl<R: BufRead> PgnReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, ParseOptions::default())
    }

    pub fn with_options(input: R, options: ParseOptions) -> Self {
        Self {
            tokens: TokenReader::new(input),
            builder: GameBuilder::new(options.policy),
        }
    }

    /// Builds the next game. `Ok(None)` at end of stream.
    ///
    /// On error the rest of the offending game is skipped, so the next call
    /// starts at the following game.
    pub fn read_game(&mut self) -> Result<Option<Game>, PgnError> {
        let Self { tokens, builder } = self;
        drive(tokens, builder)
    }

    /// Feeds the next game to a custom visitor.
    pub fn read_game_with<V: Visitor>(
        &mut self,
        visitor: &mut V,
    ) -> Result<Option<V::Output>, PgnError> {
        drive(&mut self.tokens, visitor)
    }

    pub fn games(&mut self) -> Games<'_, R> {
        Games {
            reader: self,
            done: false,
        }
    }
}

fn drive<R: BufRead, V: Visitor>(
    tokens: &mut TokenReader<R>,
    visitor: &mut V,
) -> Result<Option<V::Output>, PgnError> {
    let mut started = false;
    loop {
        let token = match tokens.next_token() {
            Ok(Some(Token::GameBoundary)) | Ok(None) => break,
            Ok(Some(token)) => token,
            Err(err) => return Err(abandon(tokens, err)),
        };
        if !started {
            visitor.begin_game();
            started = true;
        }
        if let Err(err) = feed(visitor, token) {
            return Err(abandon(tokens, err));
        }
    }

    if !started {
        return Ok(None);
    }
    visitor
        .end_game()
        .map(Some)
        .map_err(|err| err.at_line(tokens.line_no()))
}

fn feed<V: Visitor>(visitor: &mut V, token: Token) -> Result<(), PgnError> {
    match token {
        Token::Tag { name, value } => visitor.tag(&name, &value),
        Token::Move(text) => visitor.san(&text),
        Token::Comment(text) => visitor.comment(&text),
        Token::Nag(nag) => visitor.nag(nag),
        Token::VariationOpen => visitor.begin_variation(),
        Token::VariationClose => visitor.end_variation(),
        Token::Result(result) => visitor.outcome(&result),
        Token::GameBoundary => Ok(()),
    }
}

fn abandon<R: BufRead>(tokens: &mut TokenReader<R>, err: PgnError) -> PgnError {
    let err = err.at_line(tokens.line_no());
    if err.is_malformed() {
        warn!(error = %err, "skipping malformed game");
    }
    tokens.skip_game();
    err
}

/// Iterator over the games of a [`PgnReader`].
///
/// A failed game yields its error and iteration continues with the next
/// game; an I/O error ends the iteration.
pub struct Games<'a, R> {
    reader: &'a mut PgnReader<R>,
    done: bool,
}

impl<R: BufRead> Iterator for Games<'_, R> {
    type Item = Result<Game, PgnError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_game() {
            Ok(Some(game)) => Some(Ok(game)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                if matches!(err, PgnError::Io(_)) {
                    self.done = true;
                }
                Some(Err(err))
            }
        }
    }
}

/// Parses the first game of `pgn`.
pub fn parse_game(pgn: &str, options: ParseOptions) -> Result<Option<Game>, PgnError> {
    PgnReader::with_options(pgn.as_bytes(), options).read_game()
}

/// Parses the first game of a stream.
pub fn read_game<R: Read>(input: R, options: ParseOptions) -> Result<Option<Game>, PgnError> {
    PgnReader::with_options(BufReader::new(input), options).read_game()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionMode {
    #[default]
    Plain,
    Zstd,
}

impl CompressionMode {
    /// `Zstd` for `.zst` files, `Plain` otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

impl FromStr for CompressionMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("none") || normalized.eq_ignore_ascii_case("plain")
        {
            Ok(Self::Plain)
        } else {
            Err(format!(
                "Invalid compression value '{normalized}'. Supported values: 'zstd' or 'none'."
            ))
        }
    }
}

pub fn open_input(path: &Path, compression: CompressionMode) -> io::Result<PgnInput> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("failed to open file '{}': {e}", path.display()),
        )
    })?;

    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!(
                        "failed to initialize zstd decoder for '{}': {e}",
                        path.display()
                    ),
                )
            }),
    }
}

/// A single path, or every match when `pattern` contains `*` or `?`.
pub fn expand_paths(pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    if pattern.contains('*') || pattern.contains('?') {
        Ok(glob::glob(pattern)?.filter_map(|entry| entry.ok()).collect())
    } else {
        Ok(vec![PathBuf::from(pattern)])
    }
}
