use crate::error::PgnError;
use crate::headers::Headers;
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use std::io::{BufRead, BufReader, Read};
use std::mem;
use std::ops::ControlFlow;

struct TagCollector;

impl Visitor for TagCollector {
    type Tags = Headers;
    type Movetext = ();
    type Output = Headers;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(Headers::new())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        tags.insert(String::from_utf8_lossy(name), value.decode_utf8_lossy());
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Break(tags)
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, _: &mut Self::Movetext, _: SanPlus) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, _: Self::Movetext) -> Self::Output {
        Headers::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Start,
    Tags { blank: bool },
    Movetext,
}

/// Yields the tag section of every game in a stream.
///
/// Tag lines are collected per game and handed to `pgn-reader`; movetext
/// lines are only scanned for comment braces. A tag line starts a new game
/// after movetext, or after a blank line that follows tags. Blocks without a
/// single tag pair are not reported.
pub struct HeaderScanner<R> {
    input: R,
    block: Vec<u8>,
    state: Block,
    in_comment: bool,
    done: bool,
}

impl<R: BufRead> HeaderScanner<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            block: Vec::new(),
            state: Block::Start,
            in_comment: false,
            done: false,
        }
    }

    fn feed_line(&mut self, line: &[u8]) -> Option<Result<Headers, PgnError>> {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim_start_matches('\u{feff}').trim();

        if self.in_comment {
            self.in_comment = brace_open_after(trimmed, true);
            return None;
        }
        if trimmed.is_empty() {
            if let Block::Tags { blank } = &mut self.state {
                *blank = true;
            }
            return None;
        }
        if trimmed.starts_with('%') {
            return None;
        }

        if trimmed.starts_with('[') {
            let finished = match self.state {
                Block::Movetext | Block::Tags { blank: true } => self.finish_block(),
                _ => None,
            };
            self.block.extend_from_slice(line);
            if !line.ends_with(b"\n") {
                self.block.push(b'\n');
            }
            self.state = Block::Tags { blank: false };
            return finished;
        }

        self.state = Block::Movetext;
        self.in_comment = brace_open_after(trimmed, false);
        None
    }

    fn finish_block(&mut self) -> Option<Result<Headers, PgnError>> {
        self.state = Block::Start;
        self.in_comment = false;
        if self.block.is_empty() {
            return None;
        }

        let block = mem::take(&mut self.block);
        match Reader::new(block.as_slice()).read_game(&mut TagCollector) {
            Ok(Some(headers)) if !headers.is_empty() => Some(Ok(headers)),
            Ok(_) => None,
            Err(err) => Some(Err(err.into())),
        }
    }
}

/// Whether a `{` comment is still open at the end of `line`.
fn brace_open_after(line: &str, mut open: bool) -> bool {
    for ch in line.chars() {
        match ch {
            '}' if open => open = false,
            '{' if !open => open = true,
            ';' if !open => break,
            _ => {}
        }
    }
    open
}

impl<R: BufRead> Iterator for HeaderScanner<R> {
    type Item = Result<Headers, PgnError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut line = Vec::new();
            match self.input.read_until(b'\n', &mut line) {
                Ok(0) => {
                    self.done = true;
                    if let Some(headers) = self.finish_block() {
                        return Some(headers);
                    }
                }
                Ok(_) => {
                    if let Some(headers) = self.feed_line(&line) {
                        return Some(headers);
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
        None
    }
}

pub fn scan_headers<R: Read>(input: R) -> HeaderScanner<BufReader<R>> {
    HeaderScanner::new(BufReader::new(input))
}
