//! Dialect-aware statement splitting with line tracking
//!
//! The splitter does not understand SQL grammar. It only knows enough about
//! comments, quoting and terminators to cut a script into statements and to
//! report where each one starts and ends.

mod create_table;
mod split;

pub use create_table::{set_line_for_create_table, DefinitionLine};
pub use split::{remove_quoted_text_and_comment, split_sql, split_stream, StatementSplitter};

use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};
use std::ops::Range;

use crate::error::{Diagnostic, LineSpan, WalkThroughErrorKind};

/// A line/column location (both 1-indexed, columns counted in characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// One statement cut from a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStatement {
    /// Source text, including leading whitespace and the terminator
    pub text: String,
    /// Where `text` starts
    pub start: Position,
    /// Just after the last non-blank character (exclusive column)
    pub end: Position,
    /// Byte range of `text` in the source
    pub range: Range<usize>,
    /// Only comments, whitespace or a bare terminator
    pub empty: bool,
}

impl SqlStatement {
    pub fn start_line(&self) -> usize {
        self.start.line
    }

    pub fn end_line(&self) -> usize {
        self.end.line
    }

    pub fn span(&self) -> LineSpan {
        LineSpan::new(self.start.line, self.end.line)
    }
}

/// Errors that abort splitting
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: usize },

    #[error("line {line}: unterminated quoted string")]
    UnterminatedString { line: usize },

    #[error("line {line}: unterminated quoted identifier")]
    UnterminatedIdentifier { line: usize },

    #[error("line {line}: dollar-quoted string is missing its closing tag {tag}")]
    UnterminatedDollarQuote { line: usize, tag: String },

    #[error("line {line}: BEGIN ATOMIC ... END is not supported, use a dollar-quoted body instead")]
    BeginAtomic { line: usize },

    #[error("failed to read SQL input: {0}")]
    Io(#[from] io::Error),

    #[error("execute query {statement:?} failed: {source}")]
    Callback {
        statement: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SplitError {
    pub fn line(&self) -> Option<usize> {
        match self {
            SplitError::UnterminatedComment { line }
            | SplitError::UnterminatedString { line }
            | SplitError::UnterminatedIdentifier { line }
            | SplitError::UnterminatedDollarQuote { line, .. }
            | SplitError::BeginAtomic { line } => Some(*line),
            SplitError::Io(_) | SplitError::Callback { .. } => None,
        }
    }

    /// Walk-through kind reported for this failure
    pub fn kind(&self) -> WalkThroughErrorKind {
        match self {
            SplitError::Io(_) | SplitError::Callback { .. } => WalkThroughErrorKind::Internal,
            _ => WalkThroughErrorKind::ParseError,
        }
    }
}

impl From<&SplitError> for Diagnostic {
    fn from(err: &SplitError) -> Self {
        Diagnostic::error(err.kind(), err.to_string()).with_line(err.line())
    }
}

/// Character cursor over a text or an incrementally read source.
///
/// `peek` reads more input on demand; `discard_consumed` drops everything
/// before the cursor so streamed input stays bounded.
pub(crate) struct Tokenizer<'a> {
    buffer: Vec<char>,
    /// Absolute byte offset of each buffered character
    offsets: Vec<usize>,
    cursor: usize,
    position: Position,
    last_content: Position,
    /// Bytes read from the source so far
    consumed: usize,
    reader: Option<Box<dyn BufRead + 'a>>,
    read_error: Option<io::Error>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &str) -> Self {
        let mut tokenizer = Self::empty(None);
        tokenizer.push_str(text);
        tokenizer
    }

    pub fn from_reader(reader: impl BufRead + 'a) -> Self {
        Self::empty(Some(Box::new(reader)))
    }

    fn empty(reader: Option<Box<dyn BufRead + 'a>>) -> Self {
        Self {
            buffer: Vec::new(),
            offsets: Vec::new(),
            cursor: 0,
            position: Position::default(),
            last_content: Position::default(),
            consumed: 0,
            reader,
            read_error: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.reader.is_some()
    }

    fn push_str(&mut self, text: &str) {
        for (offset, c) in text.char_indices() {
            self.buffer.push(c);
            self.offsets.push(self.consumed + offset);
        }
        self.consumed += text.len();
    }

    /// Read one more line from the source
    fn fill(&mut self) -> bool {
        let Some(reader) = self.reader.as_mut() else {
            return false;
        };
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                self.reader = None;
                false
            }
            Ok(_) => {
                self.push_str(&line);
                true
            }
            Err(err) => {
                self.read_error = Some(err);
                self.reader = None;
                false
            }
        }
    }

    pub fn peek(&mut self, ahead: usize) -> Option<char> {
        while self.cursor + ahead >= self.buffer.len() {
            if !self.fill() {
                break;
            }
        }
        self.buffer.get(self.cursor + ahead).copied()
    }

    /// Character before the cursor, if still buffered
    pub fn previous(&self) -> Option<char> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.buffer.get(i).copied())
    }

    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            let Some(c) = self.peek(0) else {
                return;
            };
            self.cursor += 1;
            if c == '\n' {
                self.position.line += 1;
                self.position.column = 1;
            } else {
                self.position.column += 1;
                if !c.is_whitespace() {
                    self.last_content = self.position;
                }
            }
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Position just after the last non-blank character consumed
    pub fn last_content(&self) -> Position {
        self.last_content
    }

    pub fn mark(&self) -> usize {
        self.cursor
    }

    pub fn text_from(&self, mark: usize) -> String {
        self.buffer[mark..self.cursor].iter().collect()
    }

    pub fn byte_offset(&self, index: usize) -> usize {
        self.offsets.get(index).copied().unwrap_or(self.consumed)
    }

    pub fn discard_consumed(&mut self) {
        self.buffer.drain(..self.cursor);
        self.offsets.drain(..self.cursor);
        self.cursor = 0;
    }

    pub fn has_read_error(&self) -> bool {
        self.read_error.is_some()
    }

    pub fn take_read_error(&mut self) -> Option<io::Error> {
        self.read_error.take()
    }

    pub fn matches(&mut self, pattern: &[char]) -> bool {
        pattern
            .iter()
            .enumerate()
            .all(|(i, expected)| self.peek(i) == Some(*expected))
    }

    pub fn matches_ignore_case(&mut self, pattern: &[char]) -> bool {
        pattern.iter().enumerate().all(|(i, expected)| {
            self.peek(i)
                .is_some_and(|c| c.to_lowercase().eq(expected.to_lowercase()))
        })
    }

    /// Case-insensitive keyword match followed by a non-word character
    pub fn matches_keyword(&mut self, keyword: &str, ahead: usize) -> bool {
        let len = keyword.chars().count();
        keyword
            .chars()
            .enumerate()
            .all(|(i, expected)| {
                self.peek(ahead + i)
                    .is_some_and(|c| c.eq_ignore_ascii_case(&expected))
            })
            && !self.peek(ahead + len).is_some_and(is_word_char)
    }

    pub fn skip_blank(&mut self) {
        while self.peek(0).is_some_and(char::is_whitespace) {
            self.advance(1);
        }
    }

    /// Number of whitespace characters up to end of input, if nothing else follows
    pub fn blank_until_eof(&mut self) -> Option<usize> {
        let mut ahead = 0;
        loop {
            match self.peek(ahead) {
                None => return Some(ahead),
                Some(c) if c.is_whitespace() => ahead += 1,
                Some(_) => return None,
            }
        }
    }

    /// Scan a quoted string starting at the opening quote; backslash escapes the next character
    pub fn scan_string(&mut self, quote: char) -> Result<(), SplitError> {
        let line = self.position.line;
        self.advance(1);
        loop {
            match self.peek(0) {
                None => return Err(SplitError::UnterminatedString { line }),
                Some('\\') => self.advance(2),
                Some(c) if c == quote => {
                    self.advance(1);
                    return Ok(());
                }
                Some(_) => self.advance(1),
            }
        }
    }

    /// Scan a quoted identifier starting at the opening quote
    pub fn scan_identifier(&mut self, quote: char) -> Result<(), SplitError> {
        let line = self.position.line;
        self.advance(1);
        loop {
            match self.peek(0) {
                None => return Err(SplitError::UnterminatedIdentifier { line }),
                Some(c) if c == quote => {
                    self.advance(1);
                    return Ok(());
                }
                Some(_) => self.advance(1),
            }
        }
    }

    pub fn scan_block_comment(&mut self) -> Result<(), SplitError> {
        let line = self.position.line;
        self.advance(2);
        if self.scan_to(&['*', '/']) {
            Ok(())
        } else {
            Err(SplitError::UnterminatedComment { line })
        }
    }

    /// Skip to the end of the line, leaving the newline unconsumed
    pub fn scan_line_comment(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.advance(1);
        }
    }

    /// Scan `$tag$ ... $tag$` starting at the first `$`.
    ///
    /// Returns `false` without moving when the `$` does not open a tag,
    /// e.g. a positional parameter like `$1`.
    pub fn scan_dollar_quote(&mut self) -> Result<bool, SplitError> {
        let mut len = 1;
        loop {
            match self.peek(len) {
                Some('$') => break,
                Some(c) if c == '_' || c.is_alphabetic() || (len > 1 && c.is_ascii_digit()) => {
                    len += 1
                }
                _ => return Ok(false),
            }
        }
        let tag: Vec<char> = self.buffer[self.cursor..=self.cursor + len].to_vec();
        let line = self.position.line;
        self.advance(tag.len());
        if self.scan_to(&tag) {
            Ok(true)
        } else {
            Err(SplitError::UnterminatedDollarQuote {
                line,
                tag: tag.into_iter().collect(),
            })
        }
    }

    /// Advance past the next occurrence of `pattern` (KMP).
    ///
    /// Returns `false` with the cursor at end of input when there is none.
    pub fn scan_to(&mut self, pattern: &[char]) -> bool {
        if pattern.is_empty() {
            return true;
        }
        let next = prefix_table(pattern);
        let mut matched = 0;
        while let Some(c) = self.peek(0) {
            if c == pattern[matched] {
                matched += 1;
                self.advance(1);
                if matched == pattern.len() {
                    return true;
                }
            } else if matched > 0 {
                matched = next[matched - 1];
            } else {
                self.advance(1);
            }
        }
        false
    }
}

/// KMP failure function: longest proper prefix that is also a suffix of `pattern[..=i]`
fn prefix_table(pattern: &[char]) -> Vec<usize> {
    let mut next = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = next[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        next[i] = k;
    }
    next
}

pub(crate) fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}
