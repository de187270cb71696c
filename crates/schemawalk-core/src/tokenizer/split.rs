//! Statement splitting for the supported dialect modes

use std::io::{BufRead, BufReader, Read};

use super::{is_word_char, Position, SplitError, SqlStatement, Tokenizer};
use crate::dialect::{SplitMode, SqlDialect};

/// What one scanning step consumed
enum Scanned {
    Blank,
    Comment,
    Content,
    Terminator,
    /// A MySQL `DELIMITER` line
    Delimiter,
}

/// Lazy iterator over the statements of a script.
///
/// Splitting stops at the first error; the iterator is fused afterwards.
pub struct StatementSplitter<'a> {
    tokenizer: Tokenizer<'a>,
    mode: SplitMode,
    delimiter: Vec<char>,
    done: bool,
}

impl StatementSplitter<'static> {
    pub fn new(sql: &str, dialect: SqlDialect) -> Self {
        Self::with_tokenizer(Tokenizer::new(sql), dialect)
    }
}

impl<'a> StatementSplitter<'a> {
    /// Split a reader, keeping only the statement being scanned in memory
    pub fn from_reader(reader: impl BufRead + 'a, dialect: SqlDialect) -> Self {
        Self::with_tokenizer(Tokenizer::from_reader(reader), dialect)
    }

    fn with_tokenizer(tokenizer: Tokenizer<'a>, dialect: SqlDialect) -> Self {
        Self {
            tokenizer,
            mode: dialect.split_mode(),
            delimiter: vec![';'],
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The active statement terminator
    pub fn delimiter(&self) -> String {
        self.delimiter.iter().collect()
    }

    fn next_statement(&mut self) -> Result<Option<SqlStatement>, SplitError> {
        if self.tokenizer.is_streaming() {
            self.tokenizer.discard_consumed();
        }
        let mark = self.tokenizer.mark();
        let start = self.tokenizer.position();
        let mut empty = true;

        loop {
            let Some(c) = self.tokenizer.peek(0) else {
                if let Some(err) = self.tokenizer.take_read_error() {
                    return Err(err.into());
                }
                self.done = true;
                if self.tokenizer.text_from(mark).trim().is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.emit(mark, start, empty)));
            };

            let scanned = match self.mode {
                SplitMode::MySql => self.scan_mysql(c, empty)?,
                SplitMode::PostgreSql => self.scan_postgres(c)?,
                SplitMode::Standard => self.scan_standard(c)?,
            };
            match scanned {
                Scanned::Blank | Scanned::Comment => {}
                Scanned::Content => empty = false,
                Scanned::Terminator => return Ok(Some(self.emit(mark, start, empty))),
                Scanned::Delimiter => return Ok(Some(self.emit(mark, start, false))),
            }
        }
    }

    fn emit(&mut self, mark: usize, start: Position, empty: bool) -> SqlStatement {
        // Trailing whitespace belongs to the last statement so the texts
        // concatenate back to the input. A stream reads at most one line past
        // the statement for this; a read error is reported on the next call.
        if let Some(blank) = self.tokenizer.blank_until_eof() {
            self.tokenizer.advance(blank);
            self.done = !self.tokenizer.has_read_error();
        }
        SqlStatement {
            text: self.tokenizer.text_from(mark),
            start,
            end: self.tokenizer.last_content(),
            range: self.tokenizer.byte_offset(mark)..self.tokenizer.byte_offset(self.tokenizer.mark()),
            empty,
        }
    }

    /// Comments shared by every mode
    fn scan_comment(&mut self, c: char) -> Result<Option<Scanned>, SplitError> {
        match (c, self.tokenizer.peek(1)) {
            ('/', Some('*')) => {
                self.tokenizer.scan_block_comment()?;
                Ok(Some(Scanned::Comment))
            }
            ('-', Some('-')) => {
                self.tokenizer.scan_line_comment();
                Ok(Some(Scanned::Comment))
            }
            _ => Ok(None),
        }
    }

    fn scan_plain(&mut self, c: char) -> Scanned {
        self.tokenizer.advance(1);
        if c.is_whitespace() {
            Scanned::Blank
        } else {
            Scanned::Content
        }
    }

    fn scan_mysql(&mut self, c: char, empty: bool) -> Result<Scanned, SplitError> {
        if self.tokenizer.matches_ignore_case(&self.delimiter) {
            self.tokenizer.advance(self.delimiter.len());
            return Ok(Scanned::Terminator);
        }
        if empty && self.tokenizer.matches_keyword("delimiter", 0) {
            self.change_delimiter();
            return Ok(Scanned::Delimiter);
        }
        if let Some(scanned) = self.scan_comment(c)? {
            return Ok(scanned);
        }
        match c {
            '#' => {
                self.tokenizer.scan_line_comment();
                Ok(Scanned::Comment)
            }
            '\'' | '"' => {
                self.tokenizer.scan_string(c)?;
                Ok(Scanned::Content)
            }
            '`' => {
                self.tokenizer.scan_identifier('`')?;
                Ok(Scanned::Content)
            }
            _ => Ok(self.scan_plain(c)),
        }
    }

    /// Consume `DELIMITER <token>` and switch the terminator
    fn change_delimiter(&mut self) {
        self.tokenizer.advance("delimiter".len());
        while self
            .tokenizer
            .peek(0)
            .is_some_and(|c| c.is_whitespace() && c != '\n')
        {
            self.tokenizer.advance(1);
        }
        let mut delimiter = Vec::new();
        while let Some(c) = self.tokenizer.peek(0).filter(|c| !c.is_whitespace()) {
            delimiter.push(c);
            self.tokenizer.advance(1);
        }
        if !delimiter.is_empty() {
            tracing::trace!(delimiter = %delimiter.iter().collect::<String>(), "statement delimiter changed");
            self.delimiter = delimiter;
        }
    }

    fn scan_postgres(&mut self, c: char) -> Result<Scanned, SplitError> {
        if c == ';' {
            self.tokenizer.advance(1);
            return Ok(Scanned::Terminator);
        }
        if let Some(scanned) = self.scan_comment(c)? {
            return Ok(scanned);
        }
        match c {
            '\'' => {
                self.tokenizer.scan_string('\'')?;
                Ok(Scanned::Content)
            }
            '"' => {
                self.tokenizer.scan_identifier('"')?;
                Ok(Scanned::Content)
            }
            '$' => {
                if !self.tokenizer.scan_dollar_quote()? {
                    self.tokenizer.advance(1);
                }
                Ok(Scanned::Content)
            }
            'b' | 'B' if self.begins_atomic() => Err(SplitError::BeginAtomic {
                line: self.tokenizer.position().line,
            }),
            _ => Ok(self.scan_plain(c)),
        }
    }

    /// `BEGIN` followed by blanks and `ATOMIC`, as whole words
    fn begins_atomic(&mut self) -> bool {
        if self.tokenizer.previous().is_some_and(is_word_char)
            || !self.tokenizer.matches_keyword("begin", 0)
        {
            return false;
        }
        let mut ahead = "begin".len();
        if !self.tokenizer.peek(ahead).is_some_and(char::is_whitespace) {
            return false;
        }
        while self.tokenizer.peek(ahead).is_some_and(char::is_whitespace) {
            ahead += 1;
        }
        self.tokenizer.matches_keyword("atomic", ahead)
    }

    fn scan_standard(&mut self, c: char) -> Result<Scanned, SplitError> {
        if c == ';' {
            self.tokenizer.advance(1);
            return Ok(Scanned::Terminator);
        }
        if let Some(scanned) = self.scan_comment(c)? {
            return Ok(scanned);
        }
        match c {
            '\'' => {
                self.tokenizer.scan_string('\'')?;
                Ok(Scanned::Content)
            }
            '"' => {
                self.tokenizer.scan_identifier('"')?;
                Ok(Scanned::Content)
            }
            _ => Ok(self.scan_plain(c)),
        }
    }
}

impl Iterator for StatementSplitter<'_> {
    type Item = Result<SqlStatement, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_statement() {
            Ok(Some(statement)) => Some(Ok(statement)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for StatementSplitter<'_> {}

/// Split a whole script into statements
pub fn split_sql(sql: &str, dialect: SqlDialect) -> Result<Vec<SqlStatement>, SplitError> {
    StatementSplitter::new(sql, dialect).collect()
}

/// Split a reader statement by statement, handing each one to `callback`.
///
/// Input is read only as far as the statement being scanned; a callback
/// error stops reading and is returned wrapped with the statement text.
pub fn split_stream<R, F, E>(reader: R, dialect: SqlDialect, mut callback: F) -> Result<(), SplitError>
where
    R: Read,
    F: FnMut(&SqlStatement) -> Result<(), E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    for statement in StatementSplitter::from_reader(BufReader::new(reader), dialect) {
        let statement = statement?;
        callback(&statement).map_err(|source| SplitError::Callback {
            statement: statement.text.clone(),
            source: source.into(),
        })?;
    }
    Ok(())
}

/// Replace comments, string literals and quoted identifiers with a single space
pub fn remove_quoted_text_and_comment(sql: &str) -> Result<String, SplitError> {
    let mut tokenizer = Tokenizer::new(sql);
    let mut out = String::with_capacity(sql.len());
    while let Some(c) = tokenizer.peek(0) {
        match (c, tokenizer.peek(1)) {
            ('/', Some('*')) => {
                tokenizer.scan_block_comment()?;
                out.push(' ');
            }
            ('-', Some('-')) => {
                tokenizer.scan_line_comment();
                out.push(' ');
            }
            ('\'', _) => {
                tokenizer.scan_string('\'')?;
                out.push(' ');
            }
            ('"', _) => {
                tokenizer.scan_identifier('"')?;
                out.push(' ');
            }
            _ => {
                out.push(c);
                tokenizer.advance(1);
            }
        }
    }
    Ok(out)
}
