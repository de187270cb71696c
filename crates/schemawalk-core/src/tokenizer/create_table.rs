//! Source lines for the definitions of a CREATE TABLE body

use super::{SplitError, Tokenizer};
use crate::dialect::{SplitMode, SqlDialect};

/// A column or constraint whose source line can be recovered from text
pub trait DefinitionLine {
    /// Whether a lower-cased definition belongs to this item
    fn matches_definition(&self, definition: &str) -> bool;

    fn set_line(&mut self, line: usize);
}

/// Assign source lines to parsed columns and constraints.
///
/// Re-scans the parenthesized body of `text`, cutting it at top-level
/// commas, and matches each piece in order against the next column, then the
/// next constraint. The line recorded is the last non-blank line of the piece.
/// `first_line` is the line `text` starts on.
pub fn set_line_for_create_table<C, K>(
    text: &str,
    first_line: usize,
    dialect: SqlDialect,
    columns: &mut [C],
    constraints: &mut [K],
) -> Result<(), SplitError>
where
    C: DefinitionLine,
    K: DefinitionLine,
{
    let mode = dialect.split_mode();
    let mut tokenizer = Tokenizer::new(text);
    if !tokenizer.scan_to(&['(']) {
        return Ok(());
    }

    let mut matcher = Matcher {
        columns,
        constraints,
        next_column: 0,
        next_constraint: 0,
    };
    let mut depth = 1;
    skip_blank_and_comments(&mut tokenizer, mode)?;
    let mut mark = tokenizer.mark();

    while let Some(c) = tokenizer.peek(0) {
        match (c, tokenizer.peek(1)) {
            ('/', Some('*')) => tokenizer.scan_block_comment()?,
            ('-', Some('-')) => tokenizer.scan_line_comment(),
            ('#', _) if mode == SplitMode::MySql => tokenizer.scan_line_comment(),
            ('\'', _) => tokenizer.scan_string('\'')?,
            ('"', _) if mode == SplitMode::MySql => tokenizer.scan_string('"')?,
            ('"', _) => tokenizer.scan_identifier('"')?,
            ('`', _) => tokenizer.scan_identifier('`')?,
            ('$', _) if mode == SplitMode::PostgreSql => {
                if !tokenizer.scan_dollar_quote()? {
                    tokenizer.advance(1);
                }
            }
            ('(', _) => {
                depth += 1;
                tokenizer.advance(1);
            }
            (')', _) => {
                depth -= 1;
                if depth == 0 {
                    let line = first_line + tokenizer.last_content().line - 1;
                    matcher.assign(&tokenizer.text_from(mark), line);
                    return Ok(());
                }
                tokenizer.advance(1);
            }
            (',', _) if depth == 1 => {
                let line = first_line + tokenizer.last_content().line - 1;
                matcher.assign(&tokenizer.text_from(mark), line);
                tokenizer.advance(1);
                skip_blank_and_comments(&mut tokenizer, mode)?;
                mark = tokenizer.mark();
            }
            _ => tokenizer.advance(1),
        }
    }
    Ok(())
}

fn skip_blank_and_comments(tokenizer: &mut Tokenizer<'_>, mode: SplitMode) -> Result<(), SplitError> {
    loop {
        tokenizer.skip_blank();
        match (tokenizer.peek(0), tokenizer.peek(1)) {
            (Some('/'), Some('*')) => tokenizer.scan_block_comment()?,
            (Some('-'), Some('-')) => tokenizer.scan_line_comment(),
            (Some('#'), _) if mode == SplitMode::MySql => tokenizer.scan_line_comment(),
            _ => return Ok(()),
        }
    }
}

struct Matcher<'s, C, K> {
    columns: &'s mut [C],
    constraints: &'s mut [K],
    next_column: usize,
    next_constraint: usize,
}

impl<C: DefinitionLine, K: DefinitionLine> Matcher<'_, C, K> {
    fn assign(&mut self, definition: &str, line: usize) {
        let definition = definition.trim().to_lowercase();
        if let Some(column) = self.columns.get_mut(self.next_column) {
            if column.matches_definition(&definition) {
                column.set_line(line);
                self.next_column += 1;
                return;
            }
        }
        if let Some(constraint) = self.constraints.get_mut(self.next_constraint) {
            if constraint.matches_definition(&definition) {
                constraint.set_line(line);
                self.next_constraint += 1;
            }
        }
    }
}
