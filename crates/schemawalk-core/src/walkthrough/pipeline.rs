//! Split, parse, lower and apply a whole script

use serde::Serialize;
use sqlparser::parser::Parser;
use tracing::debug;

use super::lower::lower_statement;
use super::node::StatementNode;
use crate::catalog::DatabaseState;
use crate::error::{WalkThroughError, WalkThroughErrorKind};
use crate::tokenizer::{set_line_for_create_table, SplitError, SqlStatement, StatementSplitter};

/// Result of walking a script through a database state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkThroughOutcome {
    /// Statements applied before the walk stopped
    pub applied: usize,
    /// The failure that stopped the walk
    pub error: Option<WalkThroughError>,
}

impl WalkThroughOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<usize, WalkThroughError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.applied),
        }
    }
}

/// Walk every statement of `sql` through `state`, stopping at the first failure.
///
/// Statements applied before the failure stay applied.
pub fn walk_through_sql(state: &mut DatabaseState, sql: &str) -> WalkThroughOutcome {
    let mut outcome = WalkThroughOutcome {
        applied: 0,
        error: None,
    };
    let mut splitter = StatementSplitter::new(sql, state.dialect);

    while let Some(statement) = splitter.next() {
        let result = statement
            .map_err(split_error)
            .and_then(|statement| walk_statement(state, &statement, &splitter.delimiter()));
        match result {
            Ok(true) => outcome.applied += 1,
            Ok(false) => {}
            Err(err) => {
                debug!(line = ?err.line, error = %err, "walk-through stopped");
                outcome.error = Some(err);
                break;
            }
        }
    }
    outcome
}

/// Apply one split statement; `Ok(false)` when there was nothing to apply
fn walk_statement(
    state: &mut DatabaseState,
    statement: &SqlStatement,
    delimiter: &str,
) -> Result<bool, WalkThroughError> {
    if statement.empty || is_delimiter_command(&statement.text) {
        return Ok(false);
    }
    let text = strip_delimiter(&statement.text, delimiter);
    let dialect = state.dialect;
    let parsed = Parser::parse_sql(dialect.parser_dialect().as_ref(), text).map_err(|err| {
        WalkThroughError::new(WalkThroughErrorKind::ParseError, err.to_string())
            .with_line(statement.end_line())
    })?;

    let mut applied = false;
    for parsed in &parsed {
        let mut node = lower_statement(parsed, dialect)
            .map_err(|err| err.or_line(Some(statement.end_line())))?;
        if let StatementNode::CreateTable(create) = &mut node {
            set_line_for_create_table(
                text,
                statement.start_line(),
                dialect,
                &mut create.columns,
                &mut create.constraints,
            )
            .map_err(split_error)?;
        }
        state.apply(&node, statement.span())?;
        applied = true;
    }
    Ok(applied)
}

fn split_error(err: SplitError) -> WalkThroughError {
    WalkThroughError::new(err.kind(), err.to_string()).or_line(err.line())
}

/// A MySQL `DELIMITER` line, possibly after comments
fn is_delimiter_command(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("--") && !line.starts_with('#'))
        .is_some_and(|line| {
            line.get(.."delimiter".len())
                .is_some_and(|word| word.eq_ignore_ascii_case("delimiter"))
                && line["delimiter".len()..].starts_with(char::is_whitespace)
        })
}

/// Drop a custom terminator the parser would not understand
fn strip_delimiter<'t>(text: &'t str, delimiter: &str) -> &'t str {
    if delimiter == ";" {
        return text;
    }
    let trimmed = text.trim_end();
    match trimmed.len().checked_sub(delimiter.len()) {
        Some(cut)
            if trimmed.is_char_boundary(cut)
                && trimmed[cut..].eq_ignore_ascii_case(delimiter) =>
        {
            &trimmed[..cut]
        }
        _ => text,
    }
}
