//! schemawalk-core: catalog walk-through for SQL review
//!
//! This library splits SQL scripts into positioned statements and replays
//! them against an in-memory model of a database schema, reporting the first
//! statement that cannot apply and the line it sits on.

pub mod catalog;
pub mod dialect;
pub mod error;
pub mod tokenizer;
pub mod walkthrough;

pub use catalog::{
    DatabaseSnapshot, DatabaseState, Finder, QualifiedName, TableState, WalkThroughConfig,
};
pub use dialect::SqlDialect;
pub use error::{Diagnostic, LineSpan, Severity, WalkThroughError, WalkThroughErrorKind};
pub use tokenizer::{split_sql, split_stream, SqlStatement, StatementSplitter};
pub use walkthrough::{lower_statement, walk_through_sql, StatementNode, WalkThroughOutcome};
