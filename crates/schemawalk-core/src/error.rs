//! Error and diagnostic types

use serde::{Deserialize, Serialize};
use std::fmt;

/// First and last source line of one statement (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineSpan {
    pub start_line: usize,
    pub end_line: usize,
}

impl LineSpan {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Span covering a single line
    pub fn line(line: usize) -> Self {
        Self::new(line, line)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Kinds of walk-through failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalkThroughErrorKind {
    /// W0001: dialect or statement form is not supported
    Unsupported,
    /// W0101: statement could not be parsed
    ParseError,
    /// W0103: statement shape is not accepted
    InvalidStatement,
    /// W0104: MySQL `CREATE TABLE ... AS SELECT`
    StatementCreateTableAs,
    /// W0201: statement references another database
    AccessOtherDatabase,
    /// W0202: current database was dropped earlier in the script
    DatabaseIsDeleted,
    /// W0301
    TableExists,
    /// W0302
    TableNotExists,
    /// W0303: name already claimed by another relation in the schema
    RelationExists,
    /// W0304
    ViewNotExists,
    /// W0401
    ColumnExists,
    /// W0402
    ColumnNotExists,
    /// W0403: ALTER TABLE would remove every column
    DropAllColumns,
    /// W0404: NOT NULL column declared with DEFAULT NULL
    SetNullDefaultForNotNullColumn,
    /// W0405
    InvalidColumnDefault,
    /// W0406
    OnUpdateColumnNotDatetimeOrTimestamp,
    /// W0407: more than one AUTO_INCREMENT column
    AutoIncrementExists,
    /// W0501
    PrimaryKeyExists,
    /// W0502
    IndexExists,
    /// W0503
    IndexEmptyKeys,
    /// W0504
    PrimaryKeyNotExists,
    /// W0505
    IndexNotExists,
    /// W0506: reserved index name
    IncorrectIndexName,
    /// W0507
    SpatialIndexKeyNullable,
    /// W0508
    IndexDuplicateKeys,
    /// W0509
    IndexKeyNumberExceedsLimit,
    /// W0510
    ConstraintNotExists,
    /// W0601
    SchemaNotExists,
    /// W0602
    SchemaExists,
    /// W0603
    ExtensionExists,
    /// W0604
    ExtensionNotExists,
    /// W0901: lower-layer failure
    Internal,
}

impl WalkThroughErrorKind {
    pub fn code(&self) -> u16 {
        match self {
            WalkThroughErrorKind::Unsupported => 1,
            WalkThroughErrorKind::ParseError => 101,
            WalkThroughErrorKind::InvalidStatement => 103,
            WalkThroughErrorKind::StatementCreateTableAs => 104,
            WalkThroughErrorKind::AccessOtherDatabase => 201,
            WalkThroughErrorKind::DatabaseIsDeleted => 202,
            WalkThroughErrorKind::TableExists => 301,
            WalkThroughErrorKind::TableNotExists => 302,
            WalkThroughErrorKind::RelationExists => 303,
            WalkThroughErrorKind::ViewNotExists => 304,
            WalkThroughErrorKind::ColumnExists => 401,
            WalkThroughErrorKind::ColumnNotExists => 402,
            WalkThroughErrorKind::DropAllColumns => 403,
            WalkThroughErrorKind::SetNullDefaultForNotNullColumn => 404,
            WalkThroughErrorKind::InvalidColumnDefault => 405,
            WalkThroughErrorKind::OnUpdateColumnNotDatetimeOrTimestamp => 406,
            WalkThroughErrorKind::AutoIncrementExists => 407,
            WalkThroughErrorKind::PrimaryKeyExists => 501,
            WalkThroughErrorKind::IndexExists => 502,
            WalkThroughErrorKind::IndexEmptyKeys => 503,
            WalkThroughErrorKind::PrimaryKeyNotExists => 504,
            WalkThroughErrorKind::IndexNotExists => 505,
            WalkThroughErrorKind::IncorrectIndexName => 506,
            WalkThroughErrorKind::SpatialIndexKeyNullable => 507,
            WalkThroughErrorKind::IndexDuplicateKeys => 508,
            WalkThroughErrorKind::IndexKeyNumberExceedsLimit => 509,
            WalkThroughErrorKind::ConstraintNotExists => 510,
            WalkThroughErrorKind::SchemaNotExists => 601,
            WalkThroughErrorKind::SchemaExists => 602,
            WalkThroughErrorKind::ExtensionExists => 603,
            WalkThroughErrorKind::ExtensionNotExists => 604,
            WalkThroughErrorKind::Internal => 901,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WalkThroughErrorKind::Unsupported => "unsupported",
            WalkThroughErrorKind::ParseError => "parse-error",
            WalkThroughErrorKind::InvalidStatement => "invalid-statement",
            WalkThroughErrorKind::StatementCreateTableAs => "statement-create-table-as",
            WalkThroughErrorKind::AccessOtherDatabase => "access-other-database",
            WalkThroughErrorKind::DatabaseIsDeleted => "database-is-deleted",
            WalkThroughErrorKind::TableExists => "table-exists",
            WalkThroughErrorKind::TableNotExists => "table-not-exists",
            WalkThroughErrorKind::RelationExists => "relation-exists",
            WalkThroughErrorKind::ViewNotExists => "view-not-exists",
            WalkThroughErrorKind::ColumnExists => "column-exists",
            WalkThroughErrorKind::ColumnNotExists => "column-not-exists",
            WalkThroughErrorKind::DropAllColumns => "drop-all-columns",
            WalkThroughErrorKind::SetNullDefaultForNotNullColumn => {
                "set-null-default-for-not-null-column"
            }
            WalkThroughErrorKind::InvalidColumnDefault => "invalid-column-default",
            WalkThroughErrorKind::OnUpdateColumnNotDatetimeOrTimestamp => {
                "on-update-column-not-datetime-or-timestamp"
            }
            WalkThroughErrorKind::AutoIncrementExists => "auto-increment-exists",
            WalkThroughErrorKind::PrimaryKeyExists => "primary-key-exists",
            WalkThroughErrorKind::IndexExists => "index-exists",
            WalkThroughErrorKind::IndexEmptyKeys => "index-empty-keys",
            WalkThroughErrorKind::PrimaryKeyNotExists => "primary-key-not-exists",
            WalkThroughErrorKind::IndexNotExists => "index-not-exists",
            WalkThroughErrorKind::IncorrectIndexName => "incorrect-index-name",
            WalkThroughErrorKind::SpatialIndexKeyNullable => "spatial-index-key-nullable",
            WalkThroughErrorKind::IndexDuplicateKeys => "index-duplicate-keys",
            WalkThroughErrorKind::IndexKeyNumberExceedsLimit => "index-key-number-exceeds-limit",
            WalkThroughErrorKind::ConstraintNotExists => "constraint-not-exists",
            WalkThroughErrorKind::SchemaNotExists => "schema-not-exists",
            WalkThroughErrorKind::SchemaExists => "schema-exists",
            WalkThroughErrorKind::ExtensionExists => "extension-exists",
            WalkThroughErrorKind::ExtensionNotExists => "extension-not-exists",
            WalkThroughErrorKind::Internal => "internal",
        }
    }

    /// Stable display code, e.g. `W0302`
    pub fn display_code(&self) -> String {
        format!("W{:04}", self.code())
    }
}

impl fmt::Display for WalkThroughErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed catalog transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct WalkThroughError {
    pub kind: WalkThroughErrorKind,
    pub message: String,
    /// Source line of the failing statement or definition
    pub line: Option<usize>,
}

impl WalkThroughError {
    pub fn new(kind: WalkThroughErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Set the line only when no narrower line is known yet
    pub fn or_line(mut self, line: Option<usize>) -> Self {
        if self.line.is_none() {
            self.line = line;
        }
        self
    }

    pub fn table_exists(table: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::TableExists,
            format!("Table `{}` already exists", table),
        )
    }

    pub fn table_not_exists(table: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::TableNotExists,
            format!("Table `{}` does not exist", table),
        )
    }

    pub fn relation_exists(name: &str, schema: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::RelationExists,
            format!("Relation `{}` already exists in schema `{}`", name, schema),
        )
    }

    pub fn column_exists(column: &str, table: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::ColumnExists,
            format!("Column `{}` already exists in table `{}`", column, table),
        )
    }

    pub fn column_not_exists(column: &str, table: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::ColumnNotExists,
            format!("Column `{}` does not exist in table `{}`", column, table),
        )
    }

    pub fn index_exists(index: &str, table: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::IndexExists,
            format!("Index `{}` already exists in table `{}`", index, table),
        )
    }

    pub fn index_not_exists(index: &str, table: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::IndexNotExists,
            format!("Index `{}` does not exist in table `{}`", index, table),
        )
    }

    pub fn schema_not_exists(schema: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::SchemaNotExists,
            format!("Schema `{}` does not exist", schema),
        )
    }

    pub fn access_other_database(database: &str, current: &str) -> Self {
        Self::new(
            WalkThroughErrorKind::AccessOtherDatabase,
            format!(
                "Database `{}` is not the current database `{}`",
                database, current
            ),
        )
    }

    fn help_text(&self) -> Option<&'static str> {
        match self.kind {
            WalkThroughErrorKind::AccessOtherDatabase => {
                Some("Statements may only change the database being reviewed")
            }
            WalkThroughErrorKind::DropAllColumns => Some("Use DROP TABLE instead"),
            WalkThroughErrorKind::StatementCreateTableAs => {
                Some("Create the table explicitly, then populate it with INSERT ... SELECT")
            }
            WalkThroughErrorKind::OnUpdateColumnNotDatetimeOrTimestamp => {
                Some("ON UPDATE is only allowed on DATETIME and TIMESTAMP columns")
            }
            WalkThroughErrorKind::SpatialIndexKeyNullable => {
                Some("Declare every SPATIAL index key as NOT NULL")
            }
            WalkThroughErrorKind::IncorrectIndexName => {
                Some("PRIMARY is reserved for the primary key")
            }
            _ => None,
        }
    }
}

impl miette::Diagnostic for WalkThroughError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.display_code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help_text().map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }
}

/// Diagnostic message reported to users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: String,
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: WalkThroughErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: kind.name().to_string(),
            code: kind.display_code(),
            severity: Severity::Error,
            message: message.into(),
            line: None,
            help: None,
        }
    }

    pub fn with_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Get the error code string (e.g., "W0302")
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl From<&WalkThroughError> for Diagnostic {
    fn from(err: &WalkThroughError) -> Self {
        let diagnostic = Diagnostic::error(err.kind, err.message.clone()).with_line(err.line);
        match err.help_text() {
            Some(help) => diagnostic.with_help(help),
            None => diagnostic,
        }
    }
}
