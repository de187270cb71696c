//! SQL dialect support

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use std::str::FromStr;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    PostgreSQL,
    MySQL,
    TiDB,
    Oracle,
}

/// How the statement splitter treats quoting and terminators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Backticks, `#` comments, backslash escapes and `DELIMITER`
    MySql,
    /// Dollar-quoted strings, rejects `BEGIN ATOMIC`
    PostgreSql,
    /// Plain `;` terminated statements
    Standard,
}

/// Where index and constraint names must be unique
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierScope {
    /// Names are unique within one table (MySQL-like)
    Table,
    /// Names are unique across every relation of a schema (PostgreSQL-like)
    Schema,
}

impl SqlDialect {
    /// Get the sqlparser dialect for parsing
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::PostgreSQL => Box::new(PostgreSqlDialect {}),
            SqlDialect::MySQL | SqlDialect::TiDB => Box::new(MySqlDialect {}),
            SqlDialect::Oracle => Box::new(GenericDialect {}),
        }
    }

    /// Get default schema name for this dialect
    pub fn default_schema(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "public",
            SqlDialect::MySQL | SqlDialect::TiDB | SqlDialect::Oracle => "",
        }
    }

    pub fn split_mode(&self) -> SplitMode {
        match self {
            SqlDialect::PostgreSQL => SplitMode::PostgreSql,
            SqlDialect::MySQL | SqlDialect::TiDB => SplitMode::MySql,
            SqlDialect::Oracle => SplitMode::Standard,
        }
    }

    pub fn identifier_scope(&self) -> IdentifierScope {
        match self {
            SqlDialect::MySQL | SqlDialect::TiDB => IdentifierScope::Table,
            SqlDialect::PostgreSQL | SqlDialect::Oracle => IdentifierScope::Schema,
        }
    }

    /// The fixed name every primary key gets, if the dialect has one
    pub fn primary_key_name(&self) -> Option<&'static str> {
        match self {
            SqlDialect::MySQL | SqlDialect::TiDB => Some("PRIMARY"),
            SqlDialect::PostgreSQL | SqlDialect::Oracle => None,
        }
    }

    /// Index method recorded when a statement does not name one
    pub fn default_index_method(&self) -> &'static str {
        match self {
            SqlDialect::MySQL | SqlDialect::TiDB => "BTREE",
            SqlDialect::PostgreSQL => "btree",
            SqlDialect::Oracle => "NORMAL",
        }
    }

    /// Whether unquoted identifiers are folded to lower case
    pub fn folds_to_lowercase(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL)
    }

    /// Whether `ALTER TABLE ... DROP COLUMN` may remove the last column
    pub fn allows_empty_tables(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL)
    }

    /// Whether MySQL column and CREATE TABLE rules apply
    pub fn checks_mysql_columns(&self) -> bool {
        matches!(self, SqlDialect::MySQL | SqlDialect::TiDB)
    }

    pub fn supports_walk_through(&self) -> bool {
        !matches!(self, SqlDialect::Oracle)
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSQL),
            "mysql" | "mysql8" | "mariadb" => Ok(SqlDialect::MySQL),
            "tidb" => Ok(SqlDialect::TiDB),
            "oracle" | "standard" => Ok(SqlDialect::Oracle),
            _ => Err(format!(
                "Unknown dialect: '{}'. Supported dialects: postgresql, mysql, tidb, oracle.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::TiDB => write!(f, "tidb"),
            SqlDialect::Oracle => write!(f, "oracle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_aliases() {
        assert_eq!("pg".parse::<SqlDialect>().unwrap(), SqlDialect::PostgreSQL);
        assert_eq!("MySQL".parse::<SqlDialect>().unwrap(), SqlDialect::MySQL);
        assert_eq!("tidb".parse::<SqlDialect>().unwrap(), SqlDialect::TiDB);
        assert!("sqlite".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_namespace_rules() {
        assert_eq!(SqlDialect::MySQL.identifier_scope(), IdentifierScope::Table);
        assert_eq!(
            SqlDialect::PostgreSQL.identifier_scope(),
            IdentifierScope::Schema
        );
        assert_eq!(SqlDialect::MySQL.primary_key_name(), Some("PRIMARY"));
        assert_eq!(SqlDialect::PostgreSQL.primary_key_name(), None);
        assert_eq!(SqlDialect::PostgreSQL.default_schema(), "public");
    }
}
