//! Read-only lookups over a catalog

use super::state::{ColumnState, DatabaseState, IndexState, TableState};
use crate::dialect::IdentifierScope;

/// Dialect-aware query facade used by lint rules.
///
/// Borrowing the state keeps lookups free of side effects; to compare two
/// points of a walk-through, clone the `DatabaseState` and build two finders.
#[derive(Debug, Clone, Copy)]
pub struct Finder<'a> {
    state: &'a DatabaseState,
}

impl<'a> Finder<'a> {
    pub fn new(state: &'a DatabaseState) -> Self {
        Self { state }
    }

    pub fn find_table(&self, schema: Option<&str>, table: &str) -> Option<&'a TableState> {
        self.state
            .schema(self.state.schema_name(schema))?
            .tables
            .get(table)
    }

    pub fn find_column(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Option<&'a ColumnState> {
        self.find_table(schema, table)?.columns.get(column)
    }

    /// Find an index, returning it with its owning table.
    ///
    /// In schema-scoped dialects the table is ignored and every table of the
    /// schema is searched.
    pub fn find_index(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
        index: &str,
    ) -> Option<(&'a TableState, &'a IndexState)> {
        let schema = self.state.schema(self.state.schema_name(schema))?;
        match self.state.dialect.identifier_scope() {
            IdentifierScope::Schema => {
                let owner = schema.index_owner(index)?;
                Some((owner, owner.indexes.get(index)?))
            }
            IdentifierScope::Table => {
                let owner = schema.tables.get(table?)?;
                Some((owner, owner.indexes.get(index)?))
            }
        }
    }

    pub fn find_primary_key(&self, schema: Option<&str>, table: &str) -> Option<&'a IndexState> {
        self.find_table(schema, table)?.primary_key()
    }

    /// Count the columns of a table whose type matches a predicate
    pub fn count_columns_with_type(
        &self,
        schema: Option<&str>,
        table: &str,
        predicate: impl Fn(&str) -> bool,
    ) -> usize {
        self.find_table(schema, table).map_or(0, |table| {
            table
                .columns
                .values()
                .filter(|column| predicate(&column.column_type))
                .count()
        })
    }

    pub fn has_no_table(&self) -> bool {
        self.state
            .schemas
            .values()
            .all(|schema| schema.tables.is_empty())
    }
}
