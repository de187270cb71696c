//! In-memory catalog evolved by the walk-through

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::dialect::SqlDialect;

/// Walk-through settings for one review session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkThroughConfig {
    pub dialect: SqlDialect,
    /// Treat the starting snapshot as complete
    pub check_integrity: bool,
    /// Maximum number of keys a single index may have
    pub max_index_keys: Option<usize>,
}

impl Default for WalkThroughConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            check_integrity: true,
            max_index_keys: None,
        }
    }
}

impl WalkThroughConfig {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn with_check_integrity(mut self, check_integrity: bool) -> Self {
        self.check_integrity = check_integrity;
        self
    }

    pub fn with_max_index_keys(mut self, limit: usize) -> Self {
        self.max_index_keys = Some(limit);
        self
    }
}

/// Root of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Empty when the snapshot could not be fetched
    pub name: String,
    pub character_set: Option<String>,
    pub collation: Option<String>,
    pub dialect: SqlDialect,
    pub deleted: bool,
    /// Integrity flag given to schemas created during the walk-through
    pub check_integrity: bool,
    pub max_index_keys: Option<usize>,
    pub schemas: IndexMap<String, SchemaState>,
}

impl DatabaseState {
    /// Create an empty database with no known name
    pub fn empty(config: &WalkThroughConfig) -> Self {
        Self {
            name: String::new(),
            character_set: None,
            collation: None,
            dialect: config.dialect,
            deleted: false,
            check_integrity: config.check_integrity,
            max_index_keys: config.max_index_keys,
            schemas: IndexMap::new(),
        }
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaState> {
        self.schemas.get(name)
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<&mut SchemaState> {
        self.schemas.get_mut(name)
    }

    /// Resolve an optional schema qualifier to a schema name
    pub fn schema_name<'a>(&self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(self.dialect.default_schema())
    }

    pub(crate) fn new_schema(&self, name: &str) -> SchemaState {
        SchemaState::new(name, self.check_integrity)
    }
}

/// A namespace of tables, views and extensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaState {
    pub name: String,
    pub check_integrity: bool,
    pub tables: IndexMap<String, TableState>,
    pub views: IndexMap<String, ViewState>,
    pub extensions: IndexMap<String, ExtensionState>,
    /// Relation names claimed in this schema (schema-scoped dialects only)
    pub identifiers: IndexSet<String>,
}

impl SchemaState {
    pub fn new(name: impl Into<String>, check_integrity: bool) -> Self {
        Self {
            name: name.into(),
            check_integrity,
            tables: IndexMap::new(),
            views: IndexMap::new(),
            extensions: IndexMap::new(),
            identifiers: IndexSet::new(),
        }
    }

    /// Table and index names of the schema, used to seed `identifiers`
    pub(crate) fn relation_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for table in self.tables.values() {
            names.push(table.name.clone());
            names.extend(table.indexes.keys().cloned());
        }
        names.extend(self.views.keys().cloned());
        names
    }

    /// Find the table owning an index
    pub fn index_owner(&self, index: &str) -> Option<&TableState> {
        self.tables
            .values()
            .find(|table| table.indexes.contains_key(index))
    }
}

/// A table and its columns and indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableState {
    pub name: String,
    /// False for placeholders and tables whose columns are unknown
    pub complete: bool,
    pub engine: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub columns: IndexMap<String, ColumnState>,
    pub indexes: IndexMap<String, IndexState>,
}

impl TableState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            complete: true,
            engine: None,
            collation: None,
            comment: None,
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
        }
    }

    /// Table fabricated for an unknown reference
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            complete: false,
            ..Self::new(name)
        }
    }

    /// Deep copy under another name
    pub fn copy_as(&self, name: &str) -> Self {
        let mut table = self.clone();
        table.name = name.to_string();
        table
    }

    /// Columns ordered by position
    pub fn ordered_columns(&self) -> Vec<&ColumnState> {
        let mut columns: Vec<&ColumnState> = self.columns.values().collect();
        columns.sort_by_key(|c| c.position);
        columns
    }

    pub fn primary_key(&self) -> Option<&IndexState> {
        self.indexes.values().find(|index| index.primary)
    }

    /// Insert a column at a 1-based position, shifting later columns
    pub fn insert_column_at(&mut self, mut column: ColumnState, position: usize) {
        let position = position.clamp(1, self.columns.len() + 1);
        for existing in self.columns.values_mut() {
            if existing.position >= position {
                existing.position += 1;
            }
        }
        column.position = position;
        self.columns.insert(column.name.clone(), column);
    }

    /// Append a column after every existing column
    pub fn push_column(&mut self, column: ColumnState) {
        let position = self.columns.len() + 1;
        self.insert_column_at(column, position);
    }

    /// Remove a column, closing the gap in positions
    pub fn remove_column(&mut self, name: &str) -> Option<ColumnState> {
        let removed = self.columns.shift_remove(name)?;
        for column in self.columns.values_mut() {
            if column.position > removed.position {
                column.position -= 1;
            }
        }
        Some(removed)
    }

    /// Rename a column in place, keeping position and index keys in sync
    pub fn rename_column(&mut self, old_name: &str, new_name: &str) {
        if let Some(index) = self.columns.get_index_of(old_name) {
            if let Some((_, mut column)) = self.columns.shift_remove_index(index) {
                column.name = new_name.to_string();
                self.columns.insert(new_name.to_string(), column);
                self.columns.move_index(self.columns.len() - 1, index);
            }
        }
        for index in self.indexes.values_mut() {
            for key in index.expressions.iter_mut() {
                if key == old_name {
                    *key = new_name.to_string();
                }
            }
        }
    }

    /// Rename an index in place
    pub fn rename_index(&mut self, old_name: &str, new_name: &str) {
        if let Some(position) = self.indexes.get_index_of(old_name) {
            if let Some((_, mut index)) = self.indexes.shift_remove_index(position) {
                index.name = new_name.to_string();
                self.indexes.insert(new_name.to_string(), index);
                self.indexes.move_index(self.indexes.len() - 1, position);
            }
        }
    }

    /// Whether a column is a key of the primary key
    pub fn in_primary_key(&self, column: &str) -> bool {
        self.primary_key()
            .is_some_and(|pk| pk.expressions.iter().any(|key| key == column))
    }
}

/// A table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnState {
    pub name: String,
    /// 1-based ordinal position
    pub position: usize,
    pub default: Option<String>,
    pub nullable: bool,
    pub column_type: String,
    pub character_set: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
}

impl ColumnState {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: 0,
            default: None,
            nullable: true,
            column_type: column_type.into(),
            character_set: None,
            collation: None,
            comment: None,
        }
    }

    /// Column fabricated for an unknown reference
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

/// An index, unique constraint or primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub name: String,
    /// Column names or expression text, in key order
    pub expressions: Vec<String>,
    pub index_type: String,
    pub unique: bool,
    pub primary: bool,
    pub visible: bool,
    /// Created through a constraint rather than CREATE INDEX
    pub is_constraint: bool,
    pub comment: Option<String>,
}

impl IndexState {
    pub fn new(name: impl Into<String>, expressions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            expressions,
            index_type: String::new(),
            unique: false,
            primary: false,
            visible: true,
            is_constraint: false,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub name: String,
    pub definition: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionState {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}
