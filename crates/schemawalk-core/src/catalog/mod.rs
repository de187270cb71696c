//! Catalog state model: database, schemas, tables, columns and indexes

mod finder;
mod snapshot;
mod state;

pub use finder::Finder;
pub use snapshot::{
    ColumnSnapshot, DatabaseSnapshot, ExtensionSnapshot, IndexSnapshot, SchemaSnapshot,
    SnapshotError, TableSnapshot, ViewSnapshot,
};
pub use state::{
    ColumnState, DatabaseState, ExtensionState, IndexState, SchemaState, TableState, ViewState,
    WalkThroughConfig,
};

use serde::{Deserialize, Serialize};

/// Qualified name (database.schema.name, schema.name or just name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::new(name)
        }
    }

    pub fn with_database(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::new(name)
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "{}.", database)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.name)
    }
}
