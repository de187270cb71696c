//! Schema metadata snapshots used to seed and dump the catalog

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::state::{
    ColumnState, DatabaseState, ExtensionState, IndexState, SchemaState, TableState, ViewState,
    WalkThroughConfig,
};
use crate::dialect::IdentifierScope;

/// Errors loading a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate {kind} `{name}` in snapshot")]
    Duplicate { kind: &'static str, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSnapshot {
    pub name: String,
    pub character_set: Option<String>,
    pub collation: Option<String>,
    pub schemas: Vec<SchemaSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSnapshot {
    pub name: String,
    pub tables: Vec<TableSnapshot>,
    pub views: Vec<ViewSnapshot>,
    pub extensions: Vec<ExtensionSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSnapshot {
    pub name: String,
    pub engine: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub columns: Vec<ColumnSnapshot>,
    pub indexes: Vec<IndexSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSnapshot {
    pub name: String,
    /// 1-based; missing positions follow list order
    pub position: Option<usize>,
    pub default: Option<String>,
    pub nullable: bool,
    #[serde(rename = "type")]
    pub column_type: String,
    pub character_set: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
}

impl Default for ColumnSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: None,
            default: None,
            nullable: true,
            column_type: String::new(),
            character_set: None,
            collation: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSnapshot {
    pub name: String,
    pub expressions: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: String,
    pub unique: bool,
    pub primary: bool,
    pub visible: bool,
    /// Backs a PRIMARY KEY or UNIQUE constraint rather than a plain index
    pub is_constraint: bool,
    pub comment: Option<String>,
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            expressions: Vec::new(),
            index_type: String::new(),
            unique: false,
            primary: false,
            visible: true,
            is_constraint: false,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSnapshot {
    pub name: String,
    pub definition: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionSnapshot {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl DatabaseSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn insert_unique<V>(
    map: &mut IndexMap<String, V>,
    kind: &'static str,
    name: &str,
    value: V,
) -> Result<(), SnapshotError> {
    if map.contains_key(name) {
        return Err(SnapshotError::Duplicate {
            kind,
            name: name.to_string(),
        });
    }
    map.insert(name.to_string(), value);
    Ok(())
}

impl DatabaseState {
    /// Build the catalog from a snapshot.
    ///
    /// `None` means the existing schema could not be fetched: the database
    /// name stays unknown, so cross-database checks are skipped.
    pub fn new(
        snapshot: Option<&DatabaseSnapshot>,
        config: &WalkThroughConfig,
    ) -> Result<Self, SnapshotError> {
        let mut state = DatabaseState::empty(config);
        let Some(snapshot) = snapshot else {
            return Ok(state);
        };

        state.name = snapshot.name.clone();
        state.character_set = snapshot.character_set.clone();
        state.collation = snapshot.collation.clone();

        for schema in &snapshot.schemas {
            let schema_state = schema_from_snapshot(schema, &state)?;
            insert_unique(&mut state.schemas, "schema", &schema.name, schema_state)?;
        }
        Ok(state)
    }

    /// Convert back into a snapshot, tables sorted by name and columns by position
    pub fn to_snapshot(&self) -> DatabaseSnapshot {
        DatabaseSnapshot {
            name: self.name.clone(),
            character_set: self.character_set.clone(),
            collation: self.collation.clone(),
            schemas: self.schemas.values().map(schema_to_snapshot).collect(),
        }
    }
}

fn schema_from_snapshot(
    snapshot: &SchemaSnapshot,
    state: &DatabaseState,
) -> Result<SchemaState, SnapshotError> {
    let mut schema = state.new_schema(&snapshot.name);

    for table in &snapshot.tables {
        insert_unique(
            &mut schema.tables,
            "table",
            &table.name,
            table_from_snapshot(table)?,
        )?;
    }
    for view in &snapshot.views {
        let view_state = ViewState {
            name: view.name.clone(),
            definition: view.definition.clone(),
            comment: view.comment.clone(),
        };
        insert_unique(&mut schema.views, "view", &view.name, view_state)?;
    }
    for extension in &snapshot.extensions {
        let extension_state = ExtensionState {
            name: extension.name.clone(),
            version: extension.version.clone(),
            description: extension.description.clone(),
        };
        insert_unique(
            &mut schema.extensions,
            "extension",
            &extension.name,
            extension_state,
        )?;
    }

    if state.dialect.identifier_scope() == IdentifierScope::Schema {
        for name in schema.relation_names() {
            if !schema.identifiers.insert(name.clone()) {
                return Err(SnapshotError::Duplicate {
                    kind: "relation",
                    name,
                });
            }
        }
    }
    Ok(schema)
}

fn table_from_snapshot(snapshot: &TableSnapshot) -> Result<TableState, SnapshotError> {
    let mut table = TableState::new(&snapshot.name);
    table.engine = snapshot.engine.clone();
    table.collation = snapshot.collation.clone();
    table.comment = snapshot.comment.clone();

    let mut columns: Vec<(usize, &ColumnSnapshot)> = snapshot
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.position.unwrap_or(i + 1), c))
        .collect();
    columns.sort_by_key(|(position, _)| *position);

    for (i, (_, column)) in columns.into_iter().enumerate() {
        let column_state = ColumnState {
            name: column.name.clone(),
            position: i + 1,
            default: column.default.clone(),
            nullable: column.nullable,
            column_type: column.column_type.clone(),
            character_set: column.character_set.clone(),
            collation: column.collation.clone(),
            comment: column.comment.clone(),
        };
        insert_unique(&mut table.columns, "column", &column.name, column_state)?;
    }

    for index in &snapshot.indexes {
        let index_state = IndexState {
            name: index.name.clone(),
            expressions: index.expressions.clone(),
            index_type: index.index_type.clone(),
            unique: index.unique || index.primary,
            primary: index.primary,
            visible: index.visible,
            is_constraint: index.is_constraint || index.primary,
            comment: index.comment.clone(),
        };
        insert_unique(&mut table.indexes, "index", &index.name, index_state)?;
    }
    Ok(table)
}

fn schema_to_snapshot(schema: &SchemaState) -> SchemaSnapshot {
    let mut tables: Vec<&TableState> = schema.tables.values().collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));

    SchemaSnapshot {
        name: schema.name.clone(),
        tables: tables.into_iter().map(table_to_snapshot).collect(),
        views: schema
            .views
            .values()
            .map(|view| ViewSnapshot {
                name: view.name.clone(),
                definition: view.definition.clone(),
                comment: view.comment.clone(),
            })
            .collect(),
        extensions: schema
            .extensions
            .values()
            .map(|extension| ExtensionSnapshot {
                name: extension.name.clone(),
                version: extension.version.clone(),
                description: extension.description.clone(),
            })
            .collect(),
    }
}

fn table_to_snapshot(table: &TableState) -> TableSnapshot {
    TableSnapshot {
        name: table.name.clone(),
        engine: table.engine.clone(),
        collation: table.collation.clone(),
        comment: table.comment.clone(),
        columns: table
            .ordered_columns()
            .into_iter()
            .map(|column| ColumnSnapshot {
                name: column.name.clone(),
                position: Some(column.position),
                default: column.default.clone(),
                nullable: column.nullable,
                column_type: column.column_type.clone(),
                character_set: column.character_set.clone(),
                collation: column.collation.clone(),
                comment: column.comment.clone(),
            })
            .collect(),
        indexes: table
            .indexes
            .values()
            .map(|index| IndexSnapshot {
                name: index.name.clone(),
                expressions: index.expressions.clone(),
                index_type: index.index_type.clone(),
                unique: index.unique,
                primary: index.primary,
                visible: index.visible,
                is_constraint: index.is_constraint,
                comment: index.comment.clone(),
            })
            .collect(),
    }
}
