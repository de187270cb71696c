//! Statement shapes understood by the walk-through

use serde::{Deserialize, Serialize};

use crate::catalog::QualifiedName;
use crate::tokenizer::DefinitionLine;

/// One parsed statement, reduced to what changes the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementNode {
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    DropTable(DropTable),
    RenameTable(RenameTable),
    CreateIndex(CreateIndex),
    DropIndex(DropIndex),
    AlterIndex(AlterIndex),
    CreateDatabase(CreateDatabase),
    AlterDatabase(AlterDatabase),
    DropDatabase(DropDatabase),
    CreateSchema(CreateSchema),
    DropSchema(DropSchema),
    CreateView(CreateView),
    DropView(DropView),
    CreateExtension(CreateExtension),
    DropExtension(DropExtension),
    CreateTrigger(CreateTrigger),
    Insert(Insert),
    Update(QualifiedName),
    Delete(QualifiedName),
    Select,
    /// Anything that does not change the catalog
    Other,
}

impl StatementNode {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            StatementNode::CreateTable(_) => "CREATE TABLE",
            StatementNode::AlterTable(_) => "ALTER TABLE",
            StatementNode::DropTable(_) => "DROP TABLE",
            StatementNode::RenameTable(_) => "RENAME TABLE",
            StatementNode::CreateIndex(_) => "CREATE INDEX",
            StatementNode::DropIndex(_) => "DROP INDEX",
            StatementNode::AlterIndex(_) => "ALTER INDEX",
            StatementNode::CreateDatabase(_) => "CREATE DATABASE",
            StatementNode::AlterDatabase(_) => "ALTER DATABASE",
            StatementNode::DropDatabase(_) => "DROP DATABASE",
            StatementNode::CreateSchema(_) => "CREATE SCHEMA",
            StatementNode::DropSchema(_) => "DROP SCHEMA",
            StatementNode::CreateView(_) => "CREATE VIEW",
            StatementNode::DropView(_) => "DROP VIEW",
            StatementNode::CreateExtension(_) => "CREATE EXTENSION",
            StatementNode::DropExtension(_) => "DROP EXTENSION",
            StatementNode::CreateTrigger(_) => "CREATE TRIGGER",
            StatementNode::Insert(_) => "INSERT",
            StatementNode::Update(_) => "UPDATE",
            StatementNode::Delete(_) => "DELETE",
            StatementNode::Select => "SELECT",
            StatementNode::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    pub name: QualifiedName,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<TableConstraint>,
    /// `CREATE TABLE ... LIKE source`
    pub like: Option<QualifiedName>,
    /// `CREATE TABLE ... AS SELECT`, columns unknown
    pub as_query: bool,
    pub options: Vec<TableOption>,
}

impl CreateTable {
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            if_not_exists: false,
            columns: Vec::new(),
            constraints: Vec::new(),
            like: None,
            as_query: false,
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableOption {
    Engine(String),
    Collation(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub character_set: Option<String>,
    pub collation: Option<String>,
    pub options: Vec<ColumnOption>,
    /// Source line, when known
    pub line: Option<usize>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            character_set: None,
            collation: None,
            options: Vec::new(),
            line: None,
        }
    }

    pub fn with_option(mut self, option: ColumnOption) -> Self {
        self.options.push(option);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnOption {
    Null,
    NotNull,
    Default(String),
    PrimaryKey,
    Unique,
    Comment(String),
    /// MySQL `AUTO_INCREMENT`
    AutoIncrement,
    /// MySQL `ON UPDATE <expr>`
    OnUpdate(String),
    /// CHECK and REFERENCES, accepted without effect
    Check,
    ForeignKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKey {
    Column(String),
    Expression(String),
}

impl IndexKey {
    pub fn column(name: impl Into<String>) -> Self {
        IndexKey::Column(name.into())
    }

    pub fn text(&self) -> &str {
        match self {
            IndexKey::Column(name) | IndexKey::Expression(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConstraint {
    pub name: Option<String>,
    pub kind: ConstraintKind,
    pub line: Option<usize>,
}

impl TableConstraint {
    pub fn new(name: Option<String>, kind: ConstraintKind) -> Self {
        Self {
            name,
            kind,
            line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey {
        keys: Vec<IndexKey>,
        index_type: Option<String>,
    },
    /// `PRIMARY KEY USING INDEX existing`
    PrimaryKeyUsingIndex { index: String },
    Unique {
        index_name: Option<String>,
        keys: Vec<IndexKey>,
        index_type: Option<String>,
    },
    /// `UNIQUE USING INDEX existing`
    UniqueUsingIndex { index: String },
    Index {
        keys: Vec<IndexKey>,
        index_type: Option<String>,
    },
    Fulltext { keys: Vec<IndexKey> },
    Spatial { keys: Vec<IndexKey> },
    ForeignKey {
        columns: Vec<String>,
        references: QualifiedName,
    },
    Check,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterTable {
    pub name: QualifiedName,
    pub if_exists: bool,
    pub operations: Vec<AlterTableOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnPlacement {
    First,
    After(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlterTableOperation {
    SetOptions(Vec<TableOption>),
    AddColumn {
        column: ColumnDefinition,
        if_not_exists: bool,
        placement: Option<ColumnPlacement>,
    },
    AddConstraint(TableConstraint),
    DropColumn {
        name: String,
        if_exists: bool,
    },
    DropPrimaryKey,
    DropIndex {
        name: String,
    },
    DropConstraint {
        name: String,
        if_exists: bool,
    },
    DropForeignKey {
        name: String,
    },
    /// MODIFY keeps the name, CHANGE may rename
    ChangeColumn {
        old_name: String,
        column: ColumnDefinition,
        placement: Option<ColumnPlacement>,
    },
    RenameColumn {
        old_name: String,
        new_name: String,
    },
    AlterColumn {
        name: String,
        operation: AlterColumnOperation,
    },
    RenameIndex {
        old_name: String,
        new_name: String,
    },
    RenameConstraint {
        old_name: String,
        new_name: String,
    },
    SetIndexVisibility {
        name: String,
        visible: bool,
    },
    RenameTo(QualifiedName),
    SetSchema(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterColumnOperation {
    SetDefault(String),
    DropDefault,
    SetNotNull,
    DropNotNull,
    SetDataType {
        data_type: String,
        collation: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub names: Vec<QualifiedName>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameTable {
    pub renames: Vec<(QualifiedName, QualifiedName)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexKind {
    #[default]
    Normal,
    Unique,
    Fulltext,
    Spatial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndex {
    pub name: Option<String>,
    pub table: QualifiedName,
    pub if_not_exists: bool,
    pub kind: IndexKind,
    /// Access method, e.g. `btree`
    pub method: Option<String>,
    pub keys: Vec<IndexKey>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropIndex {
    /// Index names, schema-qualified where the dialect allows
    pub names: Vec<QualifiedName>,
    /// Owning table, required in table-scoped dialects
    pub table: Option<QualifiedName>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterIndex {
    pub name: QualifiedName,
    pub table: Option<QualifiedName>,
    pub operation: AlterIndexOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterIndexOperation {
    RenameTo(String),
    SetVisibility(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDatabase {
    pub name: String,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterDatabase {
    /// `None` for the current database
    pub name: Option<String>,
    pub character_set: Option<String>,
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropDatabase {
    pub name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSchema {
    pub name: String,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropSchema {
    pub names: Vec<String>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateView {
    pub name: QualifiedName,
    pub or_replace: bool,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropView {
    pub names: Vec<QualifiedName>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExtension {
    pub name: String,
    pub schema: Option<String>,
    pub version: Option<String>,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropExtension {
    pub names: Vec<String>,
    pub if_exists: bool,
}

/// Only the target table matters to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTrigger {
    pub name: String,
    pub table: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: QualifiedName,
    pub columns: Vec<String>,
}

/// Whether `definition` starts with `name`, optionally quoted, as a whole word
fn starts_with_name(definition: &str, name: &str) -> bool {
    let name = name.to_lowercase();
    let unquoted = definition.trim_start_matches(['`', '"', '[']);
    unquoted.strip_prefix(name.as_str()).is_some_and(|rest| {
        !rest
            .chars()
            .next()
            .is_some_and(|c| c == '_' || c.is_alphanumeric())
    })
}

impl DefinitionLine for ColumnDefinition {
    fn matches_definition(&self, definition: &str) -> bool {
        starts_with_name(definition, &self.name)
    }

    fn set_line(&mut self, line: usize) {
        self.line = Some(line);
    }
}

impl DefinitionLine for TableConstraint {
    fn matches_definition(&self, definition: &str) -> bool {
        if let Some(name) = &self.name {
            if definition.contains(&name.to_lowercase()) {
                return true;
            }
        }
        let body = definition
            .strip_prefix("constraint")
            .map(|rest| rest.trim_start())
            .unwrap_or(definition);
        match &self.kind {
            ConstraintKind::PrimaryKey { .. } | ConstraintKind::PrimaryKeyUsingIndex { .. } => {
                definition.contains("primary key")
            }
            ConstraintKind::Unique { .. } | ConstraintKind::UniqueUsingIndex { .. } => {
                definition.contains("unique")
            }
            ConstraintKind::ForeignKey { .. } => definition.contains("foreign key"),
            ConstraintKind::Check => definition.contains("check"),
            ConstraintKind::Fulltext { .. } => body.starts_with("fulltext"),
            ConstraintKind::Spatial { .. } => body.starts_with("spatial"),
            ConstraintKind::Index { .. } => body.starts_with("index") || body.starts_with("key"),
        }
    }

    fn set_line(&mut self, line: usize) {
        self.line = Some(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_matches_whole_name_only() {
        let column = ColumnDefinition::new("id", "int");
        assert!(column.matches_definition("id int not null"));
        assert!(column.matches_definition("`id` int"));
        assert!(!column.matches_definition("identity int"));
    }

    #[test]
    fn test_constraint_matches_keyword() {
        let pk = TableConstraint::new(
            None,
            ConstraintKind::PrimaryKey {
                keys: vec![IndexKey::column("id")],
                index_type: None,
            },
        );
        assert!(pk.matches_definition("primary key (id)"));
        assert!(!pk.matches_definition("unique (id)"));

        let index = TableConstraint::new(
            None,
            ConstraintKind::Index {
                keys: vec![IndexKey::column("id")],
                index_type: None,
            },
        );
        assert!(index.matches_definition("key idx_id (id)"));
    }
}
