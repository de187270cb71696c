//! Catalog walk-through
//!
//! Each statement is a transition on the [`DatabaseState`]. Statements are
//! applied in source order; the first failure stops the walk and everything
//! applied before it stays in place.

mod index;
mod lower;
mod node;
mod pipeline;
mod table;

pub use lower::lower_statement;
pub use node::{
    AlterColumnOperation, AlterDatabase, AlterIndex, AlterIndexOperation, AlterTable,
    AlterTableOperation, ColumnDefinition, ColumnOption, ColumnPlacement, ConstraintKind,
    CreateDatabase, CreateExtension, CreateIndex, CreateSchema, CreateTable, CreateTrigger,
    CreateView, DropDatabase, DropExtension, DropIndex, DropSchema, DropTable, DropView, IndexKey,
    IndexKind, Insert, RenameTable, StatementNode, TableConstraint, TableOption,
};
pub use pipeline::{walk_through_sql, WalkThroughOutcome};

pub(crate) use table::TableScope;

use tracing::{debug, warn};

use crate::catalog::{DatabaseState, ExtensionState, SchemaState, ViewState};
use crate::dialect::{IdentifierScope, SqlDialect};
use crate::error::{LineSpan, WalkThroughError, WalkThroughErrorKind};

pub type Result<T> = std::result::Result<T, WalkThroughError>;

/// Settings every transition needs
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkContext {
    pub dialect: SqlDialect,
    pub max_index_keys: Option<usize>,
}

impl WalkContext {
    pub fn scope(&self) -> IdentifierScope {
        self.dialect.identifier_scope()
    }
}

impl DatabaseState {
    /// Apply one statement.
    ///
    /// Errors without a narrower line are reported at the statement's last line.
    pub fn apply(&mut self, node: &StatementNode, span: LineSpan) -> Result<()> {
        debug!(kind = node.kind(), line = span.end_line, "walk through statement");
        self.change_state(node)
            .map_err(|err| err.or_line(Some(span.end_line)))
    }

    /// Apply statements in order, stopping at the first failure
    pub fn walk_through<'n, I>(&mut self, statements: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'n StatementNode, LineSpan)>,
    {
        for (node, span) in statements {
            self.apply(node, span)?;
        }
        Ok(())
    }

    pub(crate) fn context(&self) -> WalkContext {
        WalkContext {
            dialect: self.dialect,
            max_index_keys: self.max_index_keys,
        }
    }

    fn change_state(&mut self, node: &StatementNode) -> Result<()> {
        if !self.dialect.supports_walk_through() {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::Unsupported,
                format!("Walk-through is not supported for dialect {}", self.dialect),
            ));
        }
        if self.deleted {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::DatabaseIsDeleted,
                format!("Database `{}` is deleted", self.name),
            ));
        }

        match node {
            StatementNode::CreateTable(create) => self.create_table(create),
            StatementNode::AlterTable(alter) => self.alter_table(alter),
            StatementNode::DropTable(drop) => self.drop_table(drop),
            StatementNode::RenameTable(rename) => self.rename_tables(rename),
            StatementNode::CreateIndex(create) => self.create_index(create),
            StatementNode::DropIndex(drop) => self.drop_index(drop),
            StatementNode::AlterIndex(alter) => self.alter_index(alter),
            StatementNode::CreateDatabase(create) => Err(WalkThroughError::access_other_database(
                &create.name,
                &self.name,
            )),
            StatementNode::AlterDatabase(alter) => self.alter_database(alter),
            StatementNode::DropDatabase(drop) => self.drop_database(drop),
            StatementNode::CreateSchema(create) => self.create_schema(create),
            StatementNode::DropSchema(drop) => self.drop_schema(drop),
            StatementNode::CreateView(create) => self.create_view(create),
            StatementNode::DropView(drop) => self.drop_view(drop),
            StatementNode::CreateExtension(create) => self.create_extension(create),
            StatementNode::DropExtension(drop) => self.drop_extension(drop),
            StatementNode::CreateTrigger(create) => self.check_trigger_table(create),
            StatementNode::Insert(insert) => self.check_insert(insert),
            StatementNode::Update(table) | StatementNode::Delete(table) => {
                self.check_database(table.database.as_deref())
            }
            StatementNode::Select | StatementNode::Other => Ok(()),
        }
    }

    /// Reject names qualified with another database
    pub(crate) fn check_database(&self, database: Option<&str>) -> Result<()> {
        match database {
            Some(database) if !self.name.is_empty() && database != self.name => Err(
                WalkThroughError::access_other_database(database, &self.name),
            ),
            _ => Ok(()),
        }
    }

    pub(crate) fn is_current_database(&self, database: Option<&str>) -> bool {
        database.map_or(true, |db| self.name.is_empty() || db == self.name)
    }

    /// Resolve a schema for writing.
    ///
    /// The default schema is created on first use; any other missing schema
    /// is created only when integrity checks are off.
    pub(crate) fn writable_schema(&mut self, schema: Option<&str>) -> Result<&mut SchemaState> {
        let name = self.schema_name(schema).to_string();
        if !self.schemas.contains_key(&name) {
            if name != self.dialect.default_schema() && self.check_integrity {
                return Err(WalkThroughError::schema_not_exists(&name));
            }
            if name != self.dialect.default_schema() {
                warn!(schema = %name, "schema missing from snapshot, creating placeholder");
            }
            let created = self.new_schema(&name);
            self.schemas.insert(name.clone(), created);
        }
        self.schemas
            .get_mut(&name)
            .ok_or_else(|| WalkThroughError::schema_not_exists(&name))
    }

    /// Resolve a schema for a statement that may silently skip a missing one
    pub(crate) fn existing_schema(
        &mut self,
        schema: Option<&str>,
        if_exists: bool,
    ) -> Result<Option<&mut SchemaState>> {
        let name = self.schema_name(schema).to_string();
        if self.schemas.contains_key(&name) {
            return Ok(self.schemas.get_mut(&name));
        }
        if if_exists || !self.check_integrity || name == self.dialect.default_schema() {
            Ok(None)
        } else {
            Err(WalkThroughError::schema_not_exists(&name))
        }
    }

    fn alter_database(&mut self, alter: &AlterDatabase) -> Result<()> {
        if let Some(name) = &alter.name {
            if !self.is_current_database(Some(name)) {
                return Err(WalkThroughError::access_other_database(name, &self.name));
            }
        }
        if let Some(character_set) = &alter.character_set {
            self.character_set = Some(character_set.clone());
        }
        if let Some(collation) = &alter.collation {
            self.collation = Some(collation.clone());
        }
        Ok(())
    }

    fn drop_database(&mut self, drop: &DropDatabase) -> Result<()> {
        if !self.is_current_database(Some(&drop.name)) {
            return Err(WalkThroughError::access_other_database(
                &drop.name, &self.name,
            ));
        }
        debug!(database = %drop.name, "database dropped, later statements will fail");
        self.deleted = true;
        Ok(())
    }

    fn create_schema(&mut self, create: &CreateSchema) -> Result<()> {
        if self.dialect.identifier_scope() == IdentifierScope::Table {
            // a MySQL schema is a database
            return Err(WalkThroughError::access_other_database(
                &create.name,
                &self.name,
            ));
        }
        if self.schemas.contains_key(&create.name) {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::SchemaExists,
                format!("Schema `{}` already exists", create.name),
            ));
        }
        let schema = self.new_schema(&create.name);
        self.schemas.insert(create.name.clone(), schema);
        Ok(())
    }

    fn drop_schema(&mut self, drop: &DropSchema) -> Result<()> {
        for name in &drop.names {
            if self.schemas.shift_remove(name).is_none()
                && !drop.if_exists
                && self.check_integrity
            {
                return Err(WalkThroughError::schema_not_exists(name));
            }
        }
        Ok(())
    }

    fn create_view(&mut self, create: &CreateView) -> Result<()> {
        self.check_database(create.name.database.as_deref())?;
        let scope = self.dialect.identifier_scope();
        let schema = self.writable_schema(create.name.schema())?;
        let name = &create.name.name;

        if schema.views.contains_key(name) {
            if !create.or_replace {
                return Err(relation_conflict(scope, name, &schema.name));
            }
        } else if schema.tables.contains_key(name)
            || (scope == IdentifierScope::Schema && schema.identifiers.contains(name))
        {
            return Err(relation_conflict(scope, name, &schema.name));
        }

        if scope == IdentifierScope::Schema {
            schema.identifiers.insert(name.clone());
        }
        schema.views.insert(
            name.clone(),
            ViewState {
                name: name.clone(),
                definition: create.definition.clone(),
                comment: None,
            },
        );
        Ok(())
    }

    fn drop_view(&mut self, drop: &DropView) -> Result<()> {
        for name in &drop.names {
            self.check_database(name.database.as_deref())?;
            let Some(schema) = self.existing_schema(name.schema(), drop.if_exists)? else {
                continue;
            };
            if schema.views.shift_remove(&name.name).is_some() {
                schema.identifiers.shift_remove(&name.name);
            } else if !drop.if_exists && schema.check_integrity {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::ViewNotExists,
                    format!("View `{}` does not exist", name.name),
                ));
            }
        }
        Ok(())
    }

    fn create_extension(&mut self, create: &CreateExtension) -> Result<()> {
        if self
            .schemas
            .values()
            .any(|schema| schema.extensions.contains_key(&create.name))
        {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::ExtensionExists,
                format!("Extension `{}` already exists", create.name),
            ));
        }
        let schema = self.writable_schema(create.schema.as_deref())?;
        schema.extensions.insert(
            create.name.clone(),
            ExtensionState {
                name: create.name.clone(),
                version: create.version.clone(),
                description: None,
            },
        );
        Ok(())
    }

    fn drop_extension(&mut self, drop: &DropExtension) -> Result<()> {
        for name in &drop.names {
            let removed = self
                .schemas
                .values_mut()
                .any(|schema| schema.extensions.shift_remove(name).is_some());
            if !removed && !drop.if_exists && self.check_integrity {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::ExtensionNotExists,
                    format!("Extension `{}` does not exist", name),
                ));
            }
        }
        Ok(())
    }

    /// INSERT column lists must name existing columns
    fn check_insert(&mut self, insert: &Insert) -> Result<()> {
        self.check_database(insert.table.database.as_deref())?;
        let schema_name = self.schema_name(insert.table.schema()).to_string();
        let Some(schema) = self.schemas.get(&schema_name) else {
            if self.check_integrity && schema_name != self.dialect.default_schema() {
                return Err(WalkThroughError::schema_not_exists(&schema_name));
            }
            return self.missing_table(&insert.table.name);
        };
        let Some(table) = schema.tables.get(&insert.table.name) else {
            if schema.check_integrity {
                return Err(WalkThroughError::table_not_exists(&insert.table.name));
            }
            return Ok(());
        };
        if !schema.check_integrity || !table.complete {
            return Ok(());
        }
        match insert
            .columns
            .iter()
            .find(|column| !table.columns.contains_key(*column))
        {
            Some(column) => Err(WalkThroughError::column_not_exists(column, &table.name)),
            None => Ok(()),
        }
    }

    /// A trigger only needs its table to exist
    fn check_trigger_table(&self, create: &CreateTrigger) -> Result<()> {
        self.check_database(create.table.database.as_deref())?;
        let schema_name = self.schema_name(create.table.schema()).to_string();
        match self.schemas.get(&schema_name) {
            Some(schema) if schema.tables.contains_key(&create.table.name) => Ok(()),
            Some(schema) if !schema.check_integrity => Ok(()),
            Some(_) => Err(WalkThroughError::table_not_exists(&create.table.name)),
            None if self.check_integrity && schema_name != self.dialect.default_schema() => {
                Err(WalkThroughError::schema_not_exists(&schema_name))
            }
            None => self.missing_table(&create.table.name),
        }
    }

    fn missing_table(&self, table: &str) -> Result<()> {
        if self.check_integrity {
            Err(WalkThroughError::table_not_exists(table))
        } else {
            Ok(())
        }
    }
}

/// Existence conflict for a relation name, per namespace rules
pub(crate) fn relation_conflict(scope: IdentifierScope, name: &str, schema: &str) -> WalkThroughError {
    match scope {
        IdentifierScope::Table => WalkThroughError::table_exists(name),
        IdentifierScope::Schema => WalkThroughError::relation_exists(name, schema),
    }
}
