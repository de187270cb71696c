//! Table and column transitions

use indexmap::map::Entry;
use indexmap::IndexSet;
use std::iter;
use tracing::{trace, warn};

use super::index::IndexSpec;
use super::node::{
    AlterColumnOperation, AlterTable, AlterTableOperation, ColumnDefinition, ColumnOption,
    ColumnPlacement, CreateTable, DropTable, IndexKey, RenameTable, TableOption,
};
use super::{relation_conflict, Result, WalkContext};
use crate::catalog::{ColumnState, DatabaseState, Finder, QualifiedName, SchemaState, TableState};
use crate::dialect::{IdentifierScope, SqlDialect};
use crate::error::{WalkThroughError, WalkThroughErrorKind};

/// Mutable view of one table plus the namespace its index names live in
pub(crate) struct TableScope<'s> {
    pub table: &'s mut TableState,
    pub identifiers: &'s mut IndexSet<String>,
    pub schema: &'s str,
    pub ctx: WalkContext,
    /// Unknown targets are fabricated or skipped instead of failing
    pub lenient: bool,
}

impl SchemaState {
    /// Borrow a table for mutation, fabricating it when integrity checks are off
    pub(crate) fn table_scope(&mut self, table: &str, ctx: WalkContext) -> Result<TableScope<'_>> {
        let lenient_schema = !self.check_integrity;
        let SchemaState {
            name,
            tables,
            identifiers,
            ..
        } = self;

        let table_state = match tables.entry(table.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if !lenient_schema {
                    return Err(WalkThroughError::table_not_exists(table));
                }
                warn!(table, "table missing from snapshot, creating placeholder");
                if ctx.scope() == IdentifierScope::Schema {
                    identifiers.insert(table.to_string());
                }
                entry.insert(TableState::placeholder(table))
            }
        };
        let lenient = lenient_schema || !table_state.complete;
        Ok(TableScope {
            table: table_state,
            identifiers,
            schema: name,
            ctx,
            lenient,
        })
    }
}

impl DatabaseState {
    pub(super) fn create_table(&mut self, create: &CreateTable) -> Result<()> {
        self.check_database(create.name.database.as_deref())?;
        let ctx = self.context();
        let source = match &create.like {
            Some(like) => self.like_source(like)?,
            None => None,
        };

        let schema = self.writable_schema(create.name.schema())?;
        let name = &create.name.name;
        if schema.tables.contains_key(name) {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(WalkThroughError::table_exists(name));
        }
        if schema.views.contains_key(name)
            || (ctx.scope() == IdentifierScope::Schema && schema.identifiers.contains(name))
        {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(relation_conflict(ctx.scope(), name, &schema.name));
        }

        if create.as_query && ctx.dialect.checks_mysql_columns() {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::StatementCreateTableAs,
                format!("CREATE TABLE AS statement is used for table `{}`", name),
            ));
        }

        let mut table = match (&create.like, source) {
            (Some(_), Some(source)) => {
                let mut copy = source.copy_as(name);
                if ctx.scope() == IdentifierScope::Schema {
                    // index names cannot be shared within a schema
                    copy.indexes.clear();
                }
                copy
            }
            (Some(_), None) => TableState::placeholder(name),
            (None, _) => TableState::new(name),
        };
        if create.as_query {
            table.complete = false;
        }
        apply_table_options(&mut table, &create.options);

        // the schema only sees the table once every definition applied
        let mut identifiers = schema.identifiers.clone();
        if ctx.scope() == IdentifierScope::Schema {
            identifiers.insert(name.clone());
            identifiers.extend(table.indexes.keys().cloned());
        }
        let lenient = !schema.check_integrity || !table.complete;
        let mut scope = TableScope {
            table: &mut table,
            identifiers: &mut identifiers,
            schema: &schema.name,
            ctx,
            lenient,
        };
        let mut auto_increment = false;
        for column in &create.columns {
            if ctx.dialect.checks_mysql_columns()
                && column.options.contains(&ColumnOption::AutoIncrement)
            {
                if auto_increment {
                    return Err(WalkThroughError::new(
                        WalkThroughErrorKind::AutoIncrementExists,
                        format!("There can be only one auto column for table `{}`", name),
                    )
                    .or_line(column.line));
                }
                auto_increment = true;
            }
            scope
                .create_column(column, None, false)
                .map_err(|err| err.or_line(column.line))?;
        }
        for constraint in &create.constraints {
            scope
                .create_constraint(constraint)
                .map_err(|err| err.or_line(constraint.line))?;
        }

        schema.identifiers = identifiers;
        schema.tables.insert(name.clone(), table);
        Ok(())
    }

    /// Copy of the table named by `CREATE TABLE ... LIKE`
    fn like_source(&self, like: &QualifiedName) -> Result<Option<TableState>> {
        self.check_database(like.database.as_deref())?;
        match Finder::new(self).find_table(like.schema(), &like.name) {
            Some(table) => Ok(Some(table.clone())),
            None if self.check_integrity => Err(WalkThroughError::table_not_exists(&like.name)),
            None => Ok(None),
        }
    }

    pub(super) fn alter_table(&mut self, alter: &AlterTable) -> Result<()> {
        self.check_database(alter.name.database.as_deref())?;
        let ctx = self.context();
        let mut current = QualifiedName {
            database: None,
            ..alter.name.clone()
        };
        if alter.if_exists
            && Finder::new(self)
                .find_table(current.schema(), &current.name)
                .is_none()
        {
            return Ok(());
        }

        for operation in &alter.operations {
            match operation {
                AlterTableOperation::RenameTo(new_name) => {
                    let target = QualifiedName {
                        schema: new_name.schema.clone().or_else(|| current.schema.clone()),
                        ..new_name.clone()
                    };
                    self.rename_table(&current, &target)?;
                    current = QualifiedName {
                        database: None,
                        ..target
                    };
                }
                AlterTableOperation::SetSchema(schema) => {
                    self.set_table_schema(&current, schema)?;
                    current.schema = Some(schema.clone());
                }
                operation => {
                    let schema = self.writable_schema(current.schema())?;
                    schema.table_scope(&current.name, ctx)?.alter(operation)?;
                }
            }
        }
        Ok(())
    }

    pub(super) fn drop_table(&mut self, drop: &DropTable) -> Result<()> {
        for name in &drop.names {
            self.check_database(name.database.as_deref())?;
            let Some(schema) = self.existing_schema(name.schema(), drop.if_exists)? else {
                continue;
            };
            match schema.tables.shift_remove(&name.name) {
                Some(table) => {
                    for relation in iter::once(&table.name).chain(table.indexes.keys()) {
                        schema.identifiers.shift_remove(relation);
                    }
                }
                None if drop.if_exists || !schema.check_integrity => {}
                None => return Err(WalkThroughError::table_not_exists(&name.name)),
            }
        }
        Ok(())
    }

    pub(super) fn rename_tables(&mut self, rename: &RenameTable) -> Result<()> {
        for (old, new) in &rename.renames {
            self.rename_table(old, new)?;
        }
        Ok(())
    }

    /// Rename within the current database, or drop a table moved elsewhere
    pub(super) fn rename_table(&mut self, old: &QualifiedName, new: &QualifiedName) -> Result<()> {
        let ctx = self.context();
        let old_database = old.database.as_deref();
        if !self.is_current_database(old_database) {
            return Err(WalkThroughError::access_other_database(
                old_database.unwrap_or_default(),
                &self.name,
            ));
        }

        let stays = self.is_current_database(new.database.as_deref());
        let schema = self.writable_schema(old.schema())?;
        if !stays {
            // moved into another database
            match schema.tables.shift_remove(&old.name) {
                Some(table) => {
                    for relation in iter::once(&table.name).chain(table.indexes.keys()) {
                        schema.identifiers.shift_remove(relation);
                    }
                }
                None if !schema.check_integrity => {}
                None => return Err(WalkThroughError::table_not_exists(&old.name)),
            }
            return Ok(());
        }

        if old.name == new.name {
            return Ok(());
        }
        if schema.tables.contains_key(&new.name) {
            return Err(WalkThroughError::table_exists(&new.name));
        }
        if ctx.scope() == IdentifierScope::Schema && schema.identifiers.contains(&new.name) {
            return Err(WalkThroughError::relation_exists(&new.name, &schema.name));
        }

        let table = match schema.tables.shift_remove(&old.name) {
            Some(table) => table.copy_as(&new.name),
            None if !schema.check_integrity => {
                warn!(table = %old.name, "renamed table missing from snapshot, creating placeholder");
                TableState::placeholder(&new.name)
            }
            None => return Err(WalkThroughError::table_not_exists(&old.name)),
        };
        if ctx.scope() == IdentifierScope::Schema {
            schema.identifiers.shift_remove(&old.name);
            schema.identifiers.insert(new.name.clone());
        }
        schema.tables.insert(new.name.clone(), table);
        Ok(())
    }

    /// `ALTER TABLE ... SET SCHEMA`: move a table and its index names
    fn set_table_schema(&mut self, current: &QualifiedName, target: &str) -> Result<()> {
        let ctx = self.context();
        let source_name = self.schema_name(current.schema()).to_string();
        if source_name == target {
            return Ok(());
        }
        self.writable_schema(Some(target))?;

        let relations: Vec<String> = match Finder::new(self).find_table(current.schema(), &current.name) {
            Some(table) => iter::once(table.name.clone())
                .chain(table.indexes.keys().cloned())
                .collect(),
            None => vec![current.name.clone()],
        };
        if let Some(target_schema) = self.schema(target) {
            if target_schema.tables.contains_key(&current.name) {
                return Err(relation_conflict(ctx.scope(), &current.name, target));
            }
            if ctx.scope() == IdentifierScope::Schema {
                if let Some(taken) = relations
                    .iter()
                    .find(|name| target_schema.identifiers.contains(*name))
                {
                    return Err(WalkThroughError::relation_exists(taken, target));
                }
            }
        }

        let source = self.writable_schema(Some(&source_name))?;
        let table = match source.tables.shift_remove(&current.name) {
            Some(table) => table,
            None if !source.check_integrity => TableState::placeholder(&current.name),
            None => return Err(WalkThroughError::table_not_exists(&current.name)),
        };
        for name in &relations {
            source.identifiers.shift_remove(name);
        }

        let target_schema = self.writable_schema(Some(target))?;
        if ctx.scope() == IdentifierScope::Schema {
            target_schema.identifiers.extend(relations);
        }
        target_schema.tables.insert(table.name.clone(), table);
        Ok(())
    }
}

fn apply_table_options(table: &mut TableState, options: &[TableOption]) {
    for option in options {
        match option {
            TableOption::Engine(engine) => table.engine = Some(engine.clone()),
            TableOption::Collation(collation) => table.collation = Some(collation.clone()),
            TableOption::Comment(comment) => table.comment = Some(comment.clone()),
        }
    }
}

/// Column state and inline key requests of a column definition
struct BuiltColumn {
    column: ColumnState,
    primary: bool,
    unique: bool,
}

fn build_column(definition: &ColumnDefinition, dialect: SqlDialect) -> Result<BuiltColumn> {
    let mut column = ColumnState::new(&definition.name, &definition.data_type);
    column.character_set = definition.character_set.clone();
    column.collation = definition.collation.clone();
    let mut primary = false;
    let mut unique = false;

    for option in &definition.options {
        match option {
            ColumnOption::Null => column.nullable = true,
            ColumnOption::NotNull => column.nullable = false,
            ColumnOption::Default(value) => column.default = Some(value.clone()),
            ColumnOption::Comment(comment) => column.comment = Some(comment.clone()),
            ColumnOption::PrimaryKey => {
                column.nullable = false;
                primary = true;
            }
            ColumnOption::Unique => unique = true,
            ColumnOption::AutoIncrement
            | ColumnOption::OnUpdate(_)
            | ColumnOption::Check
            | ColumnOption::ForeignKey => {}
        }
    }
    if dialect.checks_mysql_columns() {
        check_mysql_column(definition, column.nullable)?;
    }
    Ok(BuiltColumn {
        column,
        primary,
        unique,
    })
}

/// Types MySQL refuses a DEFAULT for
const NO_DEFAULT_TYPES: &[&str] = &[
    "text",
    "tinytext",
    "mediumtext",
    "longtext",
    "blob",
    "tinyblob",
    "mediumblob",
    "longblob",
    "long",
    "serial",
    "json",
    "geometry",
    "geometrycollection",
    "point",
    "multipoint",
    "linestring",
    "multilinestring",
    "polygon",
    "multipolygon",
];

/// Type name without length, precision or modifiers, lower case
fn base_type(data_type: &str) -> String {
    data_type
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn check_mysql_column(definition: &ColumnDefinition, nullable: bool) -> Result<()> {
    let base = base_type(&definition.data_type);
    for option in &definition.options {
        match option {
            ColumnOption::Default(_) if NO_DEFAULT_TYPES.contains(&base.as_str()) => {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::InvalidColumnDefault,
                    format!(
                        "BLOB, TEXT, GEOMETRY or JSON column `{}` can't have a default value",
                        definition.name
                    ),
                ));
            }
            ColumnOption::Default(value) if !nullable && value.eq_ignore_ascii_case("NULL") => {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::SetNullDefaultForNotNullColumn,
                    format!("Invalid default value for column `{}`", definition.name),
                ));
            }
            ColumnOption::OnUpdate(_) if base != "datetime" && base != "timestamp" => {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::OnUpdateColumnNotDatetimeOrTimestamp,
                    format!(
                        "Column `{}` use ON UPDATE but is not DATETIME or TIMESTAMP",
                        definition.name
                    ),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

impl TableScope<'_> {
    pub(super) fn alter(&mut self, operation: &AlterTableOperation) -> Result<()> {
        match operation {
            AlterTableOperation::SetOptions(options) => {
                apply_table_options(self.table, options);
                Ok(())
            }
            AlterTableOperation::AddColumn {
                column,
                if_not_exists,
                placement,
            } => self.create_column(column, placement.as_ref(), *if_not_exists),
            AlterTableOperation::AddConstraint(constraint) => self.create_constraint(constraint),
            AlterTableOperation::DropColumn { name, if_exists } => {
                self.drop_column(name, *if_exists)
            }
            AlterTableOperation::DropPrimaryKey => self.drop_primary_key(),
            AlterTableOperation::DropIndex { name } => self.drop_index(name, false),
            AlterTableOperation::DropConstraint { name, .. } => self.drop_constraint(name),
            AlterTableOperation::DropForeignKey { .. } => Ok(()),
            AlterTableOperation::ChangeColumn {
                old_name,
                column,
                placement,
            } => self.change_column(old_name, column, placement.as_ref()),
            AlterTableOperation::RenameColumn { old_name, new_name } => {
                self.rename_column(old_name, new_name)
            }
            AlterTableOperation::AlterColumn { name, operation } => {
                self.alter_column(name, operation)
            }
            AlterTableOperation::RenameIndex { old_name, new_name } => {
                self.rename_index(old_name, new_name)
            }
            AlterTableOperation::RenameConstraint { old_name, new_name } => {
                self.rename_constraint(old_name, new_name)
            }
            AlterTableOperation::SetIndexVisibility { name, visible } => {
                self.set_index_visibility(name, *visible)
            }
            // handled by the caller, they move the table
            AlterTableOperation::RenameTo(_) | AlterTableOperation::SetSchema(_) => Ok(()),
        }
    }

    fn column_not_exists(&self, column: &str) -> WalkThroughError {
        WalkThroughError::column_not_exists(column, &self.table.name)
    }

    /// Position for a new column, 1-based
    fn placement_position(&self, placement: Option<&ColumnPlacement>) -> Result<usize> {
        match placement {
            None => Ok(self.table.columns.len() + 1),
            Some(ColumnPlacement::First) => Ok(1),
            Some(ColumnPlacement::After(column)) => match self.table.columns.get(column) {
                Some(column) => Ok(column.position + 1),
                None if self.lenient => Ok(self.table.columns.len() + 1),
                None => Err(self.column_not_exists(column)),
            },
        }
    }

    pub(super) fn create_column(
        &mut self,
        definition: &ColumnDefinition,
        placement: Option<&ColumnPlacement>,
        if_not_exists: bool,
    ) -> Result<()> {
        if self.table.columns.contains_key(&definition.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(WalkThroughError::column_exists(
                &definition.name,
                &self.table.name,
            ));
        }
        let position = self.placement_position(placement)?;
        let built = build_column(definition, self.ctx.dialect)?;
        self.insert_built_column(built, position)
    }

    fn insert_built_column(&mut self, built: BuiltColumn, position: usize) -> Result<()> {
        let name = built.column.name.clone();
        self.table.insert_column_at(built.column, position);
        if self.table.in_primary_key(&name) {
            if let Some(column) = self.table.columns.get_mut(&name) {
                column.nullable = false;
            }
        }
        if built.primary {
            self.create_primary_key(vec![IndexKey::Column(name.clone())], None, None)?;
        }
        if built.unique {
            self.create_index(IndexSpec::unique_constraint(
                None,
                vec![IndexKey::Column(name)],
                None,
            ))?;
        }
        Ok(())
    }

    pub(super) fn drop_column(&mut self, name: &str, if_exists: bool) -> Result<()> {
        if !self.table.columns.contains_key(name) {
            if if_exists || self.lenient {
                return Ok(());
            }
            return Err(self.column_not_exists(name));
        }
        if self.table.columns.len() == 1 && !self.ctx.dialect.allows_empty_tables() {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::DropAllColumns,
                format!(
                    "Can't delete all columns with ALTER TABLE; use DROP TABLE `{}` instead",
                    self.table.name
                ),
            ));
        }
        self.table.remove_column(name);
        self.drop_column_from_indexes(name);
        Ok(())
    }

    /// Remove a dropped column from index keys.
    ///
    /// Table-scoped dialects shrink the index and drop it once empty;
    /// schema-scoped dialects drop every index using the column.
    fn drop_column_from_indexes(&mut self, column: &str) {
        let affected: Vec<String> = self
            .table
            .indexes
            .values()
            .filter(|index| index.expressions.iter().any(|key| key == column))
            .map(|index| index.name.clone())
            .collect();

        for index_name in affected {
            let drop = match self.ctx.scope() {
                IdentifierScope::Schema => true,
                IdentifierScope::Table => match self.table.indexes.get_mut(&index_name) {
                    Some(index) => {
                        index.expressions.retain(|key| key != column);
                        index.expressions.is_empty()
                    }
                    None => false,
                },
            };
            if drop {
                trace!(index = %index_name, "index dropped with its last key");
                self.remove_index(&index_name);
            }
        }
    }

    /// MODIFY / CHANGE COLUMN; the column keeps its position unless placed
    pub(super) fn change_column(
        &mut self,
        old_name: &str,
        definition: &ColumnDefinition,
        placement: Option<&ColumnPlacement>,
    ) -> Result<()> {
        let Some(old_position) = self.table.columns.get(old_name).map(|c| c.position) else {
            if self.lenient {
                return self.create_column(definition, placement, false);
            }
            return Err(self.column_not_exists(old_name));
        };
        if definition.name != old_name && self.table.columns.contains_key(&definition.name) {
            return Err(WalkThroughError::column_exists(
                &definition.name,
                &self.table.name,
            ));
        }

        self.table.remove_column(old_name);
        if definition.name != old_name {
            self.table.rename_column(old_name, &definition.name);
        }
        let position = match placement {
            None => old_position,
            placement => self.placement_position(placement)?,
        };
        let built = build_column(definition, self.ctx.dialect)?;
        self.insert_built_column(built, position)
    }

    pub(super) fn rename_column(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if !self.table.columns.contains_key(old_name) {
            if !self.lenient {
                return Err(self.column_not_exists(old_name));
            }
            if !self.table.columns.contains_key(new_name) {
                self.table.push_column(ColumnState::placeholder(new_name));
            }
            return Ok(());
        }
        if old_name == new_name {
            return Ok(());
        }
        if self.table.columns.contains_key(new_name) {
            return Err(WalkThroughError::column_exists(new_name, &self.table.name));
        }
        self.table.rename_column(old_name, new_name);
        Ok(())
    }

    pub(super) fn alter_column(&mut self, name: &str, operation: &AlterColumnOperation) -> Result<()> {
        if !self.table.columns.contains_key(name) {
            if !self.lenient {
                return Err(self.column_not_exists(name));
            }
            self.table.push_column(ColumnState::placeholder(name));
        }
        if *operation == AlterColumnOperation::DropNotNull && self.table.in_primary_key(name) {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::InvalidStatement,
                format!(
                    "Column `{}` is in the primary key of table `{}`",
                    name, self.table.name
                ),
            ));
        }
        let table_name = self.table.name.clone();
        let column = self
            .table
            .columns
            .get_mut(name)
            .ok_or_else(|| WalkThroughError::column_not_exists(name, &table_name))?;

        match operation {
            AlterColumnOperation::SetDefault(value) => column.default = Some(value.clone()),
            AlterColumnOperation::DropDefault => column.default = None,
            AlterColumnOperation::SetNotNull => column.nullable = false,
            AlterColumnOperation::DropNotNull => column.nullable = true,
            AlterColumnOperation::SetDataType {
                data_type,
                collation,
            } => {
                column.column_type = data_type.clone();
                if collation.is_some() {
                    column.collation = collation.clone();
                }
            }
        }
        Ok(())
    }
}
