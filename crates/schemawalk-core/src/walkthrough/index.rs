//! Index, primary key and constraint transitions

use tracing::{trace, warn};

use super::node::{
    AlterIndex, AlterIndexOperation, ConstraintKind, CreateIndex, DropIndex, IndexKey, IndexKind,
    TableConstraint,
};
use super::{Result, TableScope};
use crate::catalog::{ColumnState, DatabaseState, IndexState};
use crate::dialect::IdentifierScope;
use crate::error::{WalkThroughError, WalkThroughErrorKind};

const RESERVED_PRIMARY: &str = "PRIMARY";
const FUNCTIONAL_INDEX: &str = "functional_index";

/// Canonical request every index-producing statement is desugared into
#[derive(Debug, Clone)]
pub(crate) struct IndexSpec {
    pub name: Option<String>,
    pub keys: Vec<IndexKey>,
    pub kind: IndexKind,
    pub primary: bool,
    pub method: Option<String>,
    pub visible: bool,
    pub is_constraint: bool,
    pub if_not_exists: bool,
}

impl IndexSpec {
    fn from_create(create: &CreateIndex) -> Self {
        Self {
            name: create.name.clone(),
            keys: create.keys.clone(),
            kind: create.kind,
            primary: false,
            method: create.method.clone(),
            visible: create.visible,
            is_constraint: false,
            if_not_exists: create.if_not_exists,
        }
    }

    fn constraint(name: Option<String>, keys: Vec<IndexKey>, kind: IndexKind) -> Self {
        Self {
            name,
            keys,
            kind,
            primary: false,
            method: None,
            visible: true,
            is_constraint: true,
            if_not_exists: false,
        }
    }

    /// UNIQUE column or table constraint
    pub fn unique_constraint(
        name: Option<String>,
        keys: Vec<IndexKey>,
        method: Option<String>,
    ) -> Self {
        Self {
            method,
            ..Self::constraint(name, keys, IndexKind::Unique)
        }
    }

    fn unique(&self) -> bool {
        self.primary || self.kind == IndexKind::Unique
    }
}

fn is_reserved(name: &str) -> bool {
    name.eq_ignore_ascii_case(RESERVED_PRIMARY)
}

fn incorrect_index_name(name: &str) -> WalkThroughError {
    WalkThroughError::new(
        WalkThroughErrorKind::IncorrectIndexName,
        format!("Incorrect index name `{}`", name),
    )
}

impl TableScope<'_> {
    /// Conflict error if `name` is already used in the index namespace
    fn name_taken(&self, name: &str) -> Option<WalkThroughError> {
        match self.ctx.scope() {
            IdentifierScope::Table => self
                .table
                .indexes
                .contains_key(name)
                .then(|| WalkThroughError::index_exists(name, &self.table.name)),
            IdentifierScope::Schema => (self.identifiers.contains(name)
                || self.table.indexes.contains_key(name))
            .then(|| WalkThroughError::relation_exists(name, self.schema)),
        }
    }

    /// First free name of the form `base`, `base1`, `base2`, ...
    fn first_free_name(&self, base: String) -> String {
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.name_taken(&candidate).is_some() {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    fn generate_index_name(&self, spec: &IndexSpec) -> String {
        match self.ctx.scope() {
            IdentifierScope::Table => {
                let base = match spec.keys.first() {
                    Some(IndexKey::Column(column)) => column.clone(),
                    _ => FUNCTIONAL_INDEX.to_string(),
                };
                let mut candidate = base.clone();
                let mut suffix = 2;
                while is_reserved(&candidate) || self.name_taken(&candidate).is_some() {
                    candidate = format!("{}_{}", base, suffix);
                    suffix += 1;
                }
                candidate
            }
            IdentifierScope::Schema => {
                let keys: Vec<&str> = spec
                    .keys
                    .iter()
                    .map(|key| match key {
                        IndexKey::Column(column) => column.as_str(),
                        IndexKey::Expression(_) => "expr",
                    })
                    .collect();
                let suffix = if spec.is_constraint && spec.unique() {
                    "key"
                } else {
                    "idx"
                };
                self.first_free_name(format!("{}_{}_{}", self.table.name, keys.join("_"), suffix))
            }
        }
    }

    fn generate_primary_key_name(&self) -> String {
        match self.ctx.dialect.primary_key_name() {
            Some(fixed) => fixed.to_string(),
            None => self.first_free_name(format!("{}_pkey", self.table.name)),
        }
    }

    fn check_shape(&self, spec: &IndexSpec, display_name: &str) -> Result<()> {
        if spec.keys.is_empty() {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::IndexEmptyKeys,
                format!(
                    "Index `{}` in table `{}` has no key",
                    display_name, self.table.name
                ),
            ));
        }
        if let Some(limit) = self.ctx.max_index_keys {
            if spec.keys.len() > limit {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::IndexKeyNumberExceedsLimit,
                    format!(
                        "Index `{}` in table `{}` has {} keys, the limit is {}",
                        display_name,
                        self.table.name,
                        spec.keys.len(),
                        limit
                    ),
                ));
            }
        }
        for (i, key) in spec.keys.iter().enumerate() {
            if spec.keys[..i].contains(key) {
                return Err(WalkThroughError::new(
                    WalkThroughErrorKind::IndexDuplicateKeys,
                    format!(
                        "Duplicate key `{}` in index `{}` of table `{}`",
                        key.text(),
                        display_name,
                        self.table.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Check key columns, then apply their side effects.
    ///
    /// Nothing is mutated unless every key passes.
    fn validate_keys(&mut self, spec: &IndexSpec) -> Result<()> {
        for key in &spec.keys {
            let IndexKey::Column(name) = key else {
                continue;
            };
            match self.table.columns.get(name) {
                Some(column) if spec.kind == IndexKind::Spatial && column.nullable => {
                    return Err(WalkThroughError::new(
                        WalkThroughErrorKind::SpatialIndexKeyNullable,
                        format!(
                            "All parts of a SPATIAL index must be NOT NULL, column `{}` is nullable",
                            name
                        ),
                    ));
                }
                Some(_) => {}
                None if self.lenient => {}
                None => {
                    return Err(WalkThroughError::column_not_exists(name, &self.table.name));
                }
            }
        }

        for key in &spec.keys {
            let IndexKey::Column(name) = key else {
                continue;
            };
            if !self.table.columns.contains_key(name) {
                warn!(table = %self.table.name, column = %name, "index key missing from snapshot, creating placeholder column");
                self.table.push_column(ColumnState::placeholder(name));
            }
            if spec.primary {
                if let Some(column) = self.table.columns.get_mut(name) {
                    column.nullable = false;
                }
            }
        }
        Ok(())
    }

    pub(super) fn create_index(&mut self, spec: IndexSpec) -> Result<()> {
        let display_name = spec.name.clone().unwrap_or_default();
        self.check_shape(&spec, &display_name)?;

        let name = match &spec.name {
            Some(name) => {
                if !spec.primary
                    && self.ctx.scope() == IdentifierScope::Table
                    && is_reserved(name)
                {
                    return Err(incorrect_index_name(name));
                }
                if let Some(err) = self.name_taken(name) {
                    if spec.if_not_exists {
                        return Ok(());
                    }
                    return Err(err);
                }
                name.clone()
            }
            None if spec.primary => self.generate_primary_key_name(),
            None => self.generate_index_name(&spec),
        };
        self.validate_keys(&spec)?;

        let index_type = match (&spec.method, spec.kind) {
            (Some(method), _) => method.clone(),
            (None, IndexKind::Fulltext) => "FULLTEXT".to_string(),
            (None, IndexKind::Spatial) => "SPATIAL".to_string(),
            (None, _) => self.ctx.dialect.default_index_method().to_string(),
        };
        let index = IndexState {
            index_type,
            unique: spec.unique(),
            primary: spec.primary,
            visible: spec.visible,
            is_constraint: spec.is_constraint || spec.primary,
            ..IndexState::new(
                &name,
                spec.keys.iter().map(|key| key.text().to_string()).collect(),
            )
        };

        trace!(table = %self.table.name, index = %name, "index created");
        if self.ctx.scope() == IdentifierScope::Schema {
            self.identifiers.insert(name.clone());
        }
        self.table.indexes.insert(name, index);
        Ok(())
    }

    pub(super) fn create_primary_key(
        &mut self,
        keys: Vec<IndexKey>,
        name: Option<&str>,
        method: Option<&str>,
    ) -> Result<()> {
        if self.table.primary_key().is_some() {
            return Err(self.primary_key_exists());
        }
        let name = match self.ctx.dialect.primary_key_name() {
            Some(fixed) => Some(fixed.to_string()),
            None => name.map(str::to_string),
        };
        self.create_index(IndexSpec {
            name,
            keys,
            kind: IndexKind::Unique,
            primary: true,
            method: method.map(str::to_string),
            visible: true,
            is_constraint: true,
            if_not_exists: false,
        })
    }

    fn primary_key_exists(&self) -> WalkThroughError {
        WalkThroughError::new(
            WalkThroughErrorKind::PrimaryKeyExists,
            format!("Primary key already exists in table `{}`", self.table.name),
        )
    }

    pub(super) fn create_constraint(&mut self, constraint: &TableConstraint) -> Result<()> {
        let name = constraint.name.clone();
        match &constraint.kind {
            ConstraintKind::PrimaryKey { keys, index_type } => {
                self.create_primary_key(keys.clone(), name.as_deref(), index_type.as_deref())
            }
            ConstraintKind::PrimaryKeyUsingIndex { index } => {
                self.promote_to_primary_key(index, name.as_deref())
            }
            ConstraintKind::Unique {
                index_name,
                keys,
                index_type,
            } => self.create_index(IndexSpec::unique_constraint(
                index_name.clone().or(name),
                keys.clone(),
                index_type.clone(),
            )),
            ConstraintKind::UniqueUsingIndex { index } => self.attach_unique(index, name.as_deref()),
            ConstraintKind::Index { keys, index_type } => self.create_index(IndexSpec {
                method: index_type.clone(),
                is_constraint: false,
                ..IndexSpec::constraint(name, keys.clone(), IndexKind::Normal)
            }),
            ConstraintKind::Fulltext { keys } => self.create_index(IndexSpec {
                is_constraint: false,
                ..IndexSpec::constraint(name, keys.clone(), IndexKind::Fulltext)
            }),
            ConstraintKind::Spatial { keys } => self.create_index(IndexSpec {
                is_constraint: false,
                ..IndexSpec::constraint(name, keys.clone(), IndexKind::Spatial)
            }),
            ConstraintKind::ForeignKey { columns, .. } => {
                self.create_foreign_key_index(name, columns)
            }
            ConstraintKind::Check => Ok(()),
        }
    }

    /// Table-scoped dialects back a foreign key with an index on its columns
    fn create_foreign_key_index(&mut self, name: Option<String>, columns: &[String]) -> Result<()> {
        if self.ctx.scope() != IdentifierScope::Table || columns.is_empty() {
            return Ok(());
        }
        let covered = self
            .table
            .indexes
            .values()
            .any(|index| index.expressions.starts_with(columns));
        if covered {
            return Ok(());
        }
        let name = name.filter(|name| self.name_taken(name).is_none());
        self.create_index(IndexSpec {
            is_constraint: false,
            ..IndexSpec::constraint(
                name,
                columns.iter().map(IndexKey::column).collect(),
                IndexKind::Normal,
            )
        })
    }

    /// Rename an index entry and its namespace claim
    fn move_index(&mut self, old_name: &str, new_name: &str) {
        self.table.rename_index(old_name, new_name);
        if self.ctx.scope() == IdentifierScope::Schema {
            self.identifiers.shift_remove(old_name);
            self.identifiers.insert(new_name.to_string());
        }
    }

    /// `ADD [CONSTRAINT name] PRIMARY KEY USING INDEX index`
    fn promote_to_primary_key(&mut self, index: &str, constraint_name: Option<&str>) -> Result<()> {
        if self.table.primary_key().is_some() {
            return Err(self.primary_key_exists());
        }
        let Some(keys) = self
            .table
            .indexes
            .get(index)
            .map(|existing| existing.expressions.clone())
        else {
            if self.lenient {
                return Ok(());
            }
            return Err(WalkThroughError::index_not_exists(index, &self.table.name));
        };

        let new_name = self
            .ctx
            .dialect
            .primary_key_name()
            .or(constraint_name)
            .unwrap_or(index)
            .to_string();
        if new_name != index {
            if let Some(err) = self.name_taken(&new_name) {
                return Err(err);
            }
            self.move_index(index, &new_name);
        }
        if let Some(promoted) = self.table.indexes.get_mut(&new_name) {
            promoted.primary = true;
            promoted.unique = true;
            promoted.is_constraint = true;
        }
        for key in &keys {
            if let Some(column) = self.table.columns.get_mut(key) {
                column.nullable = false;
            }
        }
        Ok(())
    }

    /// `ADD [CONSTRAINT name] UNIQUE USING INDEX index`
    fn attach_unique(&mut self, index: &str, constraint_name: Option<&str>) -> Result<()> {
        if !self.table.indexes.contains_key(index) {
            if self.lenient {
                return Ok(());
            }
            return Err(WalkThroughError::index_not_exists(index, &self.table.name));
        }
        let name = constraint_name.unwrap_or(index).to_string();
        if name != index {
            if let Some(err) = self.name_taken(&name) {
                return Err(err);
            }
            self.move_index(index, &name);
        }
        if let Some(attached) = self.table.indexes.get_mut(&name) {
            attached.unique = true;
            attached.is_constraint = true;
        }
        Ok(())
    }

    pub(super) fn remove_index(&mut self, name: &str) -> Option<IndexState> {
        let removed = self.table.indexes.shift_remove(name)?;
        self.identifiers.shift_remove(name);
        Some(removed)
    }

    /// Resolve an index name, mapping `PRIMARY` to the primary key
    fn resolve_index(&self, name: &str) -> Option<String> {
        if self.table.indexes.contains_key(name) {
            return Some(name.to_string());
        }
        if self.ctx.scope() == IdentifierScope::Table && is_reserved(name) {
            return self.table.primary_key().map(|pk| pk.name.clone());
        }
        None
    }

    pub(super) fn drop_index(&mut self, name: &str, if_exists: bool) -> Result<()> {
        match self.resolve_index(name) {
            Some(index) => {
                self.remove_index(&index);
                Ok(())
            }
            None if if_exists || self.lenient => Ok(()),
            None => Err(WalkThroughError::index_not_exists(name, &self.table.name)),
        }
    }

    pub(super) fn drop_primary_key(&mut self) -> Result<()> {
        match self.table.primary_key().map(|pk| pk.name.clone()) {
            Some(name) => {
                self.remove_index(&name);
                Ok(())
            }
            None if self.lenient => Ok(()),
            None => Err(WalkThroughError::new(
                WalkThroughErrorKind::PrimaryKeyNotExists,
                format!("Primary key does not exist in table `{}`", self.table.name),
            )),
        }
    }

    /// Index fabricated for a rename or visibility change of an unknown index
    fn placeholder_index(&mut self, name: &str) -> &mut IndexState {
        warn!(table = %self.table.name, index = %name, "index missing from snapshot, creating placeholder");
        if self.ctx.scope() == IdentifierScope::Schema {
            self.identifiers.insert(name.to_string());
        }
        let index = IndexState {
            index_type: self.ctx.dialect.default_index_method().to_string(),
            ..IndexState::new(name, Vec::new())
        };
        self.table
            .indexes
            .entry(name.to_string())
            .or_insert(index)
    }

    pub(super) fn rename_index(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if self.ctx.scope() == IdentifierScope::Table {
            if let Some(reserved) = [old_name, new_name].into_iter().find(|n| is_reserved(n)) {
                return Err(incorrect_index_name(reserved));
            }
        }
        if !self.table.indexes.contains_key(old_name) {
            if !self.lenient {
                return Err(WalkThroughError::index_not_exists(old_name, &self.table.name));
            }
            if self.name_taken(new_name).is_none() {
                self.placeholder_index(new_name);
            }
            return Ok(());
        }
        if old_name == new_name {
            return Ok(());
        }
        if let Some(err) = self.name_taken(new_name) {
            return Err(err);
        }
        self.move_index(old_name, new_name);
        Ok(())
    }

    pub(super) fn set_index_visibility(&mut self, name: &str, visible: bool) -> Result<()> {
        if let Some(index) = self.table.indexes.get_mut(name) {
            index.visible = visible;
            return Ok(());
        }
        if !self.lenient {
            return Err(WalkThroughError::index_not_exists(name, &self.table.name));
        }
        self.placeholder_index(name).visible = visible;
        Ok(())
    }

    /// Constraints without a backing index (CHECK, FOREIGN KEY) are not tracked
    pub(super) fn rename_constraint(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let Some(index) = self.table.indexes.get(old_name) else {
            return Ok(());
        };
        if !index.is_constraint {
            return Err(WalkThroughError::new(
                WalkThroughErrorKind::ConstraintNotExists,
                format!(
                    "Constraint `{}` for table `{}` does not exist",
                    old_name, self.table.name
                ),
            ));
        }
        if old_name == new_name {
            return Ok(());
        }
        if let Some(err) = self.name_taken(new_name) {
            return Err(err);
        }
        self.move_index(old_name, new_name);
        Ok(())
    }

    /// Unknown names are skipped, CHECK and FOREIGN KEY constraints are not tracked
    pub(super) fn drop_constraint(&mut self, name: &str) -> Result<()> {
        if let Some(index) = self.resolve_index(name) {
            self.remove_index(&index);
        }
        Ok(())
    }

    pub(super) fn alter_index(&mut self, name: &str, operation: &AlterIndexOperation) -> Result<()> {
        match operation {
            AlterIndexOperation::RenameTo(new_name) => self.rename_index(name, new_name),
            AlterIndexOperation::SetVisibility(visible) => self.set_index_visibility(name, *visible),
        }
    }
}

impl DatabaseState {
    pub(super) fn create_index(&mut self, create: &CreateIndex) -> Result<()> {
        self.check_database(create.table.database.as_deref())?;
        let ctx = self.context();
        let schema = self.writable_schema(create.table.schema())?;
        schema
            .table_scope(&create.table.name, ctx)?
            .create_index(IndexSpec::from_create(create))
    }

    pub(super) fn drop_index(&mut self, drop: &DropIndex) -> Result<()> {
        let ctx = self.context();
        for name in &drop.names {
            match &drop.table {
                Some(table) => {
                    self.check_database(table.database.as_deref())?;
                    let Some(schema) = self.existing_schema(table.schema(), drop.if_exists)? else {
                        continue;
                    };
                    if drop.if_exists && !schema.tables.contains_key(&table.name) {
                        continue;
                    }
                    schema
                        .table_scope(&table.name, ctx)?
                        .drop_index(&name.name, drop.if_exists)?;
                }
                None => {
                    self.check_database(name.database.as_deref())?;
                    let Some(schema) = self.existing_schema(name.schema(), drop.if_exists)? else {
                        continue;
                    };
                    let owner = schema
                        .tables
                        .values_mut()
                        .find(|table| table.indexes.contains_key(&name.name));
                    match owner {
                        Some(table) => {
                            table.indexes.shift_remove(&name.name);
                            schema.identifiers.shift_remove(&name.name);
                        }
                        None if drop.if_exists || !schema.check_integrity => {}
                        None => {
                            return Err(WalkThroughError::new(
                                WalkThroughErrorKind::IndexNotExists,
                                format!(
                                    "Index `{}` does not exist in schema `{}`",
                                    name.name, schema.name
                                ),
                            ))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub(super) fn alter_index(&mut self, alter: &AlterIndex) -> Result<()> {
        let ctx = self.context();
        match &alter.table {
            Some(table) => {
                self.check_database(table.database.as_deref())?;
                let schema = self.writable_schema(table.schema())?;
                schema
                    .table_scope(&table.name, ctx)?
                    .alter_index(&alter.name.name, &alter.operation)
            }
            None => {
                self.check_database(alter.name.database.as_deref())?;
                let schema = self.writable_schema(alter.name.schema())?;
                let owner = schema
                    .index_owner(&alter.name.name)
                    .map(|table| table.name.clone());
                match owner {
                    Some(table) => schema
                        .table_scope(&table, ctx)?
                        .alter_index(&alter.name.name, &alter.operation),
                    None if !schema.check_integrity => Ok(()),
                    None => Err(WalkThroughError::new(
                        WalkThroughErrorKind::IndexNotExists,
                        format!(
                            "Index `{}` does not exist in schema `{}`",
                            alter.name.name, schema.name
                        ),
                    )),
                }
            }
        }
    }
}
