//! Lowering of sqlparser statements into walk-through nodes

use sqlparser::ast::{
    self, AlterColumnOperation as AstAlterColumn, AlterIndexOperation as AstAlterIndex,
    AlterTableOperation as AstAlterTable, ColumnOption as AstColumnOption, Expr, FromTable, Ident,
    MySQLColumnPosition, ObjectName, ObjectType, SchemaName, Statement,
    TableConstraint as AstConstraint, TableFactor,
};

use super::node::{
    AlterColumnOperation, AlterIndex, AlterIndexOperation, AlterTable, AlterTableOperation,
    ColumnDefinition, ColumnOption, ColumnPlacement, ConstraintKind, CreateDatabase, CreateIndex,
    CreateSchema, CreateTable, CreateTrigger, CreateView, DropDatabase, DropIndex, DropSchema,
    DropTable, DropView, IndexKey, IndexKind, Insert, RenameTable, StatementNode,
    TableConstraint, TableOption,
};
use crate::catalog::QualifiedName;
use crate::dialect::{IdentifierScope, SqlDialect};
use crate::error::{WalkThroughError, WalkThroughErrorKind};

type Result<T> = std::result::Result<T, WalkThroughError>;

/// Convert one parsed statement into the node the walk-through applies.
///
/// Statements with no effect on the catalog become [`StatementNode::Other`].
pub fn lower_statement(statement: &Statement, dialect: SqlDialect) -> Result<StatementNode> {
    Lowerer { dialect }.statement(statement)
}

struct Lowerer {
    dialect: SqlDialect,
}

impl Lowerer {
    /// Identifier text; PostgreSQL folds unquoted names to lower case
    fn ident(&self, ident: &Ident) -> String {
        if ident.quote_style.is_none() && self.dialect.folds_to_lowercase() {
            ident.value.to_lowercase()
        } else {
            ident.value.clone()
        }
    }

    fn idents(&self, idents: &[Ident]) -> Vec<String> {
        idents.iter().map(|ident| self.ident(ident)).collect()
    }

    fn object_name(&self, name: &ObjectName) -> Result<QualifiedName> {
        let parts = self.idents(&name.0);
        let table_scoped = self.dialect.identifier_scope() == IdentifierScope::Table;
        match parts.as_slice() {
            [name] => Ok(QualifiedName::new(name)),
            [database, name] if table_scoped => Ok(QualifiedName::with_database(database, name)),
            [schema, name] => Ok(QualifiedName::with_schema(schema, name)),
            [database, schema, name] if !table_scoped => Ok(QualifiedName {
                database: Some(database.clone()),
                schema: Some(schema.clone()),
                name: name.clone(),
            }),
            _ => Err(WalkThroughError::new(
                WalkThroughErrorKind::InvalidStatement,
                format!("Invalid object name `{}`", name),
            )),
        }
    }

    /// Last part of a possibly qualified name
    fn simple_name(&self, name: &ObjectName) -> String {
        name.0
            .last()
            .map(|ident| self.ident(ident))
            .unwrap_or_default()
    }

    fn statement(&self, statement: &Statement) -> Result<StatementNode> {
        let node = match statement {
            Statement::CreateTable(create) => StatementNode::CreateTable(self.create_table(create)?),
            Statement::AlterTable {
                name,
                if_exists,
                operations,
                ..
            } => StatementNode::AlterTable(AlterTable {
                name: self.object_name(name)?,
                if_exists: *if_exists,
                operations: self.alter_operations(operations)?,
            }),
            Statement::RenameTable(renames) => StatementNode::RenameTable(RenameTable {
                renames: renames
                    .iter()
                    .map(|rename| {
                        Ok((
                            self.object_name(&rename.old_name)?,
                            self.object_name(&rename.new_name)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?,
            }),
            Statement::CreateIndex(create) => StatementNode::CreateIndex(self.create_index(create)?),
            Statement::AlterIndex { name, operation } => match operation {
                AstAlterIndex::RenameIndex { index_name } => StatementNode::AlterIndex(AlterIndex {
                    name: self.object_name(name)?,
                    table: None,
                    operation: AlterIndexOperation::RenameTo(self.simple_name(index_name)),
                }),
            },
            Statement::Drop {
                object_type,
                if_exists,
                names,
                ..
            } => self.drop(object_type, *if_exists, names)?,
            Statement::CreateDatabase {
                db_name,
                if_not_exists,
                ..
            } => StatementNode::CreateDatabase(CreateDatabase {
                name: self.simple_name(db_name),
                if_not_exists: *if_not_exists,
            }),
            Statement::CreateSchema {
                schema_name,
                if_not_exists,
                ..
            } => {
                let name = match schema_name {
                    SchemaName::Simple(name) | SchemaName::NamedAuthorization(name, _) => {
                        self.simple_name(name)
                    }
                    SchemaName::UnnamedAuthorization(role) => self.ident(role),
                };
                match self.dialect.identifier_scope() {
                    // CREATE SCHEMA is a synonym of CREATE DATABASE here
                    IdentifierScope::Table => StatementNode::CreateDatabase(CreateDatabase {
                        name,
                        if_not_exists: *if_not_exists,
                    }),
                    IdentifierScope::Schema => StatementNode::CreateSchema(CreateSchema {
                        name,
                        if_not_exists: *if_not_exists,
                    }),
                }
            }
            Statement::CreateView {
                or_replace,
                name,
                query,
                ..
            } => StatementNode::CreateView(CreateView {
                name: self.object_name(name)?,
                or_replace: *or_replace,
                definition: Some(query.to_string()),
            }),
            Statement::CreateTrigger {
                name, table_name, ..
            } => StatementNode::CreateTrigger(CreateTrigger {
                name: name.to_string(),
                table: self.object_name(table_name)?,
            }),
            Statement::Insert(insert) => StatementNode::Insert(Insert {
                table: self.object_name(&insert.table_name)?,
                columns: self.idents(&insert.columns),
            }),
            Statement::Update { table, .. } => match &table.relation {
                TableFactor::Table { name, .. } => StatementNode::Update(self.object_name(name)?),
                _ => StatementNode::Other,
            },
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
                };
                match tables.first().map(|table| &table.relation) {
                    Some(TableFactor::Table { name, .. }) => {
                        StatementNode::Delete(self.object_name(name)?)
                    }
                    _ => StatementNode::Other,
                }
            }
            Statement::Query(_) => StatementNode::Select,
            _ => StatementNode::Other,
        };
        Ok(node)
    }

    fn create_table(&self, create: &ast::CreateTable) -> Result<CreateTable> {
        let mut table = CreateTable::new(self.object_name(&create.name)?);
        table.if_not_exists = create.if_not_exists;
        table.like = create
            .like
            .as_ref()
            .map(|like| self.object_name(like))
            .transpose()?;
        table.as_query = create.query.is_some();
        table.columns = create
            .columns
            .iter()
            .map(|column| self.column(column))
            .collect();

        table.constraints = create
            .constraints
            .iter()
            .map(|constraint| self.constraint(constraint))
            .collect();
        // after the table constraints so source lines still match in order
        for column in &create.columns {
            table.constraints.extend(self.inline_foreign_key(column));
        }

        if let Some(engine) = &create.engine {
            table.options.push(TableOption::Engine(engine.name.clone()));
        }
        if let Some(collation) = &create.collation {
            table.options.push(TableOption::Collation(collation.clone()));
        }
        if let Some(comment) = &create.comment {
            table.options.push(TableOption::Comment(comment.to_string()));
        }
        Ok(table)
    }

    fn column(&self, column: &ast::ColumnDef) -> ColumnDefinition {
        let mut definition = ColumnDefinition::new(self.ident(&column.name), column.data_type.to_string());
        definition.collation = column.collation.as_ref().map(ToString::to_string);
        for option in &column.options {
            match &option.option {
                AstColumnOption::CharacterSet(charset) => {
                    definition.character_set = Some(charset.to_string());
                }
                option => definition.options.extend(column_option(option)),
            }
        }
        definition
    }

    /// `REFERENCES` on a column is a one-column foreign key
    fn inline_foreign_key(&self, column: &ast::ColumnDef) -> Option<TableConstraint> {
        column.options.iter().find_map(|option| match &option.option {
            AstColumnOption::ForeignKey { foreign_table, .. } => {
                let references = self.object_name(foreign_table).ok()?;
                Some(TableConstraint::new(
                    option.name.as_ref().map(|name| self.ident(name)),
                    ConstraintKind::ForeignKey {
                        columns: vec![self.ident(&column.name)],
                        references,
                    },
                ))
            }
            _ => None,
        })
    }

    fn keys(&self, columns: &[Ident]) -> Vec<IndexKey> {
        columns
            .iter()
            .map(|column| IndexKey::Column(self.ident(column)))
            .collect()
    }

    fn key_expression(&self, expr: &Expr) -> IndexKey {
        match expr {
            Expr::Identifier(ident) => IndexKey::Column(self.ident(ident)),
            Expr::Nested(inner) => self.key_expression(inner),
            expr => IndexKey::Expression(expr.to_string()),
        }
    }

    fn constraint(&self, constraint: &AstConstraint) -> TableConstraint {
        let optional = |name: &Option<Ident>| name.as_ref().map(|name| self.ident(name));
        match constraint {
            AstConstraint::PrimaryKey {
                name,
                index_type,
                columns,
                ..
            } => TableConstraint::new(
                optional(name),
                ConstraintKind::PrimaryKey {
                    keys: self.keys(columns),
                    index_type: index_type.as_ref().map(ToString::to_string),
                },
            ),
            AstConstraint::Unique {
                name,
                index_name,
                index_type,
                columns,
                ..
            } => TableConstraint::new(
                optional(name),
                ConstraintKind::Unique {
                    index_name: optional(index_name),
                    keys: self.keys(columns),
                    index_type: index_type.as_ref().map(ToString::to_string),
                },
            ),
            AstConstraint::Index {
                name,
                index_type,
                columns,
                ..
            } => TableConstraint::new(
                optional(name),
                ConstraintKind::Index {
                    keys: self.keys(columns),
                    index_type: index_type.as_ref().map(ToString::to_string),
                },
            ),
            AstConstraint::FulltextOrSpatial {
                fulltext,
                opt_index_name,
                columns,
                ..
            } => {
                let keys = self.keys(columns);
                let kind = if *fulltext {
                    ConstraintKind::Fulltext { keys }
                } else {
                    ConstraintKind::Spatial { keys }
                };
                TableConstraint::new(optional(opt_index_name), kind)
            }
            AstConstraint::ForeignKey {
                name,
                columns,
                foreign_table,
                ..
            } => TableConstraint::new(
                optional(name),
                ConstraintKind::ForeignKey {
                    columns: self.idents(columns),
                    references: self
                        .object_name(foreign_table)
                        .unwrap_or_else(|_| QualifiedName::new(foreign_table.to_string())),
                },
            ),
            AstConstraint::Check { name, .. } => {
                TableConstraint::new(optional(name), ConstraintKind::Check)
            }
        }
    }

    fn placement(&self, position: &Option<MySQLColumnPosition>) -> Option<ColumnPlacement> {
        position.as_ref().map(|position| match position {
            MySQLColumnPosition::First => ColumnPlacement::First,
            MySQLColumnPosition::After(column) => ColumnPlacement::After(self.ident(column)),
        })
    }

    /// Column definition rebuilt from MODIFY / CHANGE parts
    fn changed_column(
        &self,
        name: &Ident,
        data_type: &ast::DataType,
        options: &[AstColumnOption],
    ) -> ColumnDefinition {
        let mut definition = ColumnDefinition::new(self.ident(name), data_type.to_string());
        for option in options {
            match option {
                AstColumnOption::CharacterSet(charset) => {
                    definition.character_set = Some(charset.to_string());
                }
                option => definition.options.extend(column_option(option)),
            }
        }
        definition
    }

    fn alter_operations(&self, operations: &[AstAlterTable]) -> Result<Vec<AlterTableOperation>> {
        let mut lowered = Vec::with_capacity(operations.len());
        for operation in operations {
            let operation = match operation {
                AstAlterTable::AddColumn {
                    if_not_exists,
                    column_def,
                    column_position,
                    ..
                } => AlterTableOperation::AddColumn {
                    column: self.column(column_def),
                    if_not_exists: *if_not_exists,
                    placement: self.placement(column_position),
                },
                AstAlterTable::AddConstraint(constraint) => {
                    AlterTableOperation::AddConstraint(self.constraint(constraint))
                }
                AstAlterTable::DropColumn {
                    column_name,
                    if_exists,
                    ..
                } => AlterTableOperation::DropColumn {
                    name: self.ident(column_name),
                    if_exists: *if_exists,
                },
                AstAlterTable::DropConstraint {
                    if_exists, name, ..
                } => AlterTableOperation::DropConstraint {
                    name: self.ident(name),
                    if_exists: *if_exists,
                },
                AstAlterTable::DropPrimaryKey => AlterTableOperation::DropPrimaryKey,
                AstAlterTable::RenameColumn {
                    old_column_name,
                    new_column_name,
                    ..
                } => AlterTableOperation::RenameColumn {
                    old_name: self.ident(old_column_name),
                    new_name: self.ident(new_column_name),
                },
                AstAlterTable::RenameTable { table_name, .. } => {
                    AlterTableOperation::RenameTo(self.object_name(table_name)?)
                }
                AstAlterTable::ChangeColumn {
                    old_name,
                    new_name,
                    data_type,
                    options,
                    column_position,
                    ..
                } => AlterTableOperation::ChangeColumn {
                    old_name: self.ident(old_name),
                    column: self.changed_column(new_name, data_type, options),
                    placement: self.placement(column_position),
                },
                AstAlterTable::ModifyColumn {
                    col_name,
                    data_type,
                    options,
                    column_position,
                    ..
                } => AlterTableOperation::ChangeColumn {
                    old_name: self.ident(col_name),
                    column: self.changed_column(col_name, data_type, options),
                    placement: self.placement(column_position),
                },
                AstAlterTable::RenameConstraint {
                    old_name, new_name, ..
                } => {
                    AlterTableOperation::RenameConstraint {
                        old_name: self.ident(old_name),
                        new_name: self.ident(new_name),
                    }
                }
                AstAlterTable::AlterColumn {
                    column_name, op, ..
                } => {
                    let Some(operation) = alter_column_operation(op) else {
                        continue;
                    };
                    AlterTableOperation::AlterColumn {
                        name: self.ident(column_name),
                        operation,
                    }
                }
                _ => continue,
            };
            lowered.push(operation);
        }
        Ok(lowered)
    }

    fn create_index(&self, create: &ast::CreateIndex) -> Result<CreateIndex> {
        Ok(CreateIndex {
            name: create.name.as_ref().map(|name| self.simple_name(name)),
            table: self.object_name(&create.table_name)?,
            if_not_exists: create.if_not_exists,
            kind: if create.unique {
                IndexKind::Unique
            } else {
                IndexKind::Normal
            },
            method: create.using.as_ref().map(ToString::to_string),
            keys: create
                .columns
                .iter()
                .map(|column| self.key_expression(&column.expr))
                .collect(),
            visible: true,
        })
    }

    fn drop(&self, object_type: &ObjectType, if_exists: bool, names: &[ObjectName]) -> Result<StatementNode> {
        let qualified = || {
            names
                .iter()
                .map(|name| self.object_name(name))
                .collect::<Result<Vec<_>>>()
        };
        let node = match object_type {
            ObjectType::Table => StatementNode::DropTable(DropTable {
                names: qualified()?,
                if_exists,
            }),
            ObjectType::View => StatementNode::DropView(DropView {
                names: qualified()?,
                if_exists,
            }),
            ObjectType::Index => StatementNode::DropIndex(DropIndex {
                names: qualified()?,
                table: None,
                if_exists,
            }),
            ObjectType::Schema if self.dialect.identifier_scope() == IdentifierScope::Schema => {
                StatementNode::DropSchema(DropSchema {
                    names: names.iter().map(|name| self.simple_name(name)).collect(),
                    if_exists,
                })
            }
            ObjectType::Schema | ObjectType::Database => {
                match names.first() {
                    Some(name) => StatementNode::DropDatabase(DropDatabase {
                        name: self.simple_name(name),
                        if_exists,
                    }),
                    None => StatementNode::Other,
                }
            }
            _ => StatementNode::Other,
        };
        Ok(node)
    }
}

fn column_option(option: &AstColumnOption) -> Option<ColumnOption> {
    match option {
        AstColumnOption::Null => Some(ColumnOption::Null),
        AstColumnOption::NotNull => Some(ColumnOption::NotNull),
        AstColumnOption::Default(expr) => Some(ColumnOption::Default(expr.to_string())),
        AstColumnOption::Unique { is_primary: true, .. } => Some(ColumnOption::PrimaryKey),
        AstColumnOption::Unique { .. } => Some(ColumnOption::Unique),
        AstColumnOption::Comment(comment) => Some(ColumnOption::Comment(comment.clone())),
        AstColumnOption::DialectSpecific(tokens)
            if tokens
                .iter()
                .any(|token| token.to_string().eq_ignore_ascii_case("AUTO_INCREMENT")) =>
        {
            Some(ColumnOption::AutoIncrement)
        }
        AstColumnOption::OnUpdate(expr) => Some(ColumnOption::OnUpdate(expr.to_string())),
        AstColumnOption::Check(_) => Some(ColumnOption::Check),
        AstColumnOption::ForeignKey { .. } => Some(ColumnOption::ForeignKey),
        _ => None,
    }
}

fn alter_column_operation(op: &AstAlterColumn) -> Option<AlterColumnOperation> {
    match op {
        AstAlterColumn::SetNotNull => Some(AlterColumnOperation::SetNotNull),
        AstAlterColumn::DropNotNull => Some(AlterColumnOperation::DropNotNull),
        AstAlterColumn::SetDefault { value } => {
            Some(AlterColumnOperation::SetDefault(value.to_string()))
        }
        AstAlterColumn::DropDefault => Some(AlterColumnOperation::DropDefault),
        AstAlterColumn::SetDataType { data_type, .. } => Some(AlterColumnOperation::SetDataType {
            data_type: data_type.to_string(),
            collation: None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlparser::parser::Parser;

    fn lower(sql: &str, dialect: SqlDialect) -> StatementNode {
        let statements = Parser::parse_sql(dialect.parser_dialect().as_ref(), sql).unwrap();
        lower_statement(&statements[0], dialect).unwrap()
    }

    #[test]
    fn test_create_table_columns_and_constraints() {
        let node = lower(
            "CREATE TABLE Orders (Id int PRIMARY KEY, \"Note\" text NOT NULL, UNIQUE (note))",
            SqlDialect::PostgreSQL,
        );
        let StatementNode::CreateTable(create) = node else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(create.name, QualifiedName::new("orders"));
        let names: Vec<&str> = create.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "Note"]);
        assert_eq!(create.columns[0].options, vec![ColumnOption::PrimaryKey]);
        assert_eq!(create.columns[1].options, vec![ColumnOption::NotNull]);
        assert_eq!(create.constraints.len(), 1);
        assert!(matches!(
            create.constraints[0].kind,
            ConstraintKind::Unique { .. }
        ));
    }

    #[test]
    fn test_mysql_two_part_name_is_database() {
        let node = lower("DROP TABLE shop.orders", SqlDialect::MySQL);
        assert_eq!(
            node,
            StatementNode::DropTable(DropTable {
                names: vec![QualifiedName::with_database("shop", "orders")],
                if_exists: false,
            })
        );
    }

    #[test]
    fn test_postgres_two_part_name_is_schema() {
        let node = lower("DROP VIEW IF EXISTS sales.v", SqlDialect::PostgreSQL);
        assert_eq!(
            node,
            StatementNode::DropView(DropView {
                names: vec![QualifiedName::with_schema("sales", "v")],
                if_exists: true,
            })
        );
    }

    #[test]
    fn test_add_column_with_placement() {
        let node = lower("ALTER TABLE t ADD COLUMN c int AFTER b", SqlDialect::MySQL);
        let StatementNode::AlterTable(alter) = node else {
            panic!("expected ALTER TABLE");
        };
        match &alter.operations[0] {
            AlterTableOperation::AddColumn { column, placement, .. } => {
                assert_eq!(column.name, "c");
                assert_eq!(placement, &Some(ColumnPlacement::After("b".to_string())));
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_create_index_keys() {
        let node = lower("CREATE UNIQUE INDEX idx ON t (a, lower(b))", SqlDialect::PostgreSQL);
        let StatementNode::CreateIndex(create) = node else {
            panic!("expected CREATE INDEX");
        };
        assert_eq!(create.name.as_deref(), Some("idx"));
        assert_eq!(create.kind, IndexKind::Unique);
        assert_eq!(create.keys[0], IndexKey::column("a"));
        assert!(matches!(create.keys[1], IndexKey::Expression(_)));
    }

    #[test]
    fn test_queries_do_not_change_catalog() {
        assert_eq!(lower("SELECT 1", SqlDialect::PostgreSQL), StatementNode::Select);
        assert_eq!(
            lower("UPDATE db.t SET a = 1", SqlDialect::MySQL),
            StatementNode::Update(QualifiedName::with_database("db", "t"))
        );
    }

    #[test]
    fn test_mysql_auto_increment_and_on_update() {
        let node = lower(
            "CREATE TABLE t (id int AUTO_INCREMENT, ts timestamp ON UPDATE CURRENT_TIMESTAMP)",
            SqlDialect::MySQL,
        );
        let StatementNode::CreateTable(create) = node else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(create.columns[0].options, vec![ColumnOption::AutoIncrement]);
        assert!(matches!(
            create.columns[1].options.as_slice(),
            [ColumnOption::OnUpdate(_)]
        ));
    }

    #[test]
    fn test_drop_database() {
        assert_eq!(
            lower("DROP DATABASE IF EXISTS shop", SqlDialect::MySQL),
            StatementNode::DropDatabase(DropDatabase {
                name: "shop".to_string(),
                if_exists: true,
            })
        );
    }

    #[test]
    fn test_create_trigger_target_table() {
        let node = lower(
            "CREATE TRIGGER audit_orders AFTER INSERT ON sales.orders FOR EACH ROW EXECUTE FUNCTION audit()",
            SqlDialect::PostgreSQL,
        );
        assert_eq!(
            node,
            StatementNode::CreateTrigger(CreateTrigger {
                name: "audit_orders".to_string(),
                table: QualifiedName::with_schema("sales", "orders"),
            })
        );
    }
}
