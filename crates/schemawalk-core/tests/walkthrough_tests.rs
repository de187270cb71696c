// Integration tests for the catalog walk-through
use pretty_assertions::assert_eq;
use schemawalk_core::catalog::{DatabaseSnapshot, DatabaseState, Finder, WalkThroughConfig};
use schemawalk_core::dialect::SqlDialect;
use schemawalk_core::error::{LineSpan, WalkThroughErrorKind};
use schemawalk_core::walkthrough::{
    walk_through_sql, AlterTable, AlterTableOperation, ConstraintKind, CreateExtension,
    CreateIndex, CreateTrigger, DropDatabase, DropExtension, DropIndex, IndexKind,
    StatementNode, TableConstraint,
};
use schemawalk_core::QualifiedName;

fn empty_state(dialect: SqlDialect) -> DatabaseState {
    DatabaseState::new(None, &WalkThroughConfig::new(dialect)).unwrap()
}

fn named_state(name: &str, config: WalkThroughConfig) -> DatabaseState {
    let snapshot = DatabaseSnapshot {
        name: name.to_string(),
        ..Default::default()
    };
    DatabaseState::new(Some(&snapshot), &config).unwrap()
}

fn column_names(state: &DatabaseState, schema: &str, table: &str) -> Vec<String> {
    state.schemas[schema].tables[table]
        .ordered_columns()
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

#[test]
fn test_syntax_error_reports_its_line() {
    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(&mut state, "SELECT 1;\nSELECT * FRAM t1;\nSELECT 2;");

    assert_eq!(outcome.applied, 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::ParseError);
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_drop_unknown_column_with_integrity() {
    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(&mut state, "CREATE TABLE t(a int);\nALTER TABLE t DROP COLUMN c;");

    assert_eq!(outcome.applied, 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::ColumnNotExists);
    assert_eq!(err.message, "Column `c` does not exist in table `t`");
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_drop_unknown_column_without_integrity() {
    let config = WalkThroughConfig::new(SqlDialect::MySQL).with_check_integrity(false);
    let mut state = DatabaseState::new(None, &config).unwrap();
    let outcome = walk_through_sql(&mut state, "CREATE TABLE t(a int);\nALTER TABLE t DROP COLUMN c;");

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(column_names(&state, "", "t"), vec!["a"]);
}

#[test]
fn test_unknown_table_is_fabricated_without_integrity() {
    let config = WalkThroughConfig::new(SqlDialect::PostgreSQL).with_check_integrity(false);
    let mut state = DatabaseState::new(None, &config).unwrap();
    let outcome = walk_through_sql(&mut state, "ALTER TABLE missing ADD COLUMN a int;");

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    let table = &state.schemas["public"].tables["missing"];
    assert!(!table.complete);
    assert_eq!(table.columns["a"].position, 1);
}

#[test]
fn test_key_limit_reports_one_error() {
    let config = WalkThroughConfig::new(SqlDialect::MySQL).with_max_index_keys(1);
    let mut state = DatabaseState::new(None, &config).unwrap();
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t(a int, name char(225), CONSTRAINT t_ix PRIMARY KEY (a, name))",
    );

    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::IndexKeyNumberExceedsLimit);
    assert_eq!(outcome.applied, 0);
}

#[test]
fn test_fail_stop_keeps_earlier_statements() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let sql = "CREATE TABLE t1 (a int);\nCREATE TABLE t1 (b int);\nCREATE TABLE t2 (c int);";
    let outcome = walk_through_sql(&mut state, sql);

    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::TableExists);
    assert_eq!(err.line, Some(2));

    let finder = Finder::new(&state);
    assert!(finder.find_table(None, "t1").is_some());
    assert!(finder.find_table(None, "t2").is_none());
    assert_eq!(column_names(&state, "public", "t1"), vec!["a"]);
}

#[test]
fn test_primary_key_columns_become_not_null() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int NULL, b int, c int, PRIMARY KEY (a, b));",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let table = &state.schemas["public"].tables["t"];
    assert!(!table.columns["a"].nullable);
    assert!(!table.columns["b"].nullable);
    assert!(table.columns["c"].nullable);
    let pk = table.primary_key().unwrap();
    assert_eq!(pk.name, "t_pkey");
    assert_eq!(pk.expressions, vec!["a", "b"]);
}

#[test]
fn test_primary_key_using_index() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\nCREATE UNIQUE INDEX t_a_idx ON t (a);",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let promote = StatementNode::AlterTable(AlterTable {
        name: QualifiedName::new("t"),
        if_exists: false,
        operations: vec![AlterTableOperation::AddConstraint(TableConstraint::new(
            Some("t_pk".to_string()),
            ConstraintKind::PrimaryKeyUsingIndex {
                index: "t_a_idx".to_string(),
            },
        ))],
    });
    state.apply(&promote, LineSpan::line(3)).unwrap();

    let schema = &state.schemas["public"];
    let table = &schema.tables["t"];
    assert!(!table.columns["a"].nullable);
    assert_eq!(table.primary_key().map(|pk| pk.name.as_str()), Some("t_pk"));
    assert!(!schema.identifiers.contains("t_a_idx"));
    assert!(schema.identifiers.contains("t_pk"));
}

#[test]
fn test_index_names_are_unique_per_schema() {
    let sql = "CREATE TABLE t1 (a int);\nCREATE TABLE t2 (a int);\nCREATE INDEX idx_a ON t1 (a);\nCREATE INDEX idx_a ON t2 (a);";

    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(&mut state, sql).into_result().unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::RelationExists);
    assert_eq!(err.line, Some(4));
    assert!(!state.schemas["public"].tables["t2"].indexes.contains_key("idx_a"));

    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(&mut state, sql);
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
}

#[test]
fn test_table_name_clashes_with_index_name() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\nCREATE INDEX t_a ON t (a);\nCREATE TABLE t_a (b int);",
    )
    .into_result()
    .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::RelationExists);
    assert_eq!(err.line, Some(3));
}

#[test]
fn test_generated_index_names_mysql() {
    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int, b int, INDEX (a), INDEX (a, b), UNIQUE (b))",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let names: Vec<&String> = state.schemas[""].tables["t"].indexes.keys().collect();
    assert_eq!(names, vec!["a", "a_2", "b"]);
}

#[test]
fn test_generated_index_names_postgres() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int, b int UNIQUE);\nCREATE INDEX ON t (a);\nCREATE INDEX ON t (a);",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let names: Vec<&String> = state.schemas["public"].tables["t"].indexes.keys().collect();
    assert_eq!(names, vec!["t_b_key", "t_a_idx", "t_a_idx1"]);
}

#[test]
fn test_column_positions_stay_contiguous() {
    let mut state = empty_state(SqlDialect::MySQL);
    let sql = "CREATE TABLE t (a int, b int);\nALTER TABLE t ADD COLUMN c int FIRST;\nALTER TABLE t ADD COLUMN d int AFTER a;\nALTER TABLE t DROP COLUMN b;";
    let outcome = walk_through_sql(&mut state, sql);
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let table = &state.schemas[""].tables["t"];
    assert_eq!(column_names(&state, "", "t"), vec!["c", "a", "d"]);
    let positions: Vec<usize> = table.ordered_columns().iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[test]
fn test_drop_column_shrinks_mysql_index() {
    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int, b int, INDEX idx (a, b), INDEX only_a (a));\nALTER TABLE t DROP COLUMN a;",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let table = &state.schemas[""].tables["t"];
    assert_eq!(table.indexes["idx"].expressions, vec!["b"]);
    assert!(!table.indexes.contains_key("only_a"));
}

#[test]
fn test_drop_column_drops_postgres_index() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int, b int);\nCREATE INDEX idx ON t (a, b);\nALTER TABLE t DROP COLUMN a;",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let schema = &state.schemas["public"];
    assert!(schema.tables["t"].indexes.is_empty());
    assert!(!schema.identifiers.contains("idx"));
}

#[test]
fn test_rename_column_updates_primary_key() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int PRIMARY KEY);\nALTER TABLE t RENAME COLUMN a TO b;",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let table = &state.schemas["public"].tables["t"];
    assert_eq!(table.primary_key().unwrap().expressions, vec!["b"]);
    assert_eq!(table.columns["b"].position, 1);
}

#[test]
fn test_second_primary_key_is_rejected() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int PRIMARY KEY, b int);\nALTER TABLE t ADD PRIMARY KEY (b);",
    )
    .into_result()
    .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::PrimaryKeyExists);
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_spatial_index_requires_not_null() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(&mut state, "CREATE TABLE t (g geometry, SPATIAL INDEX (g));")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::SpatialIndexKeyNullable);

    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (g geometry NOT NULL, SPATIAL INDEX (g));",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
}

#[test]
fn test_rename_index_to_primary_is_rejected() {
    let mut state = empty_state(SqlDialect::MySQL);
    walk_through_sql(&mut state, "CREATE TABLE t (a int, INDEX idx (a));")
        .into_result()
        .unwrap();

    let rename = StatementNode::AlterTable(AlterTable {
        name: QualifiedName::new("t"),
        if_exists: false,
        operations: vec![AlterTableOperation::RenameIndex {
            old_name: "idx".to_string(),
            new_name: "primary".to_string(),
        }],
    });
    let err = state.apply(&rename, LineSpan::line(2)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::IncorrectIndexName);
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_insert_checks_column_list() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\nINSERT INTO t (a, b) VALUES (1, 2);",
    )
    .into_result()
    .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::ColumnNotExists);
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_other_database_is_rejected() {
    let mut state = named_state("shop", WalkThroughConfig::new(SqlDialect::MySQL));
    let err = walk_through_sql(&mut state, "CREATE TABLE crm.t (a int);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::AccessOtherDatabase);

    let outcome = walk_through_sql(&mut state, "CREATE TABLE shop.t (a int);");
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
}

#[test]
fn test_deleted_database_rejects_later_statements() {
    let mut state = named_state("shop", WalkThroughConfig::new(SqlDialect::MySQL));
    let drop = StatementNode::DropDatabase(DropDatabase {
        name: "shop".to_string(),
        if_exists: false,
    });
    state.apply(&drop, LineSpan::line(1)).unwrap();

    let err = walk_through_sql(&mut state, "\nCREATE TABLE t (a int);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::DatabaseIsDeleted);
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_unknown_schema_requires_create_schema() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(&mut state, "CREATE TABLE sales.t (a int);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::SchemaNotExists);

    let outcome = walk_through_sql(&mut state, "CREATE SCHEMA sales;\nCREATE TABLE sales.t (a int);");
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert!(Finder::new(&state).find_table(Some("sales"), "t").is_some());
}

#[test]
fn test_rename_table_moves_identifiers() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\nALTER TABLE t RENAME TO u;\nCREATE TABLE t (b int);",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let schema = &state.schemas["public"];
    assert_eq!(column_names(&state, "public", "u"), vec!["a"]);
    assert_eq!(column_names(&state, "public", "t"), vec!["b"]);
    assert!(schema.identifiers.contains("u"));
}

#[test]
fn test_views_share_relation_namespace() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\nCREATE VIEW t AS SELECT 1;",
    )
    .into_result()
    .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::RelationExists);

    let outcome = walk_through_sql(&mut state, "CREATE VIEW v AS SELECT a FROM t;\nDROP VIEW v;");
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert!(state.schemas["public"].views.is_empty());
}

#[test]
fn test_finder_lookups_do_not_mutate() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    walk_through_sql(
        &mut state,
        "CREATE TABLE t (id int PRIMARY KEY, note text);\nCREATE INDEX t_note ON t (note);",
    )
    .into_result()
    .unwrap();

    let before = state.clone();
    let finder = Finder::new(&state);
    let first = finder.find_index(None, None, "t_note").map(|(t, i)| (t.name.clone(), i.name.clone()));
    let second = finder.find_index(None, None, "t_note").map(|(t, i)| (t.name.clone(), i.name.clone()));
    assert_eq!(first, second);
    assert_eq!(first, Some(("t".to_string(), "t_note".to_string())));
    assert_eq!(
        finder.find_primary_key(None, "t").map(|pk| pk.name.clone()),
        Some("t_pkey".to_string())
    );
    assert_eq!(finder.count_columns_with_type(None, "t", |ty| ty == "TEXT"), 1);
    assert_eq!(state, before);
}

#[test]
fn test_oracle_walk_through_is_unsupported() {
    let mut state = empty_state(SqlDialect::Oracle);
    let err = walk_through_sql(&mut state, "CREATE TABLE t (a int);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::Unsupported);
}

#[test]
fn test_snapshot_round_trip_after_walk() {
    let mut state = empty_state(SqlDialect::MySQL);
    walk_through_sql(
        &mut state,
        "CREATE TABLE b (x int);\nCREATE TABLE a (y int NOT NULL, z int, PRIMARY KEY (y));",
    )
    .into_result()
    .unwrap();

    let snapshot = state.to_snapshot();
    let tables: Vec<&str> = snapshot.schemas[0]
        .tables
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(tables, vec!["a", "b"]);

    let json = snapshot.to_json().unwrap();
    let reloaded = DatabaseState::new(
        Some(&DatabaseSnapshot::from_json(&json).unwrap()),
        &WalkThroughConfig::new(SqlDialect::MySQL),
    )
    .unwrap();
    let table = &reloaded.schemas[""].tables["a"];
    assert!(table.indexes["PRIMARY"].primary);
    assert!(!table.columns["y"].nullable);
}

fn alter(table: &str, operation: AlterTableOperation) -> StatementNode {
    StatementNode::AlterTable(AlterTable {
        name: QualifiedName::new(table),
        if_exists: false,
        operations: vec![operation],
    })
}

#[test]
fn test_mysql_not_null_column_rejects_default_null() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(&mut state, "CREATE TABLE t1 (a int NOT NULL DEFAULT NULL);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::SetNullDefaultForNotNullColumn);
    assert_eq!(err.message, "Invalid default value for column `a`");
    assert_eq!(err.line, Some(1));
}

#[test]
fn test_mysql_blob_and_text_columns_reject_default() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(&mut state, "CREATE TABLE t2 (b text DEFAULT 'x');")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::InvalidColumnDefault);

    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int NOT NULL DEFAULT 0);\nALTER TABLE t ADD COLUMN j json DEFAULT '{}';",
    );
    assert_eq!(outcome.applied, 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::InvalidColumnDefault);
    assert_eq!(err.line, Some(2));
    assert_eq!(column_names(&state, "", "t"), vec!["a"]);
}

#[test]
fn test_mysql_on_update_requires_datetime_or_timestamp() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(&mut state, "CREATE TABLE t4 (a int ON UPDATE CURRENT_TIMESTAMP);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::OnUpdateColumnNotDatetimeOrTimestamp);

    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t5 (id int AUTO_INCREMENT PRIMARY KEY, ts timestamp DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP);",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
}

#[test]
fn test_mysql_only_one_auto_increment_column() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(
        &mut state,
        "CREATE TABLE t3 (\n  a int AUTO_INCREMENT,\n  b int AUTO_INCREMENT\n);",
    )
    .into_result()
    .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::AutoIncrementExists);
    assert_eq!(err.message, "There can be only one auto column for table `t3`");
    assert_eq!(err.line, Some(3));
}

#[test]
fn test_column_default_rules_are_mysql_only() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int NOT NULL DEFAULT NULL, b text DEFAULT 'x');",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
}

#[test]
fn test_create_table_as_select() {
    let sql = "CREATE TABLE t (a int);\nCREATE TABLE t2 AS SELECT * FROM t;";

    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(&mut state, sql);
    assert_eq!(outcome.applied, 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::StatementCreateTableAs);
    assert_eq!(err.line, Some(2));
    assert!(!state.schemas[""].tables.contains_key("t2"));

    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(&mut state, sql);
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert!(!state.schemas["public"].tables["t2"].complete);
}

#[test]
fn test_create_trigger_requires_table() {
    let trigger = "CREATE TRIGGER audit_t AFTER INSERT ON t FOR EACH ROW EXECUTE FUNCTION audit();";
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(&mut state, trigger)
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::TableNotExists);

    let outcome = walk_through_sql(&mut state, &format!("CREATE TABLE t (a int);\n{}", trigger));
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);

    let mut state = empty_state(SqlDialect::MySQL);
    let create = StatementNode::CreateTrigger(CreateTrigger {
        name: "audit_t".to_string(),
        table: QualifiedName::new("t"),
    });
    let err = state.apply(&create, LineSpan::line(1)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::TableNotExists);
}

#[test]
fn test_rename_constraint_requires_constraint() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int, b int, CONSTRAINT t_b_key UNIQUE (b));\nCREATE INDEX i ON t (a);\nALTER TABLE t RENAME CONSTRAINT i TO j;",
    );
    assert_eq!(outcome.applied, 2);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::ConstraintNotExists);
    assert_eq!(err.line, Some(3));
    assert!(state.schemas["public"].tables["t"].indexes.contains_key("i"));

    let outcome = walk_through_sql(
        &mut state,
        "ALTER TABLE t RENAME CONSTRAINT t_b_key TO t_b_uniq;\nALTER TABLE t RENAME CONSTRAINT fk_unknown TO fk_other;\nALTER TABLE t DROP CONSTRAINT chk_unknown;",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    let schema = &state.schemas["public"];
    assert!(schema.tables["t"].indexes["t_b_uniq"].is_constraint);
    assert!(schema.identifiers.contains("t_b_uniq"));
    assert!(!schema.identifiers.contains("t_b_key"));
}

#[test]
fn test_failed_create_table_leaves_no_trace() {
    let mut state = empty_state(SqlDialect::MySQL);
    let err = walk_through_sql(&mut state, "CREATE TABLE t (a int, a int);")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::ColumnExists);
    assert!(!state.schemas[""].tables.contains_key("t"));

    let mut state = empty_state(SqlDialect::PostgreSQL);
    let err = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int PRIMARY KEY, b int, UNIQUE (c));",
    )
    .into_result()
    .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::ColumnNotExists);
    let schema = &state.schemas["public"];
    assert!(schema.tables.is_empty());
    assert!(schema.identifiers.is_empty());

    let outcome = walk_through_sql(&mut state, "CREATE TABLE t (a int PRIMARY KEY);");
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert!(state.schemas["public"].identifiers.contains("t_pkey"));
}

#[test]
fn test_if_exists_clauses_suppress_errors() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\n\
         CREATE TABLE IF NOT EXISTS t (b int);\n\
         CREATE INDEX idx ON t (a);\n\
         CREATE INDEX IF NOT EXISTS idx ON t (a);\n\
         DROP TABLE IF EXISTS missing;\n\
         DROP INDEX IF EXISTS missing_idx;",
    );
    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.applied, 6);
    assert_eq!(column_names(&state, "public", "t"), vec!["a"]);
    assert_eq!(state.schemas["public"].tables["t"].indexes.len(), 1);

    let err = walk_through_sql(&mut state, "DROP TABLE missing;")
        .into_result()
        .unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::TableNotExists);
}

#[test]
fn test_index_without_keys_is_rejected() {
    let mut state = empty_state(SqlDialect::MySQL);
    walk_through_sql(&mut state, "CREATE TABLE t (a int);")
        .into_result()
        .unwrap();

    let create = StatementNode::CreateIndex(CreateIndex {
        name: Some("i".to_string()),
        table: QualifiedName::new("t"),
        if_not_exists: false,
        kind: IndexKind::Normal,
        method: None,
        keys: Vec::new(),
        visible: true,
    });
    let err = state.apply(&create, LineSpan::line(2)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::IndexEmptyKeys);
    assert!(state.schemas[""].tables["t"].indexes.is_empty());
}

#[test]
fn test_index_with_duplicate_keys_is_rejected() {
    let mut state = empty_state(SqlDialect::MySQL);
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int);\nCREATE INDEX i ON t (a, a);",
    );
    assert_eq!(outcome.applied, 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::IndexDuplicateKeys);
    assert_eq!(err.line, Some(2));
    assert!(state.schemas[""].tables["t"].indexes.is_empty());
}

#[test]
fn test_set_schema_moves_table_and_identifiers() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    walk_through_sql(
        &mut state,
        "CREATE SCHEMA sales;\nCREATE TABLE t (a int PRIMARY KEY);",
    )
    .into_result()
    .unwrap();

    let missing = alter("t", AlterTableOperation::SetSchema("archive".to_string()));
    let err = state.apply(&missing, LineSpan::line(3)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::SchemaNotExists);

    let move_to_sales = alter("t", AlterTableOperation::SetSchema("sales".to_string()));
    state.apply(&move_to_sales, LineSpan::line(4)).unwrap();

    let public = &state.schemas["public"];
    assert!(!public.tables.contains_key("t"));
    assert!(!public.identifiers.contains("t"));
    assert!(!public.identifiers.contains("t_pkey"));
    let sales = &state.schemas["sales"];
    assert_eq!(sales.tables["t"].primary_key().map(|pk| pk.name.as_str()), Some("t_pkey"));
    assert!(sales.identifiers.contains("t"));
    assert!(sales.identifiers.contains("t_pkey"));
}

#[test]
fn test_create_and_drop_extension() {
    let mut state = empty_state(SqlDialect::PostgreSQL);
    let create = StatementNode::CreateExtension(CreateExtension {
        name: "pgcrypto".to_string(),
        schema: None,
        version: Some("1.3".to_string()),
        if_not_exists: false,
    });
    state.apply(&create, LineSpan::line(1)).unwrap();
    assert!(state.schemas["public"].extensions.contains_key("pgcrypto"));

    let err = state.apply(&create, LineSpan::line(2)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::ExtensionExists);
    assert_eq!(err.line, Some(2));

    let drop_extension = |if_exists| {
        StatementNode::DropExtension(DropExtension {
            names: vec!["pgcrypto".to_string()],
            if_exists,
        })
    };
    state.apply(&drop_extension(false), LineSpan::line(3)).unwrap();
    assert!(state.schemas["public"].extensions.is_empty());

    let err = state.apply(&drop_extension(false), LineSpan::line(4)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::ExtensionNotExists);
    state.apply(&drop_extension(true), LineSpan::line(5)).unwrap();
}

#[test]
fn test_index_statements_on_other_database_are_rejected() {
    let mut state = named_state("shop", WalkThroughConfig::new(SqlDialect::MySQL));
    let outcome = walk_through_sql(
        &mut state,
        "CREATE TABLE t (a int, INDEX i (a));\nCREATE INDEX j ON crm.t (a);",
    );
    assert_eq!(outcome.applied, 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind, WalkThroughErrorKind::AccessOtherDatabase);
    assert_eq!(err.line, Some(2));

    let drop = StatementNode::DropIndex(DropIndex {
        names: vec![QualifiedName::new("i")],
        table: Some(QualifiedName::with_database("crm", "t")),
        if_exists: false,
    });
    let err = state.apply(&drop, LineSpan::line(3)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::AccessOtherDatabase);
    assert!(state.schemas[""].tables["t"].indexes.contains_key("i"));
}

#[test]
fn test_mysql_drop_index_primary_drops_primary_key() {
    let mut state = empty_state(SqlDialect::MySQL);
    walk_through_sql(&mut state, "CREATE TABLE t (a int PRIMARY KEY, b int, INDEX b (b));")
        .into_result()
        .unwrap();

    let drop = StatementNode::DropIndex(DropIndex {
        names: vec![QualifiedName::new("primary")],
        table: Some(QualifiedName::new("t")),
        if_exists: false,
    });
    state.apply(&drop, LineSpan::line(2)).unwrap();

    let table = &state.schemas[""].tables["t"];
    assert!(table.primary_key().is_none());
    assert!(table.indexes.contains_key("b"));

    let err = state.apply(&drop, LineSpan::line(3)).unwrap_err();
    assert_eq!(err.kind, WalkThroughErrorKind::IndexNotExists);
}
