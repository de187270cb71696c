// Integration tests for statement splitting
use pretty_assertions::assert_eq;
use schemawalk_core::dialect::SqlDialect;
use schemawalk_core::tokenizer::{split_sql, split_stream, SplitError, SqlStatement};

const DIALECTS: [SqlDialect; 4] = [
    SqlDialect::MySQL,
    SqlDialect::TiDB,
    SqlDialect::PostgreSQL,
    SqlDialect::Oracle,
];

fn end_lines(statements: &[SqlStatement]) -> Vec<usize> {
    statements.iter().map(SqlStatement::end_line).collect()
}

#[test]
fn test_statements_concatenate_to_input() {
    let scripts = [
        "SELECT 1;\nSELECT 2;\n",
        "  -- heading\nCREATE TABLE t (a int);\n\n/* note; */\nINSERT INTO t VALUES ('x;y');",
        "SELECT 1;\n-- trailing note\n",
        "SELECT 1",
    ];
    for dialect in DIALECTS {
        for sql in scripts {
            let statements = split_sql(sql, dialect).unwrap();
            let joined: String = statements.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(joined, sql, "round trip failed for {dialect:?}");
        }
    }
}

#[test]
fn test_mysql_delimiter_script_round_trips() {
    let sql = "DELIMITER $$\nCREATE PROCEDURE p() BEGIN SELECT 1; END$$\nDELIMITER ;\nSELECT 2;\n";
    let statements = split_sql(sql, SqlDialect::MySQL).unwrap();
    let joined: String = statements.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(joined, sql);
    assert_eq!(end_lines(&statements), vec![1, 2, 3, 4]);
}

#[test]
fn test_bad_statement_keeps_its_own_line() {
    let sql = "SELECT 1;\nSELECT * FRAM t1;\nSELECT 2;";
    let statements = split_sql(sql, SqlDialect::MySQL).unwrap();
    assert_eq!(end_lines(&statements), vec![1, 2, 3]);
    assert_eq!(statements[1].text, "\nSELECT * FRAM t1;");
}

#[test]
fn test_multiline_statement_lines() {
    let sql = "CREATE TABLE t (\n  a int,\n  b int\n);\n\nSELECT 1;";
    let statements = split_sql(sql, SqlDialect::PostgreSQL).unwrap();
    assert_eq!(statements[0].start_line(), 1);
    assert_eq!(statements[0].end_line(), 4);
    assert_eq!(statements[1].start_line(), 4);
    assert_eq!(statements[1].end_line(), 6);
}

#[test]
fn test_unterminated_string_reports_line() {
    let err = split_sql("SELECT 1;\nSELECT 'abc;", SqlDialect::MySQL).unwrap_err();
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_stream_and_batch_agree() {
    let scripts = [
        "SELECT 1;\n\nCREATE TABLE t (\n  note text -- why; not\n);\nSELECT $tag$ ; $tag$;",
        "SELECT 1;\nSELECT 2;\n\n  \n",
    ];
    for sql in scripts {
        for dialect in [SqlDialect::PostgreSQL, SqlDialect::MySQL] {
            let batch = split_sql(sql, dialect).unwrap();
            let mut streamed = Vec::new();
            split_stream(sql.as_bytes(), dialect, |statement| {
                streamed.push(statement.clone());
                Ok::<(), SplitError>(())
            })
            .unwrap();
            assert_eq!(end_lines(&streamed), end_lines(&batch));
            let texts: Vec<&str> = streamed.iter().map(|s| s.text.as_str()).collect();
            let expected: Vec<&str> = batch.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(texts, expected);
            assert_eq!(texts.concat(), sql);
        }
    }
}
