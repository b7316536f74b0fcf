//! Query tests.
//!
//! Each query has three independent failure points: starting it, scanning a
//! row, and closing the cursor. The cases record which of them should fail.

use pretty_assertions::assert_eq;
use spanner_sql::db::{ColumnInfo, MockClient, QueryResult};
use spanner_sql::error::Code;
use spanner_sql::{Connection, SpannerError, Statement, Value};
use std::sync::Arc;

use super::emulator_connection;

type Row3 = (String, String, String);

struct QueryCase {
    name: &'static str,
    input: &'static str,
    want: Vec<Row3>,
    want_error_close: bool,
}

fn row(a: &str, b: &str, c: &str) -> Row3 {
    (a.to_string(), b.to_string(), c.to_string())
}

fn cases() -> Vec<QueryCase> {
    let all = || vec![row("a1", "b1", "c1"), row("a2", "b2", "c2"), row("a3", "b3", "c3")];
    vec![
        QueryCase {
            name: "empty query",
            input: "",
            want: vec![],
            want_error_close: true,
        },
        QueryCase {
            name: "syntax error",
            input: "SELECT SELECT * FROM TestQueryContext",
            want: vec![],
            want_error_close: true,
        },
        QueryCase {
            name: "return nothing",
            input: "SELECT * FROM TestQueryContext WHERE A = \"hihihi\"",
            want: vec![],
            want_error_close: false,
        },
        QueryCase {
            name: "select one tuple",
            input: "SELECT * FROM TestQueryContext WHERE A = \"a1\"",
            want: vec![row("a1", "b1", "c1")],
            want_error_close: false,
        },
        QueryCase {
            name: "select subset of tuples",
            input: "SELECT * FROM TestQueryContext WHERE A = \"a1\" OR A = \"a2\" ORDER BY A",
            want: vec![row("a1", "b1", "c1"), row("a2", "b2", "c2")],
            want_error_close: false,
        },
        QueryCase {
            name: "select subset of tuples with !=",
            input: "SELECT * FROM TestQueryContext WHERE A != \"a3\" ORDER BY A",
            want: vec![row("a1", "b1", "c1"), row("a2", "b2", "c2")],
            want_error_close: false,
        },
        QueryCase {
            name: "select entire table",
            input: "SELECT * FROM TestQueryContext ORDER BY A",
            want: all(),
            want_error_close: false,
        },
        QueryCase {
            name: "query non existent table",
            input: "SELECT * FROM NonExistent",
            want: vec![],
            want_error_close: true,
        },
    ]
}

const CREATE_TABLE: &str = "CREATE TABLE TestQueryContext (
    A STRING(1024),
    B STRING(1024),
    C STRING(1024)
) PRIMARY KEY (A)";

const INSERT_ROWS: &str = "INSERT INTO TestQueryContext (A, B, C)
    VALUES (\"a1\", \"b1\", \"c1\"), (\"a2\", \"b2\", \"c2\"), (\"a3\", \"b3\", \"c3\")";

fn string_columns(names: &[&str]) -> Vec<ColumnInfo> {
    names.iter().map(|n| ColumnInfo::new(*n, "STRING")).collect()
}

/// Rows written by `INSERT_ROWS`, in primary key order.
const TABLE: [[&str; 3]; 3] = [["a1", "b1", "c1"], ["a2", "b2", "c2"], ["a3", "b3", "c3"]];

/// A mock that answers each query by filtering `TABLE` the way its WHERE
/// clause would. Results never come from the cases' expectations.
fn scripted_mock() -> MockClient {
    let select = |keep: fn(&str) -> bool| {
        let rows = TABLE
            .iter()
            .filter(|r| keep(r[0]))
            .map(|r| r.iter().map(|v| Value::from(*v)).collect())
            .collect();
        QueryResult::with_data(string_columns(&["A", "B", "C"]), rows)
    };

    MockClient::new()
        .with_update(INSERT_ROWS, Ok(3))
        .with_query_error(
            "SELECT SELECT * FROM TestQueryContext",
            SpannerError::database(
                Code::InvalidArgument,
                "Syntax error: Unexpected keyword SELECT [at 1:8]",
            ),
        )
        .with_query_error(
            "SELECT * FROM NonExistent",
            SpannerError::database(
                Code::InvalidArgument,
                "Table not found: NonExistent [at 1:15]",
            ),
        )
        .with_query(
            "SELECT * FROM TestQueryContext WHERE A = \"hihihi\"",
            select(|a| a == "hihihi"),
        )
        .with_query(
            "SELECT * FROM TestQueryContext WHERE A = \"a1\"",
            select(|a| a == "a1"),
        )
        .with_query(
            "SELECT * FROM TestQueryContext WHERE A = \"a1\" OR A = \"a2\" ORDER BY A",
            select(|a| a == "a1" || a == "a2"),
        )
        .with_query(
            "SELECT * FROM TestQueryContext WHERE A != \"a3\" ORDER BY A",
            select(|a| a != "a3"),
        )
        .with_query(
            "SELECT * FROM TestQueryContext ORDER BY A",
            select(|_| true),
        )
}

async fn run_cases(conn: &Connection) -> Vec<String> {
    let mut failures = Vec::new();

    for case in cases() {
        let mut rows = match conn.query(case.input, &[]).await {
            Ok(rows) => rows,
            Err(e) => {
                failures.push(format!("{}: unexpected query error: {e}", case.name));
                continue;
            }
        };

        let mut got = Vec::new();
        while rows.next().await {
            match rows.scan::<Row3>() {
                Ok(r) => got.push(r),
                Err(e) => failures.push(format!("{}: unexpected scan error: {e}", case.name)),
            }
        }

        match rows.close() {
            Err(e) if !case.want_error_close => {
                failures.push(format!("{}: unexpected close error: {e}", case.name))
            }
            Ok(()) if case.want_error_close => {
                failures.push(format!("{}: expected a close error", case.name))
            }
            _ => {}
        }

        if got != case.want {
            failures.push(format!("{}: want {:?}, got {:?}", case.name, case.want, got));
        }
    }

    failures
}

async fn setup(conn: &Connection) {
    conn.execute(CREATE_TABLE, &[]).await.unwrap();
    let counts = conn
        .batch_update(&[Statement::new(INSERT_ROWS)])
        .await
        .unwrap();
    assert_eq!(counts, vec![3]);
}

#[tokio::test]
async fn test_query_cases_with_mock() {
    let conn = Connection::with_client(Arc::new(scripted_mock()));
    setup(&conn).await;

    let failures = run_cases(&conn).await;
    assert!(failures.is_empty(), "failures:\n{}", failures.join("\n"));

    conn.execute("DROP TABLE TestQueryContext", &[]).await.unwrap();
}

#[tokio::test]
async fn test_query_cases_with_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };
    setup(&conn).await;

    let failures = run_cases(&conn).await;
    let dropped = conn.execute("DROP TABLE TestQueryContext", &[]).await;
    conn.close().await.unwrap();

    assert!(failures.is_empty(), "failures:\n{}", failures.join("\n"));
    dropped.unwrap();
}

#[tokio::test]
async fn test_query_params_with_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    conn.execute(
        "CREATE TABLE TestQueryParams (Id INT64, Name STRING(64)) PRIMARY KEY (Id)",
        &[],
    )
    .await
    .unwrap();

    let inserted = conn
        .execute(
            "INSERT INTO TestQueryParams (Id, Name) VALUES (@id, @name)",
            &[("id", Value::Int(7)), ("name", Value::from("seven"))],
        )
        .await
        .unwrap();
    assert_eq!(inserted.rows_affected, 1);

    let mut rows = conn
        .query(
            "SELECT Id, Name FROM TestQueryParams WHERE Id = @id",
            &[("id", Value::Int(7))],
        )
        .await
        .unwrap();
    let mut got = Vec::new();
    while rows.next().await {
        got.push(rows.scan::<(i64, String)>().unwrap());
    }
    rows.close().unwrap();
    assert_eq!(got, vec![(7, "seven".to_string())]);

    conn.execute("DROP TABLE TestQueryParams", &[]).await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_null_scan_with_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    conn.execute(
        "CREATE TABLE TestNullScan (
            key STRING(1024),
            testString STRING(1024),
            testBytes BYTES(1024),
            testInt INT64,
            testFloat FLOAT64,
            testBool BOOL
        ) PRIMARY KEY (key)",
        &[],
    )
    .await
    .unwrap();
    conn.execute(
        "INSERT INTO TestNullScan (key, testString, testBytes, testInt, testFloat, testBool)
         VALUES ('nullstring', null, CAST(\"nullstring\" as bytes), 42, 42, true)",
        &[],
    )
    .await
    .unwrap();

    let mut rows = conn
        .query("SELECT * FROM TestNullScan WHERE key = \"nullstring\"", &[])
        .await
        .unwrap();
    assert!(rows.next().await);

    // NULL into a non-optional String is a scan error.
    let strict = rows.scan::<(String, String, Vec<u8>, i64, f64, bool)>();
    assert!(matches!(strict, Err(SpannerError::Scan(_))));

    let got = rows
        .scan::<(String, Option<String>, Vec<u8>, i64, f64, bool)>()
        .unwrap();
    assert_eq!(
        got,
        (
            "nullstring".to_string(),
            None,
            b"nullstring".to_vec(),
            42,
            42.0,
            true
        )
    );
    assert!(!rows.next().await);
    rows.close().unwrap();

    conn.execute("DROP TABLE TestNullScan", &[]).await.unwrap();
    conn.close().await.unwrap();
}
