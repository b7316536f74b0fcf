//! Schema statement tests.
//!
//! Covers the schema lifecycle (create, duplicate, drop, drop missing) and
//! referential integrity with both foreign keys and interleaved tables.

use spanner_sql::db::MockClient;
use spanner_sql::Connection;
use std::sync::Arc;

use super::emulator_connection;

struct DdlCase {
    name: &'static str,
    input: &'static str,
    want_error: bool,
    /// Cleanup statement run after all cases.
    drop: Option<&'static str>,
}

const fn ok(name: &'static str, input: &'static str) -> DdlCase {
    DdlCase {
        name,
        input,
        want_error: false,
        drop: None,
    }
}

const fn fails(name: &'static str, input: &'static str) -> DdlCase {
    DdlCase {
        name,
        input,
        want_error: true,
        drop: None,
    }
}

const fn ok_then_drop(name: &'static str, input: &'static str, drop: &'static str) -> DdlCase {
    DdlCase {
        name,
        input,
        want_error: false,
        drop: Some(drop),
    }
}

fn cases() -> Vec<DdlCase> {
    vec![
        ok(
            "create table ok",
            "CREATE TABLE TestTable (
                A STRING(1024),
                B STRING(1024),
            ) PRIMARY KEY (A)",
        ),
        fails(
            "create table name duplicate",
            "CREATE TABLE TestTable (
                A STRING(1024),
                B STRING(1024),
            ) PRIMARY KEY (A)",
        ),
        fails(
            "create table syntax error",
            "CREATE CREATE TABLE SyntaxError (
                A STRING(1024),
                B STRING(1024),
                C STRING(1024)
            ) PRIMARY KEY (A)",
        ),
        fails(
            "create table no primary key",
            "CREATE TABLE NoPrimaryKey (
                A STRING(1024),
                B STRING(1024),
            )",
        ),
        ok_then_drop(
            "create table float primary key",
            "CREATE TABLE FloatPrimaryKey (
                A FLOAT64,
                B STRING(1024),
            ) PRIMARY KEY (A)",
            "DROP TABLE FloatPrimaryKey",
        ),
        ok_then_drop(
            "create table bool primary key",
            "CREATE TABLE BoolPrimaryKey (
                A BOOL,
                B STRING(1024),
            ) PRIMARY KEY (A)",
            "DROP TABLE BoolPrimaryKey",
        ),
        ok_then_drop(
            "create table lowercase ddl",
            "create table LowerDdl (
                A INT64,
                B STRING(1024),
            ) PRIMARY KEY (A)",
            "DROP TABLE LowerDdl",
        ),
        fails(
            "create table integer name",
            "CREATE TABLE 42 (
                A INT64,
                B STRING(1024),
            ) PRIMARY KEY (A)",
        ),
        ok("drop table ok", "DROP TABLE TestTable"),
        fails("drop non existent table", "DROP TABLE NonExistent"),
        // Foreign key, no cascade.
        ok(
            "foreign key create parent",
            "CREATE TABLE ParentNoCascade (
                id INT64,
            ) PRIMARY KEY (id)",
        ),
        ok(
            "foreign key create child",
            "CREATE TABLE ChildNoCascade (
                id INT64,
                parent_id INT64,
                CONSTRAINT fk_nc FOREIGN KEY (parent_id) REFERENCES ParentNoCascade (id)
            ) PRIMARY KEY (id)",
        ),
        ok(
            "foreign key fill parent",
            "INSERT INTO ParentNoCascade (id) VALUES (1), (2)",
        ),
        ok(
            "foreign key fill child",
            "INSERT INTO ChildNoCascade (id, parent_id) VALUES (2, 1), (4, 2)",
        ),
        // Interleaved, cascading deletes.
        ok(
            "interleave create parent",
            "CREATE TABLE ParentCascade (
                parent_id INT64,
            ) PRIMARY KEY (parent_id)",
        ),
        ok(
            "interleave create child",
            "CREATE TABLE ChildCascade (
                parent_id INT64,
                id INT64,
            ) PRIMARY KEY (parent_id, id),
            INTERLEAVE IN PARENT ParentCascade ON DELETE CASCADE",
        ),
        ok(
            "interleave fill parent",
            "INSERT INTO ParentCascade (parent_id) VALUES (1), (2)",
        ),
        ok(
            "interleave fill child",
            "INSERT INTO ChildCascade (id, parent_id) VALUES (2, 1), (4, 2)",
        ),
        fails(
            "drop referenced parent",
            "DROP TABLE ParentNoCascade",
        ),
        fails(
            "drop interleaved parent",
            "DROP TABLE ParentCascade",
        ),
        ok("clean up ChildNoCascade", "DROP TABLE ChildNoCascade"),
        ok("clean up ParentNoCascade", "DROP TABLE ParentNoCascade"),
        ok("clean up ChildCascade", "DROP TABLE ChildCascade"),
        ok("clean up ParentCascade", "DROP TABLE ParentCascade"),
    ]
}

/// Runs every case and returns a description of each mismatch.
async fn run_cases(conn: &Connection) -> Vec<String> {
    let cases = cases();
    let mut failures = Vec::new();

    for case in &cases {
        match conn.execute(case.input, &[]).await {
            Err(e) if !case.want_error => {
                failures.push(format!("{}: unexpected error: {e}", case.name))
            }
            Ok(_) if case.want_error => {
                failures.push(format!("{}: expected an error", case.name))
            }
            _ => {}
        }
    }

    for drop in cases.iter().filter_map(|c| c.drop) {
        if let Err(e) = conn.execute(drop, &[]).await {
            failures.push(format!("cleanup {drop}: {e}"));
        }
    }

    failures
}

#[tokio::test]
async fn test_ddl_cases_with_mock() {
    let mock = Arc::new(MockClient::new());
    let conn = Connection::with_client(mock.clone());

    let failures = run_cases(&conn).await;
    assert!(failures.is_empty(), "failures:\n{}", failures.join("\n"));
    assert!(mock.table_names().is_empty());
}

#[tokio::test]
async fn test_ddl_cases_with_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    let failures = run_cases(&conn).await;
    conn.close().await.unwrap();
    assert!(failures.is_empty(), "failures:\n{}", failures.join("\n"));
}

#[tokio::test]
async fn test_ddl_batch_with_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    conn.execute_ddl_batch(&[
        "CREATE TABLE BatchParent (id INT64) PRIMARY KEY (id)",
        "CREATE TABLE BatchChild (id INT64, child INT64) PRIMARY KEY (id, child), \
         INTERLEAVE IN PARENT BatchParent",
    ])
    .await
    .unwrap();

    conn.execute_ddl_batch(&["DROP TABLE BatchChild", "DROP TABLE BatchParent"])
        .await
        .unwrap();
    conn.close().await.unwrap();
}
