//! Connection integration tests.
//!
//! Tests connectivity, configuration errors and statement routing.

use spanner_sql::config::{Config, ConnectionConfig};
use spanner_sql::db::{Call, MockClient};
use spanner_sql::{Connection, SpannerError, Statement};
use std::io::Write;
use std::sync::Arc;

use super::{emulator_config, emulator_connection, test_database};

#[tokio::test]
async fn test_connect_to_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    // Connection succeeded if we got here
    conn.close().await.unwrap();
    assert!(conn.is_closed());
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_unreachable_emulator() {
    let config = ConnectionConfig {
        max_retries: 0,
        timeout_secs: 2,
        ..ConnectionConfig::new(&test_database()).with_emulator_host("127.0.0.1:1")
    };

    let err = Connection::open(&config).await.unwrap_err();
    assert!(
        matches!(err, SpannerError::Connection(_)),
        "Expected connection error, got: {err}"
    );
}

#[tokio::test]
async fn test_connect_without_database() {
    let config = ConnectionConfig {
        emulator_host: Some("127.0.0.1:1".to_string()),
        ..Default::default()
    };

    let err = Connection::open(&config).await.unwrap_err();
    assert!(matches!(err, SpannerError::Config(_)));
}

#[tokio::test]
async fn test_connect_with_malformed_database() {
    let config = ConnectionConfig {
        database: Some("projects/p/databases/d".to_string()),
        emulator_host: Some("127.0.0.1:1".to_string()),
        ..Default::default()
    };

    let err = Connection::open(&config).await.unwrap_err();
    assert!(matches!(err, SpannerError::Config(_)));
}

#[tokio::test]
async fn test_open_from_config_file() {
    let Some(emulator) = emulator_config() else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[connections.local]\ndatabase = \"{}\"\nemulator_host = \"{}\"",
        test_database(),
        emulator.emulator_host.unwrap()
    )
    .unwrap();

    let config = Config::load_from_file(file.path()).unwrap();
    let local = config.get_connection(Some("local")).unwrap();
    let conn = Connection::open(local).await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_statement_routing() {
    let mock = Arc::new(MockClient::new());
    let conn = Connection::with_client(mock.clone());

    conn.execute("CREATE TABLE Routed (Id INT64) PRIMARY KEY (Id)", &[])
        .await
        .unwrap();
    conn.execute("INSERT INTO Routed (Id) VALUES (1)", &[])
        .await
        .unwrap();
    conn.batch_update(&[
        Statement::new("UPDATE Routed SET Id = 2 WHERE Id = 1"),
        Statement::new("DELETE FROM Routed WHERE true"),
    ])
    .await
    .unwrap();
    conn.execute("  drop table Routed", &[]).await.unwrap();
    conn.close().await.unwrap();

    assert_eq!(
        mock.calls(),
        vec![
            Call::UpdateDdl(vec![
                "CREATE TABLE Routed (Id INT64) PRIMARY KEY (Id)".to_string()
            ]),
            Call::ExecuteUpdate("INSERT INTO Routed (Id) VALUES (1)".to_string()),
            Call::BatchUpdate(vec![
                "UPDATE Routed SET Id = 2 WHERE Id = 1".to_string(),
                "DELETE FROM Routed WHERE true".to_string(),
            ]),
            Call::UpdateDdl(vec!["  drop table Routed".to_string()]),
            Call::Close,
        ]
    );
}

#[tokio::test]
async fn test_batch_update_with_emulator() {
    let Some(conn) = emulator_connection().await else {
        eprintln!("Skipping test: SPANNER_EMULATOR_REST_HOST not set");
        return;
    };

    conn.execute(
        "CREATE TABLE TestBatchUpdate (Id INT64, Name STRING(64)) PRIMARY KEY (Id)",
        &[],
    )
    .await
    .unwrap();

    let counts = conn
        .batch_update(&[
            Statement::new("INSERT INTO TestBatchUpdate (Id, Name) VALUES (1, 'a'), (2, 'b')"),
            Statement::new("UPDATE TestBatchUpdate SET Name = 'c' WHERE Id > 0"),
            Statement::new("DELETE FROM TestBatchUpdate WHERE Id = @id").bind("id", 1i64),
        ])
        .await
        .unwrap();
    assert_eq!(counts, vec![2, 2, 1]);

    let deleted = conn
        .execute("DELETE FROM TestBatchUpdate WHERE true", &[])
        .await
        .unwrap();
    assert_eq!(deleted.rows_affected, 1);

    conn.execute("DROP TABLE TestBatchUpdate", &[]).await.unwrap();
    conn.close().await.unwrap();
}
