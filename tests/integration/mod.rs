//! Integration tests for spanner-sql.
//!
//! Emulator-backed tests skip when `SPANNER_EMULATOR_REST_HOST` (the
//! emulator's REST address, not the gRPC one) is not set.

pub mod connection_test;
pub mod ddl_test;
pub mod query_test;

use spanner_sql::config::{ConnectionConfig, DatabaseName};
use spanner_sql::Connection;

/// Database used by the emulator tests.
pub fn test_database() -> DatabaseName {
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    DatabaseName::new(
        var("SPANNER_TEST_PROJECT", "test-project"),
        var("SPANNER_TEST_INSTANCE", "test-instance"),
        var("SPANNER_TEST_DBID", "gotest"),
    )
}

/// Connection settings for the emulator, if one is configured.
pub fn emulator_config() -> Option<ConnectionConfig> {
    let host = std::env::var("SPANNER_EMULATOR_REST_HOST").ok()?;
    Some(ConnectionConfig::new(&test_database()).with_emulator_host(host))
}

/// Opens a connection to the emulator.
pub async fn emulator_connection() -> Option<Connection> {
    let config = emulator_config()?;
    match Connection::open(&config).await {
        Ok(conn) => Some(conn),
        Err(e) => panic!("SPANNER_EMULATOR_REST_HOST is set but connecting failed: {e}"),
    }
}
