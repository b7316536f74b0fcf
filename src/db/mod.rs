//! Database client layer for spanner-sql.
//!
//! Provides a trait-based interface to the remote database so the driver can
//! run against the REST API or an in-memory mock interchangeably.

pub mod codec;
mod mock;
mod rest;
mod types;

pub use mock::{Call, FailingClient, MockClient};
pub use rest::RestClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::statement::Statement;
use async_trait::async_trait;

/// Creates a REST client for the given configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn SpannerClient>> {
    let client = RestClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Operations the driver needs from a Spanner client.
///
/// Errors reported by the database come back as
/// [`SpannerError::Database`](crate::error::SpannerError::Database) and are
/// never retried at this level except where noted.
#[async_trait]
pub trait SpannerClient: Send + Sync {
    /// Applies schema statements as one schema update and waits for it to finish.
    async fn update_ddl(&self, statements: &[String]) -> Result<()>;

    /// Runs one DML statement in a read/write transaction and commits it.
    /// Returns the number of rows affected.
    async fn execute_update(&self, statement: &Statement) -> Result<i64>;

    /// Runs DML statements in order in one read/write transaction and commits.
    /// Returns the rows affected per statement.
    async fn batch_update(&self, statements: &[Statement]) -> Result<Vec<i64>>;

    /// Runs a query in a single-use strong read-only transaction.
    async fn execute_query(&self, statement: &Statement) -> Result<QueryResult>;

    /// Releases server-side resources.
    async fn close(&self) -> Result<()>;
}
