//! SQL connection over a Spanner client.
//!
//! Routes each statement by its leading keyword: schema statements go to the
//! schema-update path, everything else to the transactional DML path.
//! Queries return a lazy [`Rows`] cursor.

mod rows;
mod scan;

pub use rows::Rows;
pub use scan::{FromRow, FromValue};

use futures::FutureExt;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::db::{self, SpannerClient, Value};
use crate::error::{Result, SpannerError};
use crate::statement::{Statement, StatementKind};

/// Outcome of [`Connection::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows changed by a DML statement. Always 0 for schema statements.
    pub rows_affected: i64,
}

/// A connection to one database.
pub struct Connection {
    client: Arc<dyn SpannerClient>,
    closed: AtomicBool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a connection to the configured database.
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        info!("Connecting to {}", config.display_string());
        let client = db::connect(config).await?;
        Ok(Self::with_client(Arc::from(client)))
    }

    /// Wraps an existing client.
    pub fn with_client(client: Arc<dyn SpannerClient>) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SpannerError::connection("Connection is closed"));
        }
        Ok(())
    }

    /// Executes a statement that returns no rows.
    ///
    /// Schema statements are applied as a schema update and block until the
    /// update completes. They take no parameters.
    pub async fn execute(&self, sql: &str, params: &[(&str, Value)]) -> Result<ExecResult> {
        self.execute_statement(build_statement(sql, params)).await
    }

    /// Executes a prepared [`Statement`]. See [`execute`](Self::execute).
    pub async fn execute_statement(&self, statement: Statement) -> Result<ExecResult> {
        self.ensure_open()?;
        let start = Instant::now();

        match statement.kind() {
            StatementKind::Ddl => {
                if !statement.params.is_empty() {
                    return Err(SpannerError::statement(
                        "schema statements do not accept parameters",
                    ));
                }
                debug!("Applying schema statement: {}", statement.sql);
                self.client
                    .update_ddl(std::slice::from_ref(&statement.sql))
                    .await?;
                debug!("Schema update finished in {:?}", start.elapsed());
                Ok(ExecResult { rows_affected: 0 })
            }
            StatementKind::Other => {
                debug!("Executing DML: {}", statement.sql);
                let rows_affected = self.client.execute_update(&statement).await?;
                debug!(
                    "DML affected {} rows in {:?}",
                    rows_affected,
                    start.elapsed()
                );
                Ok(ExecResult { rows_affected })
            }
        }
    }

    /// Applies several schema statements as one schema update.
    pub async fn execute_ddl_batch<S: AsRef<str>>(&self, statements: &[S]) -> Result<()> {
        self.ensure_open()?;
        let statements: Vec<String> = statements
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect();

        if let Some(bad) = statements.iter().find(|s| !crate::statement::classify(s).is_ddl()) {
            return Err(SpannerError::statement(format!(
                "not a schema statement: {}",
                bad.trim()
            )));
        }
        if statements.is_empty() {
            return Ok(());
        }

        debug!("Applying {} schema statements", statements.len());
        self.client.update_ddl(&statements).await
    }

    /// Runs DML statements in order within one read/write transaction.
    ///
    /// Returns the rows affected by each statement.
    pub async fn batch_update(&self, statements: &[Statement]) -> Result<Vec<i64>> {
        self.ensure_open()?;
        if let Some(bad) = statements.iter().find(|s| s.kind().is_ddl()) {
            return Err(SpannerError::statement(format!(
                "schema statement in DML batch: {}",
                bad.sql.trim()
            )));
        }
        if statements.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Executing batch of {} DML statements", statements.len());
        self.client.batch_update(statements).await
    }

    /// Starts a query.
    ///
    /// The statement is sent on the first [`Rows::next`]; anything the
    /// database reports about it is returned by [`Rows::close`].
    pub async fn query(&self, sql: &str, params: &[(&str, Value)]) -> Result<Rows> {
        self.query_statement(build_statement(sql, params)).await
    }

    /// Starts a query from a prepared [`Statement`]. See [`query`](Self::query).
    pub async fn query_statement(&self, statement: Statement) -> Result<Rows> {
        self.ensure_open()?;
        let client = Arc::clone(&self.client);
        let query = async move {
            debug!("Executing query: {}", statement.sql);
            client.execute_query(&statement).await
        };
        Ok(Rows::pending(query.boxed()))
    }

    /// Closes the connection and releases the client's server-side resources.
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Closing connection");
        self.client.close().await
    }
}

fn build_statement(sql: &str, params: &[(&str, Value)]) -> Statement {
    params
        .iter()
        .fold(Statement::new(sql), |stmt, (name, value)| {
            stmt.bind(*name, value.clone())
        })
}
