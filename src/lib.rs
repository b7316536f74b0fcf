//! spanner-sql: a SQL driver for Cloud Spanner.
//!
//! Statements are routed by their leading keyword: schema statements (CREATE,
//! DROP, ALTER, ...) become schema updates, everything else runs as DML in a
//! read/write transaction. Queries return a lazily evaluated [`Rows`] cursor.
//!
//! ```no_run
//! # async fn demo() -> spanner_sql::Result<()> {
//! use spanner_sql::{Connection, ConnectionConfig, DatabaseName};
//!
//! let name = DatabaseName::parse("projects/p/instances/i/databases/d")?;
//! let config = ConnectionConfig::new(&name).with_emulator_host("localhost:9020");
//! let conn = Connection::open(&config).await?;
//!
//! conn.execute("CREATE TABLE T (A STRING(1024)) PRIMARY KEY (A)", &[]).await?;
//! let mut rows = conn.query("SELECT A FROM T", &[]).await?;
//! while rows.next().await {
//!     let (a,): (String,) = rows.scan()?;
//!     println!("{a}");
//! }
//! rows.close()?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod statement;

pub use config::{Config, ConnectionConfig, DatabaseName};
pub use connection::{Connection, ExecResult, FromRow, FromValue, Rows};
pub use db::Value;
pub use error::{Code, Result, SpannerError};
pub use statement::{classify, Statement, StatementKind};
