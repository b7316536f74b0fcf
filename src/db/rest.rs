//! Spanner REST API client implementation.
//!
//! Provides the `RestClient` struct that implements the `SpannerClient` trait
//! over the public `v1` REST surface using reqwest. The same client works
//! against the production endpoint and the local emulator.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::codec::{encode_params, ResultSet};
use super::{QueryResult, SpannerClient};
use crate::config::{ConnectionConfig, DatabaseName};
use crate::error::{Code, Result, SpannerError};
use crate::statement::Statement;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Spanner client speaking the REST API.
///
/// All work runs on one session, which holds at most one transaction at a
/// time: concurrent callers queue on `session_lock`.
pub struct RestClient {
    http: Client,
    base_url: String,
    database: DatabaseName,
    session: String,
    session_lock: Mutex<()>,
    access_token: Option<String>,
    seqno: AtomicI64,
    max_retries: u32,
    ddl_poll_interval: Duration,
    ddl_timeout: Duration,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("database", &self.database.to_string())
            .field("session", &self.session)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RestClient {
    /// Connects to the configured database by creating a session.
    ///
    /// Transient failures (connection refused, timeouts, UNAVAILABLE) are
    /// retried with exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let database = config.database_name()?;
        let base_url = config.base_url()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpannerError::connection(format!("Failed to create HTTP client: {e}")))?;

        let mut client = Self {
            http,
            base_url,
            database,
            session: String::new(),
            session_lock: Mutex::new(()),
            access_token: config.access_token.clone(),
            seqno: AtomicI64::new(1),
            max_retries: config.max_retries.max(1),
            ddl_poll_interval: Duration::from_millis(config.ddl_poll_interval_ms),
            ddl_timeout: Duration::from_secs(config.ddl_timeout_secs),
        };

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;
        loop {
            debug!("Session attempt {} of {}", attempt, client.max_retries);
            match client.create_session().await {
                Ok(session) => {
                    debug!("Created session {}", session);
                    client.session = session;
                    return Ok(client);
                }
                Err(e) if is_transient(&e) && attempt < client.max_retries => {
                    warn!(
                        "Session attempt {} failed (transient error), retrying in {:?}: {}",
                        attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns the database this client is bound to.
    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    /// Returns the server-side session name.
    pub fn session_name(&self) -> &str {
        &self.session
    }

    async fn create_session(&self) -> Result<String> {
        let path = format!("{}/sessions", self.database);
        let session: SessionResponse = self.post(&path, &CreateSessionRequest {}).await?;
        Ok(session.name)
    }

    fn next_seqno(&self) -> String {
        self.seqno.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn begin_transaction(&self) -> Result<String> {
        let path = format!("{}:beginTransaction", self.session);
        let request = BeginTransactionRequest {
            options: TransactionOptions::ReadWrite(ReadWriteOptions {}),
        };
        let tx: TransactionResponse = self.post(&path, &request).await?;
        Ok(tx.id)
    }

    async fn commit(&self, tx: &str) -> Result<()> {
        let path = format!("{}:commit", self.session);
        let request = CommitRequest {
            transaction_id: tx,
            mutations: Vec::new(),
        };
        let _: Json = self.post(&path, &request).await?;
        Ok(())
    }

    async fn rollback(&self, tx: &str) -> Result<()> {
        let path = format!("{}:rollback", self.session);
        let _: Json = self
            .post(&path, &RollbackRequest { transaction_id: tx })
            .await?;
        Ok(())
    }

    /// Runs `work` inside a read/write transaction and commits it.
    ///
    /// The whole transaction is retried when the database aborts it. The
    /// session stays locked from begin until commit or rollback.
    async fn run_read_write<'a, T, F>(&'a self, mut work: F) -> Result<T>
    where
        F: FnMut(String) -> BoxFuture<'a, Result<T>>,
    {
        let _session = self.session_lock.lock().await;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;
        loop {
            let tx = self.begin_transaction().await?;
            let outcome = match work(tx.clone()).await {
                Ok(value) => self.commit(&tx).await.map(|_| value),
                Err(e) => {
                    if let Err(rollback_err) = self.rollback(&tx).await {
                        debug!("Rollback of {} failed: {}", tx, rollback_err);
                    }
                    Err(e)
                }
            };

            match outcome {
                Err(e) if e.code() == Some(Code::Aborted) && attempt < self.max_retries => {
                    warn!(
                        "Transaction aborted (attempt {} of {}), retrying in {:?}",
                        attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn execute_dml(&self, tx: String, statement: &Statement) -> Result<i64> {
        let (params, param_types) = encode_params(&statement.params);
        let request = ExecuteSqlRequest {
            sql: &statement.sql,
            params,
            param_types,
            transaction: TransactionSelector::Id(tx),
            seqno: Some(self.next_seqno()),
        };
        let path = format!("{}:executeSql", self.session);
        let result: ResultSet = self.post(&path, &request).await?;
        result.row_count()
    }

    async fn execute_batch_dml(&self, tx: String, statements: &[Statement]) -> Result<Vec<i64>> {
        let statements = statements
            .iter()
            .map(|stmt| {
                let (params, param_types) = encode_params(&stmt.params);
                BatchStatement {
                    sql: &stmt.sql,
                    params,
                    param_types,
                }
            })
            .collect();
        let request = ExecuteBatchDmlRequest {
            transaction: TransactionSelector::Id(tx),
            statements,
            seqno: self.next_seqno(),
        };
        let path = format!("{}:executeBatchDml", self.session);
        let response: ExecuteBatchDmlResponse = self.post(&path, &request).await?;

        let counts = response
            .result_sets
            .iter()
            .map(ResultSet::row_count)
            .collect::<Result<Vec<_>>>()?;

        match response.status {
            Some(status) if status.code != 0 => Err(status.into_error()),
            _ => Ok(counts),
        }
    }

    async fn wait_for_operation(&self, mut operation: Operation) -> Result<()> {
        let deadline = Instant::now() + self.ddl_timeout;
        while !operation.done {
            if Instant::now() >= deadline {
                return Err(SpannerError::database(
                    Code::DeadlineExceeded,
                    format!(
                        "Schema update {} did not finish within {:?}",
                        operation.name, self.ddl_timeout
                    ),
                ));
            }
            tokio::time::sleep(self.ddl_poll_interval).await;
            operation = self.get(&operation.name).await?;
        }

        match operation.error {
            Some(status) if status.code != 0 => Err(status.into_error()),
            _ => Ok(()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let request = self.http.post(self.url(path)).json(body);
        self.send(Method::POST, path, request).await
    }

    async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let request = self.http.patch(self.url(path)).json(body);
        self.send(Method::PATCH, path, request).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let request = self.http.get(self.url(path));
        self.send(Method::GET, path, request).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let request = self.http.delete(self.url(path));
        let _: Json = self.send(Method::DELETE, path, request).await?;
        Ok(())
    }

    async fn send<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<R> {
        debug!("{} {}", method, path);

        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            SpannerError::connection(format!("{method} {path} failed: {e}"))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpannerError::connection(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let error = parse_error(status, &body);
            debug!("{} {} returned {}: {}", method, path, status, error);
            return Err(error);
        }

        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| SpannerError::internal(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl SpannerClient for RestClient {
    async fn update_ddl(&self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        let path = format!("{}/ddl", self.database);
        let operation: Operation = self.patch(&path, &UpdateDdlRequest { statements }).await?;
        debug!("Schema update {} started", operation.name);
        self.wait_for_operation(operation).await
    }

    async fn execute_update(&self, statement: &Statement) -> Result<i64> {
        self.run_read_write(|tx| self.execute_dml(tx, statement).boxed())
            .await
    }

    async fn batch_update(&self, statements: &[Statement]) -> Result<Vec<i64>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        self.run_read_write(|tx| self.execute_batch_dml(tx, statements).boxed())
            .await
    }

    async fn execute_query(&self, statement: &Statement) -> Result<QueryResult> {
        let start = Instant::now();
        let (params, param_types) = encode_params(&statement.params);
        let request = ExecuteSqlRequest {
            sql: &statement.sql,
            params,
            param_types,
            transaction: TransactionSelector::SingleUse(TransactionOptions::ReadOnly(
                ReadOnlyOptions { strong: true },
            )),
            seqno: None,
        };
        let path = format!("{}:executeSql", self.session);
        let result: ResultSet = {
            let _session = self.session_lock.lock().await;
            self.post(&path, &request).await?
        };

        Ok(result
            .into_query_result()?
            .with_execution_time(start.elapsed()))
    }

    async fn close(&self) -> Result<()> {
        debug!("Deleting session {}", self.session);
        self.delete(&self.session).await
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient(error: &SpannerError) -> bool {
    match error {
        SpannerError::Connection(_) => true,
        SpannerError::Database { code, .. } => {
            matches!(code, Code::Unavailable | Code::DeadlineExceeded)
        }
        _ => false,
    }
}

/// Maps a non-success HTTP response to an error, keeping the database's message.
fn parse_error(status: StatusCode, body: &str) -> SpannerError {
    if let Ok(response) = serde_json::from_str::<ErrorResponse>(body) {
        let code = response
            .error
            .status
            .as_deref()
            .and_then(Code::from_status)
            .unwrap_or_else(|| Code::from_http(status.as_u16()));
        return SpannerError::database(code, response.error.message);
    }

    SpannerError::database(
        Code::from_http(status.as_u16()),
        format!("HTTP {}: {}", status, body.trim()),
    )
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest {}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum TransactionOptions {
    ReadOnly(ReadOnlyOptions),
    ReadWrite(ReadWriteOptions),
}

#[derive(Debug, Serialize)]
struct ReadOnlyOptions {
    strong: bool,
}

#[derive(Debug, Serialize)]
struct ReadWriteOptions {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum TransactionSelector {
    SingleUse(TransactionOptions),
    Id(String),
}

#[derive(Debug, Serialize)]
struct BeginTransactionRequest {
    options: TransactionOptions,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest<'a> {
    transaction_id: &'a str,
    mutations: Vec<Json>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RollbackRequest<'a> {
    transaction_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteSqlRequest<'a> {
    sql: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    params: Map<String, Json>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    param_types: Map<String, Json>,
    transaction: TransactionSelector,
    #[serde(skip_serializing_if = "Option::is_none")]
    seqno: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchStatement<'a> {
    sql: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    params: Map<String, Json>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    param_types: Map<String, Json>,
}

#[derive(Debug, Serialize)]
struct ExecuteBatchDmlRequest<'a> {
    transaction: TransactionSelector,
    statements: Vec<BatchStatement<'a>>,
    seqno: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteBatchDmlResponse {
    #[serde(default)]
    result_sets: Vec<ResultSet>,
    #[serde(default)]
    status: Option<RpcStatus>,
}

#[derive(Debug, Serialize)]
struct UpdateDdlRequest<'a> {
    statements: &'a [String],
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<RpcStatus>,
}

/// `google.rpc.Status` as embedded in batch and operation responses.
#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl RpcStatus {
    fn into_error(self) -> SpannerError {
        SpannerError::database(Code::from_i32(self.code), self.message)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}
