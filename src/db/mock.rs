//! Mock Spanner clients for testing.
//!
//! `MockClient` keeps a tiny table catalog so schema statements fail the way
//! the real database fails them (duplicates, missing tables, dropping a
//! referenced parent), and answers queries from scripted results. Every call
//! is recorded.

use super::{QueryResult, SpannerClient};
use crate::error::{Code, Result, SpannerError};
use crate::statement::{leading_keyword, DdlKeyword, Statement};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A call received by [`MockClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UpdateDdl(Vec<String>),
    ExecuteUpdate(String),
    BatchUpdate(Vec<String>),
    ExecuteQuery(String),
    Close,
}

#[derive(Debug, Clone)]
struct TableDef {
    name: String,
    parents: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    tables: HashMap<String, TableDef>,
    queries: HashMap<String, Result<QueryResult>>,
    updates: HashMap<String, Result<i64>>,
    calls: Vec<Call>,
}

/// An in-memory client with a schema catalog and scripted data.
#[derive(Debug, Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    /// Creates a mock with an empty catalog and no scripted results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result returned for a query text.
    pub fn with_query(self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.lock().queries.insert(normalize(&sql.into()), Ok(result));
        self
    }

    /// Scripts an error returned for a query text.
    pub fn with_query_error(self, sql: impl Into<String>, error: SpannerError) -> Self {
        self.lock().queries.insert(normalize(&sql.into()), Err(error));
        self
    }

    /// Scripts the outcome of a DML statement. Unscripted DML affects 0 rows.
    pub fn with_update(self, sql: impl Into<String>, result: Result<i64>) -> Self {
        self.lock().updates.insert(normalize(&sql.into()), result);
        self
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Returns the names of the tables currently in the catalog, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().tables.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the next assertion.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run_update(state: &MockState, sql: &str) -> Result<i64> {
        if sql.trim().is_empty() {
            return Err(invalid_argument("Invalid statement: empty SQL"));
        }
        state
            .updates
            .get(&normalize(sql))
            .cloned()
            .unwrap_or(Ok(0))
    }
}

#[async_trait]
impl SpannerClient for MockClient {
    async fn update_ddl(&self, statements: &[String]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::UpdateDdl(statements.to_vec()));

        // Statements apply in order; the first failure stops the batch.
        for sql in statements {
            apply_ddl(&mut state.tables, sql)?;
        }
        Ok(())
    }

    async fn execute_update(&self, statement: &Statement) -> Result<i64> {
        let mut state = self.lock();
        state.calls.push(Call::ExecuteUpdate(statement.sql.clone()));
        Self::run_update(&state, &statement.sql)
    }

    async fn batch_update(&self, statements: &[Statement]) -> Result<Vec<i64>> {
        let mut state = self.lock();
        state.calls.push(Call::BatchUpdate(
            statements.iter().map(|s| s.sql.clone()).collect(),
        ));
        statements
            .iter()
            .map(|s| Self::run_update(&state, &s.sql))
            .collect()
    }

    async fn execute_query(&self, statement: &Statement) -> Result<QueryResult> {
        let mut state = self.lock();
        state.calls.push(Call::ExecuteQuery(statement.sql.clone()));

        if statement.sql.trim().is_empty() {
            return Err(invalid_argument("Invalid statement: empty SQL"));
        }
        match state.queries.get(&normalize(&statement.sql)) {
            Some(result) => result
                .clone()
                .map(|r| r.with_execution_time(Duration::from_millis(1))),
            None => Err(invalid_argument(format!(
                "Unrecognized query: {}",
                statement.sql.trim()
            ))),
        }
    }

    async fn close(&self) -> Result<()> {
        self.lock().calls.push(Call::Close);
        Ok(())
    }
}

/// A client whose every call fails with the same error.
#[derive(Debug, Clone)]
pub struct FailingClient {
    error: SpannerError,
}

impl FailingClient {
    /// Creates a client that always returns `error`.
    pub fn new(error: SpannerError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl SpannerClient for FailingClient {
    async fn update_ddl(&self, _statements: &[String]) -> Result<()> {
        Err(self.error.clone())
    }

    async fn execute_update(&self, _statement: &Statement) -> Result<i64> {
        Err(self.error.clone())
    }

    async fn batch_update(&self, _statements: &[Statement]) -> Result<Vec<i64>> {
        Err(self.error.clone())
    }

    async fn execute_query(&self, _statement: &Statement) -> Result<QueryResult> {
        Err(self.error.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn invalid_argument(msg: impl Into<String>) -> SpannerError {
    SpannerError::database(Code::InvalidArgument, msg)
}

/// Collapses whitespace so scripted statements match regardless of layout.
fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits DDL into words and punctuation.
fn tokenize(sql: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in sql.chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_word(token: Option<&String>, word: &str) -> bool {
    token.is_some_and(|t| t.eq_ignore_ascii_case(word))
}

fn table_identifier(token: Option<&String>, sql: &str) -> Result<String> {
    match token {
        Some(name) if name.starts_with(|c: char| c.is_alphabetic()) => Ok(name.clone()),
        Some(name) => Err(invalid_argument(format!(
            "Error parsing Spanner DDL statement: {} : Syntax error on line 1: Encountered '{}'",
            sql.trim(),
            name
        ))),
        None => Err(invalid_argument("Error parsing Spanner DDL statement: missing table name")),
    }
}

fn apply_ddl(tables: &mut HashMap<String, TableDef>, sql: &str) -> Result<()> {
    let tokens = tokenize(sql);
    let keyword = leading_keyword(sql);

    match keyword {
        Some(DdlKeyword::Create) if is_word(tokens.get(1), "TABLE") => {
            let name = table_identifier(tokens.get(2), sql)?;
            let key = name.to_lowercase();
            if tables.contains_key(&key) {
                return Err(SpannerError::database(
                    Code::FailedPrecondition,
                    format!("Duplicate name in schema: {name}."),
                ));
            }
            let has_primary_key = tokens
                .windows(2)
                .any(|w| w[0].eq_ignore_ascii_case("PRIMARY") && w[1].eq_ignore_ascii_case("KEY"));
            if !has_primary_key {
                return Err(invalid_argument(format!(
                    "Error parsing Spanner DDL statement: {} : Expecting 'PRIMARY' but found 'EOF'",
                    sql.trim()
                )));
            }

            let mut parents = Vec::new();
            for (i, token) in tokens.iter().enumerate() {
                let parent = if token.eq_ignore_ascii_case("REFERENCES") {
                    tokens.get(i + 1)
                } else if token.eq_ignore_ascii_case("PARENT") && i >= 2
                    && tokens[i - 2].eq_ignore_ascii_case("INTERLEAVE")
                {
                    tokens.get(i + 1)
                } else {
                    None
                };
                if let Some(parent) = parent {
                    if !tables.contains_key(&parent.to_lowercase()) {
                        return Err(SpannerError::database(
                            Code::NotFound,
                            format!("Table not found: {parent}"),
                        ));
                    }
                    parents.push(parent.to_lowercase());
                }
            }

            tables.insert(key, TableDef { name, parents });
            Ok(())
        }
        Some(DdlKeyword::Create) => match tokens.get(1) {
            Some(word) if DdlKeyword::from_token(word).is_some() => Err(invalid_argument(format!(
                "Error parsing Spanner DDL statement: {} : Syntax error on line 1: Encountered '{}'",
                sql.trim(),
                word
            ))),
            _ => Ok(()),
        },
        Some(DdlKeyword::Drop) if is_word(tokens.get(1), "TABLE") => {
            let name = table_identifier(tokens.get(2), sql)?;
            let key = name.to_lowercase();
            if !tables.contains_key(&key) {
                return Err(SpannerError::database(
                    Code::NotFound,
                    format!("Table not found: {name}"),
                ));
            }
            if let Some(child) = tables.values().find(|t| t.parents.contains(&key)) {
                return Err(SpannerError::database(
                    Code::FailedPrecondition,
                    format!(
                        "Cannot drop table {name}: it is referenced by table {}.",
                        child.name
                    ),
                ));
            }
            tables.remove(&key);
            Ok(())
        }
        Some(_) => Ok(()),
        None => Err(invalid_argument(format!(
            "Error parsing Spanner DDL statement: {}",
            sql.trim()
        ))),
    }
}
