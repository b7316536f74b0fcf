//! Row cursor over a query result.
//!
//! The query is submitted on the first call to [`Rows::next`]. Anything the
//! database reports while running it is recorded and handed back by
//! [`Rows::close`], so query submission, row scans and close are independent
//! failure points that each need checking.

use futures::future::BoxFuture;
use std::fmt;
use tracing::debug;

use super::scan::{FromRow, FromValue};
use crate::db::{ColumnInfo, QueryResult, Row};
use crate::error::{Result, SpannerError};

enum RowsState {
    Pending(BoxFuture<'static, Result<QueryResult>>),
    Iterating(std::vec::IntoIter<Row>),
    Done,
}

/// Cursor over the rows of a query.
pub struct Rows {
    state: RowsState,
    columns: Vec<ColumnInfo>,
    current: Option<Row>,
    err: Option<SpannerError>,
    closed: bool,
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            RowsState::Pending(_) => "pending",
            RowsState::Iterating(_) => "iterating",
            RowsState::Done => "done",
        };
        f.debug_struct("Rows")
            .field("state", &state)
            .field("columns", &self.columns)
            .field("err", &self.err)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Rows {
    /// Creates a cursor that runs `query` when first advanced.
    pub(crate) fn pending(query: BoxFuture<'static, Result<QueryResult>>) -> Self {
        Self {
            state: RowsState::Pending(query),
            columns: Vec::new(),
            current: None,
            err: None,
            closed: false,
        }
    }

    /// Creates a cursor over an already materialized result.
    pub fn from_result(result: QueryResult) -> Self {
        Self {
            state: RowsState::Iterating(result.rows.into_iter()),
            columns: result.columns,
            current: None,
            err: None,
            closed: false,
        }
    }

    /// Advances to the next row. Returns false when the rows are exhausted,
    /// an error occurred, or the cursor was closed.
    pub async fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }

        if let RowsState::Pending(_) = self.state {
            let RowsState::Pending(query) = std::mem::replace(&mut self.state, RowsState::Done)
            else {
                unreachable!("state checked above");
            };
            match query.await {
                Ok(result) => {
                    debug!(
                        "Query returned {} rows in {:?}",
                        result.row_count, result.execution_time
                    );
                    self.columns = result.columns;
                    self.state = RowsState::Iterating(result.rows.into_iter());
                }
                Err(e) => {
                    debug!("Query failed: {}", e);
                    self.err = Some(e);
                }
            }
        }

        self.current = match &mut self.state {
            RowsState::Iterating(rows) => rows.next(),
            _ => None,
        };
        if self.current.is_none() {
            self.state = RowsState::Done;
        }
        self.current.is_some()
    }

    /// Column metadata. Empty until the query has run.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Returns the current row's raw values.
    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Scans the current row into a tuple whose arity matches the row width.
    pub fn scan<T: FromRow>(&self) -> Result<T> {
        let row = self.current_row()?;
        T::from_row(row)
    }

    /// Scans one column of the current row.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let row = self.current_row()?;
        let value = row.get(index).ok_or_else(|| {
            SpannerError::scan(format!(
                "column index {index} out of range, row has {} columns",
                row.len()
            ))
        })?;
        T::from_value(value)
    }

    fn current_row(&self) -> Result<&Row> {
        if self.closed {
            return Err(SpannerError::scan("rows are closed"));
        }
        self.current
            .as_ref()
            .ok_or_else(|| SpannerError::scan("scan called without a current row"))
    }

    /// The error recorded while running or iterating the query, if any.
    pub fn err(&self) -> Option<&SpannerError> {
        self.err.as_ref()
    }

    /// Closes the cursor and returns the error recorded during iteration.
    ///
    /// Closing an unread cursor discards the query without running it.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.current = None;
        self.state = RowsState::Done;
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Reads all remaining rows into `T`, then closes the cursor.
    pub async fn collect<T: FromRow>(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while self.next().await {
            match self.scan() {
                Ok(row) => out.push(row),
                Err(e) => {
                    // Release the cursor before surfacing the scan failure.
                    let _ = self.close();
                    return Err(e);
                }
            }
        }
        self.close()?;
        Ok(out)
    }
}
