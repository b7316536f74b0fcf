//! Lexical DDL detection.
//!
//! Only the leading token is inspected. Whether the rest of the statement is
//! valid SQL is for the database to decide at execution time.

use crate::error::{Result, SpannerError};

use super::{DdlKeyword, StatementKind};

/// Classifies a statement by its first token.
pub fn classify(sql: &str) -> StatementKind {
    match leading_keyword(sql) {
        Some(_) => StatementKind::Ddl,
        None => StatementKind::Other,
    }
}

/// Classifies raw statement bytes.
///
/// Fails only when the bytes are not valid UTF-8.
pub fn classify_bytes(sql: &[u8]) -> Result<StatementKind> {
    let sql = std::str::from_utf8(sql).map_err(|e| {
        SpannerError::statement(format!(
            "statement is not valid UTF-8 (at byte {})",
            e.valid_up_to()
        ))
    })?;
    Ok(classify(sql))
}

/// Returns the DDL keyword the statement starts with, if any.
pub fn leading_keyword(sql: &str) -> Option<DdlKeyword> {
    DdlKeyword::from_token(first_token(sql))
}

/// Returns the first identifier-like token after leading whitespace.
///
/// A token is a maximal run of ASCII alphanumerics and underscores, so
/// `"0CREATE"` yields `"0CREATE"` and `"x CREATE"` yields `"x"`.
fn first_token(sql: &str) -> &str {
    let rest = sql.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}
