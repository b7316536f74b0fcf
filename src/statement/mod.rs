//! Statement classification module.
//!
//! Decides whether a SQL statement changes the schema (DDL) so the caller can
//! route it to a schema update instead of a read/write transaction.

mod classifier;

pub use classifier::{classify, classify_bytes, leading_keyword};

use crate::db::Value;
use std::fmt;

/// Leading keywords that mark a statement as DDL.
///
/// Adding a dialect keyword means adding a variant here and an entry in
/// [`DdlKeyword::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlKeyword {
    Create,
    Drop,
    Alter,
    Rename,
    Grant,
    Revoke,
    Analyze,
}

impl DdlKeyword {
    /// Every recognised DDL keyword.
    pub const ALL: &'static [DdlKeyword] = &[
        Self::Create,
        Self::Drop,
        Self::Alter,
        Self::Rename,
        Self::Grant,
        Self::Revoke,
        Self::Analyze,
    ];

    /// Returns the keyword in upper case.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Rename => "RENAME",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Analyze => "ANALYZE",
        }
    }

    /// Looks up a token, ignoring ASCII case. Only whole-token matches count.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kw| kw.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for DdlKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a statement must be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Schema change, executed as a schema update operation.
    Ddl,
    /// Anything else (queries, DML, unrecognised text), executed in a transaction.
    Other,
}

impl StatementKind {
    /// Returns true for schema-changing statements.
    pub fn is_ddl(&self) -> bool {
        matches!(self, Self::Ddl)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ddl => write!(f, "DDL"),
            Self::Other => write!(f, "NOT-DDL"),
        }
    }
}

/// A SQL statement with its named parameters.
///
/// Parameters are referenced as `@name` in the SQL text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    /// SQL text, passed to the database untouched.
    pub sql: String,
    /// Named parameters, in binding order.
    pub params: Vec<(String, Value)>,
}

impl Statement {
    /// Creates a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds a named parameter. A leading `@` on the name is stripped.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let name = name.strip_prefix('@').map(String::from).unwrap_or(name);
        self.params.push((name, value.into()));
        self
    }

    /// Classifies the statement text.
    pub fn kind(&self) -> StatementKind {
        classify(&self.sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}
