//! Error types for spanner-sql.
//!
//! Defines the error enum used throughout the driver and the canonical status
//! codes reported by the remote database.

use std::fmt;
use thiserror::Error;

/// Canonical status codes reported by Spanner.
///
/// The numeric values match the gRPC codes the service uses on every surface,
/// including the REST API's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Parses a status name such as `"ALREADY_EXISTS"`.
    pub fn from_status(status: &str) -> Option<Self> {
        let code = match status.to_ascii_uppercase().as_str() {
            "OK" => Self::Ok,
            "CANCELLED" => Self::Cancelled,
            "UNKNOWN" => Self::Unknown,
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "DEADLINE_EXCEEDED" => Self::DeadlineExceeded,
            "NOT_FOUND" => Self::NotFound,
            "ALREADY_EXISTS" => Self::AlreadyExists,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "RESOURCE_EXHAUSTED" => Self::ResourceExhausted,
            "FAILED_PRECONDITION" => Self::FailedPrecondition,
            "ABORTED" => Self::Aborted,
            "OUT_OF_RANGE" => Self::OutOfRange,
            "UNIMPLEMENTED" => Self::Unimplemented,
            "INTERNAL" => Self::Internal,
            "UNAVAILABLE" => Self::Unavailable,
            "DATA_LOSS" => Self::DataLoss,
            "UNAUTHENTICATED" => Self::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Converts a numeric gRPC code. Out-of-range values map to `Unknown`.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// Best-effort mapping from an HTTP status when the body carries no status name.
    pub fn from_http(status: u16) -> Self {
        match status {
            200 => Self::Ok,
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Aborted,
            412 => Self::FailedPrecondition,
            429 => Self::ResourceExhausted,
            499 => Self::Cancelled,
            501 => Self::Unimplemented,
            503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            _ if status >= 500 => Self::Internal,
            _ => Self::Unknown,
        }
    }

    /// Returns the status name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for spanner-sql operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpannerError {
    /// Transport failures and closed connections.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid configuration (bad database name, missing fields, unreadable config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error reported by the database, surfaced verbatim.
    #[error("Database error ({code}): {message}")]
    Database { code: Code, message: String },

    /// Statements the driver refuses before contacting the database.
    #[error("Statement error: {0}")]
    Statement(String),

    /// Row-scan failures (type mismatch, NULL into a non-optional target).
    #[error("Scan error: {0}")]
    Scan(String),

    /// Unexpected responses and states.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpannerError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a database error with the given code and message.
    pub fn database(code: Code, msg: impl Into<String>) -> Self {
        Self::Database {
            code,
            message: msg.into(),
        }
    }

    /// Creates a statement error with the given message.
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    /// Creates a scan error with the given message.
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::Scan(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the database status code, if the database produced this error.
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Database { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Database { .. } => "Database Error",
            Self::Statement(_) => "Statement Error",
            Self::Scan(_) => "Scan Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using SpannerError.
pub type Result<T> = std::result::Result<T, SpannerError>;
