//! Command-line argument parsing for spanql.

use clap::{Parser, Subcommand, ValueEnum};
use spanner_sql::config::{Config, ConnectionConfig, DatabaseName};
use spanner_sql::error::{Result, SpannerError};
use spanner_sql::{Statement, Value};
use std::path::PathBuf;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated columns with a header line.
    #[default]
    Text,
    /// One JSON document with columns and rows.
    Json,
}

/// Run SQL against a Cloud Spanner database or emulator.
#[derive(Parser, Debug)]
#[command(name = "spanql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database name (projects/<p>/instances/<i>/databases/<d>)
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emulator REST address (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    pub emulator_host: Option<String>,

    /// Output format for query results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Execute a schema or DML statement
    Exec {
        /// Query parameter as NAME=VALUE (integers bind as INT64)
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// SQL text; "-" reads it from stdin
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        sql: Vec<String>,
    },
    /// Run a query and print its rows
    Query {
        /// Query parameter as NAME=VALUE (integers bind as INT64)
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// SQL text; "-" reads it from stdin
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        sql: Vec<String>,
    },
    /// Print whether a statement is DDL, without connecting
    Classify {
        /// SQL text; "-" reads it from stdin
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        sql: Vec<String>,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Converts CLI arguments to a ConnectionConfig.
    ///
    /// This creates a config from CLI args only, without merging with file config.
    pub fn to_connection_config(&self) -> Result<Option<ConnectionConfig>> {
        if self.database.is_none() && self.emulator_host.is_none() {
            return Ok(None);
        }

        if let Some(database) = &self.database {
            // Fail early on a malformed name rather than at connect time.
            DatabaseName::parse(database)?;
        }

        Ok(Some(ConnectionConfig {
            database: self.database.clone(),
            emulator_host: self.emulator_host.clone(),
            ..Default::default()
        }))
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Returns the log filter used when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

/// What a subcommand asks for, with its SQL already read and parameters bound.
#[derive(Debug)]
pub enum Action {
    Classify(String),
    Execute(Statement),
    Query(Statement),
}

impl Command {
    /// Resolves the subcommand. `read_sql` turns the SQL arguments into text.
    pub fn action(&self, read_sql: impl Fn(&[String]) -> Result<String>) -> Result<Action> {
        match self {
            Command::Classify { sql } => Ok(Action::Classify(read_sql(sql)?)),
            Command::Exec { params, sql } => {
                Ok(Action::Execute(build_statement(read_sql(sql)?, params)?))
            }
            Command::Query { params, sql } => {
                Ok(Action::Query(build_statement(read_sql(sql)?, params)?))
            }
        }
    }
}

/// Joins SQL words given on the command line into one statement.
pub fn join_sql(words: &[String]) -> String {
    words.join(" ")
}

/// Builds a statement from SQL text and `NAME=VALUE` parameter arguments.
pub fn build_statement(sql: String, params: &[String]) -> Result<Statement> {
    params.iter().try_fold(Statement::new(sql), |stmt, param| {
        let (name, value) = param.split_once('=').ok_or_else(|| {
            SpannerError::config(format!("Invalid parameter '{param}'. Expected NAME=VALUE"))
        })?;
        if name.trim().is_empty() {
            return Err(SpannerError::config(format!(
                "Invalid parameter '{param}'. Name is empty"
            )));
        }
        Ok(stmt.bind(name.trim(), parse_param_value(value)))
    })
}

fn parse_param_value(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(i) => Value::Int(i),
        Err(_) => Value::String(raw.to_string()),
    }
}
