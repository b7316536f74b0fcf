//! spanql - run SQL against Cloud Spanner from the command line.

mod cli;

use cli::{join_sql, Action, Cli, OutputFormat};
use serde_json::json;
use spanner_sql::config::{Config, ConnectionConfig};
use spanner_sql::db::ColumnInfo;
use spanner_sql::error::{Result, SpannerError};
use spanner_sql::{classify, logging, Connection, Statement, Value};
use std::io::Read;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.log_level());

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command.action(read_sql)? {
        Action::Classify(sql) => {
            println!("{}", classify(&sql));
            Ok(())
        }
        Action::Execute(statement) => {
            let conn = open_connection(&cli).await?;
            let result = conn.execute_statement(statement).await.map(|result| {
                println!("{} rows affected", result.rows_affected);
            });
            finish(conn, result).await
        }
        Action::Query(statement) => {
            let conn = open_connection(&cli).await?;
            let result = run_query(&conn, statement, cli.output).await;
            finish(conn, result).await
        }
    }
}

async fn open_connection(cli: &Cli) -> Result<Connection> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let connection = resolve_connection(cli, &config)?.ok_or_else(|| {
        SpannerError::config(
            "No database configured. Use --database, --connection or SPANNER_DATABASE",
        )
    })?;

    Connection::open(&connection).await
}

/// Closes the connection, reporting the command's error first.
async fn finish(conn: Connection, result: Result<()>) -> Result<()> {
    let closed = conn.close().await;
    result?;
    closed
}

async fn run_query(conn: &Connection, statement: Statement, format: OutputFormat) -> Result<()> {
    let mut rows = conn.query_statement(statement).await?;

    let mut data = Vec::new();
    while rows.next().await {
        if let Some(row) = rows.current() {
            data.push(row.clone());
        }
    }
    rows.close()?;

    print_rows(rows.columns(), &data, format)
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    // Named or default connection from the config file.
    let mut connection = match cli.connection_name() {
        Some(name) => Some(config.get_connection(Some(name)).cloned().ok_or_else(|| {
            SpannerError::config(format!("Connection '{name}' not found in config file"))
        })?),
        None => config.get_connection(None).cloned(),
    };

    // CLI arguments override the file.
    if let Some(overrides) = cli.to_connection_config()? {
        match connection.as_mut() {
            Some(conn) => conn.merge(&overrides),
            None => connection = Some(overrides),
        }
    }

    let mut connection = connection.unwrap_or_default();
    connection.apply_env_defaults();

    if connection.database.is_none() {
        return Ok(None);
    }
    Ok(Some(connection))
}

fn read_sql(words: &[String]) -> Result<String> {
    if words.len() == 1 && words[0] == "-" {
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .map_err(|e| SpannerError::internal(format!("Failed to read stdin: {e}")))?;
        return Ok(sql);
    }
    Ok(join_sql(words))
}

fn print_rows(columns: &[ColumnInfo], rows: &[Vec<Value>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let header: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            println!("{}", header.join("\t"));
            for row in rows {
                let cells: Vec<String> = row.iter().map(Value::to_display_string).collect();
                println!("{}", cells.join("\t"));
            }
        }
        OutputFormat::Json => {
            let doc = json!({
                "columns": columns,
                "rows": rows
                    .iter()
                    .map(|row| row.iter().map(value_to_json).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            });
            let text = serde_json::to_string_pretty(&doc)
                .map_err(|e| SpannerError::internal(format!("Failed to encode output: {e}")))?;
            println!("{text}");
        }
    }
    Ok(())
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
        Value::Bytes(_) => json!(value.to_display_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}
