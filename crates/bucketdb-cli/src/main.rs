//! bucketdb CLI: inspect and edit tables from the shell.
//!
//! Every command prints JSON on stdout. Logs go to stderr and are
//! controlled with `RUST_LOG`.

use std::error::Error;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use bucketdb::{Database, DatabaseConfig, PageToken, Table};

#[derive(Parser, Debug)]
#[command(
    name = "bucketdb",
    version,
    about = "Document tables stored as JSON objects in a bucket",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(
        long,
        env = "BUCKETDB_STORAGE",
        value_name = "URI",
        help = "Object store URI: s3://, memory://, local://<dir> or a directory"
    )]
    storage: String,

    #[arg(long, env = "BUCKETDB_BUCKET", help = "Bucket holding the tables")]
    bucket: String,

    #[arg(long, help = "Maximum concurrent requests for bulk operations")]
    max_concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one page of keys in a table
    Find {
        table: String,
        #[arg(long, default_value = "", help = "Only keys containing this text")]
        keyword: String,
        #[arg(long, allow_negative_numbers = true, help = "Page size (<= 0 for default)")]
        limit: Option<i64>,
        #[arg(long, help = "Continuation token from a previous page")]
        token: Option<String>,
    },
    /// Print the value stored under a key
    Get { table: String, key: String },
    /// Store a JSON value under a key
    Put {
        table: String,
        key: String,
        #[arg(value_name = "JSON")]
        value: String,
    },
    /// Delete one or more keys in a single batch
    Delete {
        table: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the values of one page of keys
    Dump {
        table: String,
        #[arg(long, default_value = "", help = "Only keys containing this text")]
        keyword: String,
        #[arg(long, allow_negative_numbers = true, help = "Page size (<= 0 for default)")]
        limit: Option<i64>,
        #[arg(long, help = "Continuation token from a previous page")]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = DatabaseConfig::new(cli.open.storage, cli.open.bucket.as_str());
    if let Some(max) = cli.open.max_concurrency {
        config.max_concurrency = max;
    }
    let db = Database::open(&config).await?;

    let output = match cli.command {
        Command::Find {
            table,
            keyword,
            limit,
            token,
        } => {
            let table = with_limit(db.table(&table), limit);
            let token = token.and_then(PageToken::non_empty);
            serde_json::to_value(table.find(&keyword, token.as_ref()).await?)?
        }
        Command::Get { table, key } => {
            let value: Option<Value> = db.table(&table).fetch_one(&key).await?;
            value.unwrap_or(Value::Null)
        }
        Command::Put { table, key, value } => {
            let value: Value = serde_json::from_str(&value)?;
            db.table(&table).save(&key, &value).await?;
            json!({ "key": key, "saved": true })
        }
        Command::Delete { table, keys } => {
            serde_json::to_value(db.table(&table).delete_many(&keys).await?)?
        }
        Command::Dump {
            table,
            keyword,
            limit,
            token,
        } => {
            let table = with_limit(db.table(&table), limit);
            let token = token.and_then(PageToken::non_empty);
            let page = table
                .find_with_content::<Value>(&keyword, token.as_ref())
                .await?;
            let failed: serde_json::Map<String, Value> = page
                .failed
                .into_iter()
                .map(|(key, err)| (key, Value::String(err.to_string())))
                .collect();
            json!({
                "values": page.values,
                "failed": failed,
                "next_token": page.next_token,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn with_limit(table: Table, limit: Option<i64>) -> Table {
    match limit {
        Some(limit) => table.with_limit(limit),
        None => table,
    }
}
