//! Print the most recent submissions as a JSON report.
//!
//! Usage: `export-submissions [LIMIT]` (default 50). Needs `DATABASE_URL`.

use anyhow::{Context, Result};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stella::db;
use stella::report::{encode_rows, ReportRow};

const DEFAULT_LIMIT: i64 = 50;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let limit = match env::args().nth(1) {
        Some(arg) => arg
            .parse::<i64>()
            .ok()
            .filter(|limit| *limit > 0)
            .with_context(|| format!("LIMIT must be a positive integer, got {arg:?}"))?,
        None => DEFAULT_LIMIT,
    };

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = db::create_pool(&database_url, 1).await?;

    let rows = db::recent_submissions(&pool, limit).await?;
    info!(count = rows.len(), "Exporting submissions");

    let report = encode_rows(rows.into_iter().map(ReportRow::from));
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
