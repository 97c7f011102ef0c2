//! medtrack
//!
//! An MCP server for personal medication tracking and adherence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

mod adherence;
mod alerts;
mod build_info;
mod db;
mod mcp;
mod models;
mod tools;

use alerts::notify::{LogOnlyNotifier, Notifier, RelayClient};
use mcp::MedtrackService;

/// Interval between overdue-medication sweeps
const ALERT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Get the database path from environment or use default
fn get_database_path() -> PathBuf {
    std::env::var("MEDTRACK_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            path.push("medtrack.db");
            path
        })
}

/// Build the caregiver notifier from the environment.
///
/// With `MEDTRACK_RELAY_URL` unset, alerts are logged instead of sent
/// (the relay is an external service and may not be running).
fn get_notifier() -> Arc<dyn Notifier> {
    match RelayClient::from_env() {
        Some(client) => Arc::new(client),
        None => {
            eprintln!("MEDTRACK_RELAY_URL not set; caregiver alerts will be logged only");
            Arc::new(LogOnlyNotifier)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("medtrack=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let db_path = get_database_path();
    eprintln!("Database path: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = db::Database::new(&db_path)?;

    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let notifier = get_notifier();

    // Background overdue sweep. Fire-and-forget; stops when the process exits.
    alerts::sweep::spawn_monitor(database.clone(), Arc::clone(&notifier), ALERT_POLL_INTERVAL);

    let service = MedtrackService::new(db_path, database, notifier);

    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
