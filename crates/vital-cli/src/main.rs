//! Vital CLI - inspect and drain the local health-data outbox
//!
//! The collection side of the engine runs embedded in host applications; this
//! tool operates on the same database file for diagnostics and manual syncs.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use serde::Serialize;
use thiserror::Error;
use vital_core::auth::StaticCredentials;
use vital_core::models::SourceKind;
use vital_core::services::DataStoreService;
use vital_core::sync::{HttpLogTransport, UploadPipeline};

#[derive(Parser)]
#[command(name = "vital")]
#[command(about = "Inspect and sync the local health-data outbox")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show outbox depth and per-source cursors
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records waiting in the outbox
    Pending {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload the pending outbox to the ingestion API
    Sync {
        /// Base URL of the ingestion API
        #[arg(long, env = "VITAL_API_URL")]
        api_url: String,
        /// Bearer token for the ingestion API
        #[arg(long, env = "VITAL_ACCESS_TOKEN")]
        token: String,
    },
    /// Drop every extraction cursor, forcing a fresh bounded window pass
    ResetCursors,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] vital_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Account removed by server; local data kept, uploads disabled")]
    AccountRemoved,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vital=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Pending { limit, json } => run_pending(limit, json, &db_path).await?,
        Commands::Sync { api_url, token } => run_sync(&api_url, &token, &db_path).await?,
        Commands::ResetCursors => run_reset_cursors(&db_path).await?,
        Commands::Completions { shell } => run_completions(shell)?,
    }

    Ok(())
}

fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vital")
            .join("vital.db")
    })
}

#[derive(Debug, Serialize)]
struct StatusReport {
    pending: usize,
    cursors: Vec<CursorStatus>,
}

#[derive(Debug, Serialize)]
struct CursorStatus {
    source: String,
    watermark: Option<String>,
}

async fn run_status(json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = DataStoreService::open_path(db_path)?;

    let mut cursors = Vec::new();
    for kind in SourceKind::ALL {
        let watermark = store.cursor(kind).await?.map(|cursor| match cursor.watermark {
            vital_core::models::Watermark::ChangeToken(token) => format!("token:{token}"),
            vital_core::models::Watermark::Timestamp(at) => format!("since:{at}"),
        });
        cursors.push(CursorStatus {
            source: kind.to_string(),
            watermark,
        });
    }

    let report = StatusReport {
        pending: store.pending_count().await?,
        cursors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pending records: {}", report.pending);
        for cursor in &report.cursors {
            match &cursor.watermark {
                Some(watermark) => println!("  {}: {watermark}", cursor.source),
                None => println!("  {}: (no cursor)", cursor.source),
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct PendingItem {
    id: String,
    data_type: String,
    value: f64,
    start: String,
    end: String,
    attempts: usize,
}

async fn run_pending(limit: usize, json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = DataStoreService::open_path(db_path)?;
    let mut records = store.pending_records().await?;
    records.sort_by(|a, b| a.start_date_time.cmp(&b.start_date_time));
    records.truncate(limit);

    let items: Vec<PendingItem> = records
        .iter()
        .map(|record| PendingItem {
            id: record.id.to_string(),
            data_type: record.data_type.clone(),
            value: record.value,
            start: record.start_date_time.to_rfc3339(),
            end: record.end_date_time.to_rfc3339(),
            attempts: record.post_attempts.len(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("Outbox is empty");
    } else {
        for item in &items {
            println!(
                "{}  {}  {}  {} -> {}  ({} attempt(s))",
                item.id, item.data_type, item.value, item.start, item.end, item.attempts
            );
        }
    }
    Ok(())
}

async fn run_sync(api_url: &str, token: &str, db_path: &Path) -> Result<(), CliError> {
    let store = DataStoreService::open_path(db_path)?;
    let transport = HttpLogTransport::new(api_url)?;
    let pipeline = UploadPipeline::new(transport, StaticCredentials::new(token));

    let outcome = pipeline.post_batch(&store).await;
    if outcome.halted {
        return Err(CliError::AccountRemoved);
    }
    if !outcome.success {
        return Err(CliError::UploadFailed(
            outcome.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    println!("Delivered {} record(s)", outcome.delivered);
    println!(
        "Remaining in outbox: {}",
        store.pending_count().await?
    );
    Ok(())
}

async fn run_reset_cursors(db_path: &Path) -> Result<(), CliError> {
    let store = DataStoreService::open_path(db_path)?;
    store.reset_cursors().await?;
    println!("Cursors cleared; next pass re-extracts the current window");
    Ok(())
}

fn run_completions(shell: CompletionShell) -> Result<(), CliError> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    let mut out = io::stdout();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut command, name, &mut out),
        CompletionShell::Zsh => generate(shells::Zsh, &mut command, name, &mut out),
        CompletionShell::Fish => generate(shells::Fish, &mut command, name, &mut out),
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_db_path_wins() {
        let explicit = PathBuf::from("/tmp/custom.db");
        assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
    }

    #[test]
    fn default_db_path_ends_with_app_file() {
        let path = resolve_db_path(None);
        assert!(path.ends_with("vital/vital.db"));
    }

    #[test]
    fn cli_parses_sync_with_flags() {
        let cli = Cli::try_parse_from([
            "vital",
            "sync",
            "--api-url",
            "https://api.example.com",
            "--token",
            "abc",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Sync { .. }));
    }
}
