use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use lead_intake::config::AppConfig;
use lead_intake::logging::{init_logging, OperationTimer};
use lead_intake::metrics::MetricsCollector;
use lead_intake::models::{EditTarget, SheetEdit};
use lead_intake::repository::LeadRepository;
use lead_intake::schema::Column;
use lead_intake::server::{self, AppState};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve,
    /// Create the header row if missing and report its state
    Setup,
    /// Edit one cell and run the status relay
    Edit {
        /// Lead id of the row to edit
        #[arg(long, conflicts_with = "row")]
        lead_id: Option<String>,

        /// Sheet row number to edit (the header is row 1)
        #[arg(long)]
        row: Option<usize>,

        /// Column header or field name
        #[arg(long)]
        column: Column,

        /// New cell value
        #[arg(long)]
        value: String,
    },
    /// Compare the row count with the last check and notify on growth
    CheckChanges,
    /// Submit a lead as if it were posted to the webhook
    Submit {
        /// Raw request body
        #[arg(long)]
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging; the guard flushes the file writer on exit
    let log_file = config.logging.file_path.as_ref().map(PathBuf::from);
    let _log_guard = init_logging(
        Some(&config.get_log_level()),
        log_file.as_deref(),
        config.logging.format == "json",
    )?;
    MetricsCollector::init()?;

    info!(service = %config.server.service_name, "Starting lead-intake");

    match cli.command {
        Commands::Serve => server::serve(config).await?,
        Commands::Setup => setup(&config).await?,
        Commands::Edit {
            lead_id,
            row,
            column,
            value,
        } => edit(&config, lead_id, row, column, value).await?,
        Commands::CheckChanges => check_changes(&config).await?,
        Commands::Submit { json } => submit(&config, &json).await?,
    }

    Ok(())
}

/// Create or repair the header row
async fn setup(config: &AppConfig) -> Result<()> {
    let timer = OperationTimer::new("setup");
    let state = AppState::from_config(config)?;
    let status = state.repository.ensure_headers().await?;
    info!(?status, sheet = %config.sheet.name, "Sheet setup complete");
    timer.finish();
    Ok(())
}

/// Apply a manual edit through the status relay
async fn edit(config: &AppConfig, lead_id: Option<String>, row: Option<usize>, column: Column, value: String) -> Result<()> {
    let target = match (lead_id, row) {
        (Some(lead_id), _) => EditTarget::LeadId(lead_id),
        (None, Some(row)) => EditTarget::Row(row),
        (None, None) => anyhow::bail!("Either --lead-id or --row is required"),
    };

    let timer = OperationTimer::new("edit");
    let state = AppState::from_config(config)?;
    let outcome = state
        .relay
        .on_edit(SheetEdit { target, column, value })
        .await
        .context("Edit failed")?;
    info!(outcome = %serde_json::to_string(&outcome)?, "Edit applied");
    timer.finish();
    Ok(())
}

/// Run one pass of the change notifier
async fn check_changes(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config)?;
    let check = state.change_notifier.check().await?;
    info!(
        previous_rows = check.previous_rows,
        current_rows = check.current_rows,
        notified = check.notified,
        "Change check complete"
    );
    Ok(())
}

/// Push a body through the webhook pipeline
async fn submit(config: &AppConfig, body: &str) -> Result<()> {
    let state = AppState::from_config(config)?;
    let response = state.intake.handle_request(body.as_bytes(), &HashMap::new()).await;
    if !response.success {
        warn!(error = ?response.error, "Submission rejected");
    }
    info!(response = %serde_json::to_string(&response)?, "Submission handled");
    Ok(())
}
