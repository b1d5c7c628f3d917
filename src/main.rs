use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod analysis;
mod config;
mod console;
mod db;
mod error;
mod models;
mod report;
mod session;
mod store;
mod survey;

use crate::config::AppConfig;
use crate::error::SurveyError;
use crate::models::Criterion;
use crate::report::ReportExporter;
use crate::store::{MemoryStore, TableStore};

#[derive(Parser)]
#[command(name = "customer-survey")]
#[command(about = "Customer satisfaction survey collection and analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive customer/owner program (default)
    Run {
        /// Keep every sheet in memory instead of Postgres
        #[arg(long)]
        ephemeral: bool,
    },
    /// Create or upgrade the database schema and header rows
    InitDb,
    /// Load a few realistic survey responses
    Seed,
    /// Print averages computed from the current survey responses
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Load an exported report file into the report sheet
    ImportReport {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("customer_survey=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err @ SurveyError::Configuration(_)) => {
            eprintln!("{err}");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    let command = cli.command.unwrap_or(Commands::Run { ephemeral: false });

    if let Commands::InitDb = command {
        let Some(pool) = connect(&config).await? else {
            return Ok(ExitCode::FAILURE);
        };
        db::init_db(&pool).await?;
        println!("Schema ready.");
        return Ok(ExitCode::SUCCESS);
    }

    let store: Box<dyn TableStore> = if let Commands::Run { ephemeral: true } = command {
        Box::new(MemoryStore::new())
    } else {
        let Some(pool) = connect(&config).await? else {
            return Ok(ExitCode::FAILURE);
        };
        Box::new(db::PgTableStore::new(pool))
    };

    match command {
        Commands::Run { .. } => {
            let secret = match config.require_owner_secret() {
                Ok(secret) => secret,
                Err(err) => {
                    eprintln!("{err}");
                    return Ok(ExitCode::FAILURE);
                }
            };
            let stdin = std::io::stdin();
            let console = console::Console::new(stdin.lock(), std::io::stdout());
            let exporter = ReportExporter::new(config.report_path.clone());
            let mut session =
                session::Session::new(store.as_ref(), secret, exporter, console);
            match session.run().await {
                Ok(()) | Err(SurveyError::InputClosed) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Commands::InitDb => {}
        Commands::Seed => {
            let ids = db::seed(store.as_ref()).await?;
            println!("Seeded {} survey responses.", ids.len());
        }
        Commands::Summary { json } => {
            let snapshot = analysis::SurveyAnalyzer::new(store.as_ref())
                .current_snapshot()
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let last_id = survey::SurveyRecorder::new(store.as_ref())
                    .get_last_customer_id()
                    .await?;
                println!("Responses: {} (last customer id {last_id})", snapshot.response_count);
                for criterion in Criterion::ALL {
                    println!("- {}: {}", criterion, snapshot.average(criterion));
                }
            }
        }
        Commands::ImportReport { csv } => {
            let exporter = ReportExporter::new(csv.unwrap_or_else(|| config.report_path.clone()));
            let rows = exporter.parse()?;
            let inserted = db::import_report(store.as_ref(), &rows).await?;
            println!(
                "Imported {inserted} report rows from {}.",
                exporter.path().display()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// `None` after printing the error when no database is configured.
async fn connect(config: &AppConfig) -> anyhow::Result<Option<PgPool>> {
    let database_url = match config.require_database_url() {
        Ok(url) => url,
        Err(err) => {
            eprintln!("{err}");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(Some(pool))
}
