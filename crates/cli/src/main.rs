use anyhow::Result;
use carbonwatch_core::Category;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::ManualEntry;
use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "carbonwatch", version, about = "Estimate the carbon footprint of bank statements")]
struct Cli {
    /// Settings file (defaults to config.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the settings file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Owner of the stored records (defaults to `default_user` from settings)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a CSV or Excel bank statement
    Import {
        file: PathBuf,

        /// Parse and report without storing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a transaction by hand
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        category: Category,

        #[arg(long)]
        amount: Decimal,

        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,

        /// kg CO₂; estimated from the amount when omitted
        #[arg(long)]
        carbon: Option<Decimal>,

        #[arg(long)]
        description: Option<String>,
    },
    /// Show stored transactions and their total footprint
    List {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let user = cli.user.unwrap_or_else(|| settings.default_user.clone());
    let db_path = match cli.db {
        Some(p) => p,
        None => settings.database_path()?,
    };

    match cli.command {
        Command::Import { file, dry_run, json } => {
            let pipeline = settings.import.build_pipeline();
            let pool = if dry_run {
                None
            } else {
                Some(commands::open_db(&db_path).await?)
            };
            let result =
                commands::import_statement(&pipeline, settings.max_file_bytes, &file, &user, pool.as_ref())
                    .await?;
            commands::print_import(&result, json)?;
        }
        Command::Add {
            name,
            category,
            amount,
            date,
            carbon,
            description,
        } => {
            let pool = commands::open_db(&db_path).await?;
            let entry = ManualEntry {
                name,
                category,
                amount,
                date,
                carbon,
                description,
            };
            let (id, record) = commands::add_manual(&settings, &pool, &user, entry).await?;
            println!(
                "Added #{}: {} ({}) {} with {}",
                id.0, record.name, record.category, record.amount, record.carbon
            );
        }
        Command::List { json } => {
            let pool = commands::open_db(&db_path).await?;
            let (records, total) = commands::list(&pool, &user).await?;
            commands::print_list(&records, total, json)?;
        }
    }

    Ok(())
}
