use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use paperlink_config::{AppConfig, ConfigLoader, ConfigWatcher};
use paperlink_db::export::{default_export_range, parse_export_date};
use paperlink_db::{ExportFormat, Store};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paperlink", version, about = "Paperlink - PDF sharing service")]
struct Cli {
    /// Path to the config file (defaults to paperlink.yml, then
    /// ~/.paperlink/config.{yml,toml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gateway server (the default)
    Serve,
    /// Apply pending database migrations and show the result
    Migrate,
    /// Show migration and database status
    Status,
    /// Write a backup of the database
    Backup,
    /// Restore the database from a backup file
    Restore {
        /// Backup filename inside the backup directory
        filename: String,
    },
    /// Wipe the database and rebuild the schema (a backup is taken first)
    Reset {
        /// Type RESET to confirm
        #[arg(long)]
        confirm: String,
    },
    /// Export audit logs for a date range
    ExportLogs {
        /// Output format: csv or json
        #[arg(long, default_value = "csv")]
        format: String,
        /// Start date (YYYY-MM-DD), defaults to 30 days ago
        #[arg(long)]
        start_date: Option<String>,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end_date: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            if let Some(path) = cli.config.clone() {
                watch_config(path, config.clone());
            }
            paperlink_gateway::GatewayServer::new(config).run().await?;
        }
        Command::Migrate => {
            let store = open_store(&config)?;
            let report = store.run_pending()?;
            println!("{}", report.summary());
            if let Some(failure) = &report.failed {
                bail!("migration '{}' failed: {}", failure.name, failure.reason);
            }
        }
        Command::Status => {
            let store = open_store(&config)?;
            println!("database: {}", config.database_path().display());
            println!("documents: {}", store.document_count()?);
            println!("migrations:");
            for status in store.migration_statuses()? {
                match &status.applied_at {
                    Some(at) => println!("  [x] {} ({})", status.name, at.to_rfc3339()),
                    None => println!("  [ ] {}", status.name),
                }
            }
        }
        Command::Backup => {
            let store = open_store(&config)?;
            let path = store.backup(&config.backup_dir())?;
            println!("backup written to {}", path.display());
        }
        Command::Restore { filename } => {
            paperlink_security::safe_backup_filename(&filename)?;
            let store = open_store(&config)?;
            store.restore(&config.backup_dir().join(&filename))?;
            println!("database restored from {filename}");
        }
        Command::Reset { confirm } => {
            paperlink_security::confirm_destructive(&confirm)?;
            let store = open_store(&config)?;
            let backup = store.reset(&config.backup_dir())?;
            println!("database reset, backup at {}", backup.display());
        }
        Command::ExportLogs {
            format,
            start_date,
            end_date,
            output,
        } => {
            let format: ExportFormat = format.parse()?;
            let (default_start, default_end) = default_export_range();
            let start = match start_date.as_deref() {
                Some(s) => parse_export_date(s)?,
                None => default_start,
            };
            let end = match end_date.as_deref() {
                Some(s) => parse_export_date(s)?,
                None => default_end,
            };

            let store = open_store(&config)?;
            let rendered = store.export_audit_logs(start, end, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("logs exported to {}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

/// Watch an explicitly given config file and log when it changes. Gateway
/// binding and tokens are read at startup, so changes apply on restart.
fn watch_config(path: PathBuf, initial: AppConfig) {
    match ConfigWatcher::start(path, initial) {
        Ok((watcher, mut rx)) => {
            tokio::spawn(async move {
                let _watcher = watcher;
                while rx.changed().await.is_ok() {
                    tracing::info!("config file changed; restart to apply new settings");
                }
            });
        }
        Err(e) => tracing::warn!("config watcher failed to start: {e}"),
    }
}

fn open_store(config: &AppConfig) -> anyhow::Result<Store> {
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let store = Store::open(&config.database_path())?;
    Ok(store)
}
