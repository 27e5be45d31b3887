//! Ace-Pace command-line interface.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acepace_core::ops::{self, meta, RefreshOptions};
use acepace_core::{
    build_client, load_config, load_config_from_env, validate_config, AddTorrentOptions, Config,
    HttpFetcher, LibraryStore, SqliteIndex, SqliteLibrary,
};

/// Conventional exit code for a SIGINT-terminated run.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "acepace", version)]
#[command(about = "Find missing One Pace episodes in your local library", long_about = None)]
struct Cli {
    /// Configuration file path.
    #[arg(long, env = "ACEPACE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the library, traverse the remote listing, and write the
    /// missing-episode report
    Report {
        /// Folder containing local video files
        #[arg(short, long)]
        folder: Option<PathBuf>,
    },

    /// Update the episode index from the remote listing
    RefreshIndex {
        /// Refresh even if the index was updated recently
        #[arg(long)]
        force: bool,

        /// Resolve magnet links for indexed episodes that lack one
        #[arg(long)]
        backfill_magnets: bool,
    },

    /// Rename catalogued files to their canonical index titles
    Rename {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export the library cache to CSV
    Export,

    /// Hand the missing report's magnet links to the torrent client
    Download {
        /// Show what would be added without touching the client
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing up");
                cancel.cancel();
            }
        });
    }

    match run(cli, &cancel).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => {
            warn!("Run was interrupted, results are partial");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("Fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration from the given file, a `config.toml` next to the
/// binary, or environment variables alone.
fn load(config_path: Option<&PathBuf>) -> Result<Config> {
    let config = match config_path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let default = PathBuf::from("config.toml");
            if default.exists() {
                load_config(&default).context("Failed to load config.toml")?
            } else {
                load_config_from_env().context("Failed to load config from environment")?
            }
        }
    };
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Folder precedence: flag, then config, then the last used folder.
fn resolve_folder(
    flag: Option<PathBuf>,
    config: &Config,
    library: &dyn LibraryStore,
) -> Result<PathBuf> {
    if let Some(folder) = flag {
        return Ok(folder);
    }
    if let Some(folder) = &config.library.folder {
        return Ok(folder.clone());
    }
    if let Some(last) = library.metadata_get(meta::LAST_FOLDER)? {
        info!(folder = %last, "Reusing last folder");
        return Ok(PathBuf::from(last));
    }
    bail!("No library folder specified (use --folder or set library.folder)");
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<bool> {
    let config = load(cli.config.as_ref())?;

    match cli.command {
        Commands::Report { folder } => {
            let library = SqliteLibrary::new(&config.library.database)?;
            let folder = resolve_folder(folder, &config, &library)?;
            let fetcher = HttpFetcher::new(config.listing.timeout_secs);

            let outcome =
                ops::run_report(&library, &fetcher, &config, &folder, cancel).await?;

            println!(
                "{} missing episodes out of {} found remotely ({} new since last report)",
                outcome.missing, outcome.remote_total, outcome.new_since_last_export
            );
            if outcome.integrity_errors > 0 {
                println!(
                    "WARNING: {} entries written with placeholder titles",
                    outcome.integrity_errors
                );
            }
            println!("Report written to {}", config.report.missing_csv.display());
            Ok(outcome.interrupted)
        }

        Commands::RefreshIndex {
            force,
            backfill_magnets,
        } => {
            let index = SqliteIndex::new(&config.index.database)?;
            let fetcher = HttpFetcher::new(config.listing.timeout_secs);
            let options = RefreshOptions {
                force,
                backfill_magnets,
            };

            let outcome = ops::run_refresh(&index, &fetcher, &config, &options, cancel).await?;

            if outcome.skipped_cooldown {
                println!("Index refreshed recently, nothing to do (use --force to override)");
            } else {
                println!(
                    "Indexed {} episodes ({} magnets backfilled)",
                    outcome.indexed, outcome.magnets_backfilled
                );
            }
            Ok(outcome.interrupted)
        }

        Commands::Rename { yes } => {
            let library = SqliteLibrary::new(&config.library.database)?;
            let index = SqliteIndex::new(&config.index.database)?;

            let plan = ops::plan_rename(&library, &index)?;
            if plan.is_empty() {
                println!("No files to rename.");
                return Ok(false);
            }

            println!("Rename plan:");
            for action in &plan {
                println!(
                    "  {} -> {}",
                    action.from.file_name().unwrap_or_default().to_string_lossy(),
                    action.to.file_name().unwrap_or_default().to_string_lossy()
                );
            }
            println!("{} files will be renamed.", plan.len());

            if !yes && !confirm("Proceed with renaming?")? {
                println!("Renaming aborted.");
                return Ok(false);
            }

            let outcome = ops::execute_rename_plan(&library, &plan)?;
            println!(
                "Renamed {} files ({} skipped, {} failed)",
                outcome.renamed, outcome.skipped_existing, outcome.failed
            );
            Ok(false)
        }

        Commands::Export => {
            let library = SqliteLibrary::new(&config.library.database)?;
            let outcome = ops::run_export(&library, &config.report.library_csv)?;
            println!(
                "Exported {} entries to {}",
                outcome.rows,
                config.report.library_csv.display()
            );
            Ok(false)
        }

        Commands::Download { dry_run } => {
            let client_config = config
                .client
                .clone()
                .context("No [client] section configured")?;
            let client = build_client(&client_config);
            let options = AddTorrentOptions {
                download_folder: client_config.download_folder.clone(),
                tags: client_config.tags.clone(),
                category: client_config.category.clone(),
                dry_run,
            };

            let outcome = ops::run_download(
                client.as_ref(),
                &config.report.missing_csv,
                &options,
                cancel,
            )
            .await?;

            println!(
                "{} added, {} already present, {} invalid, {} failed (of {} magnets)",
                outcome.summary.added,
                outcome.summary.already_present,
                outcome.summary.invalid,
                outcome.summary.failed,
                outcome.magnets
            );
            Ok(outcome.summary.interrupted)
        }
    }
}
