mod apify;
mod batch;
mod config;
mod domain;
mod merge;
mod pipeline;
mod program;
mod progress;
mod report;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::apify::http::ApifyApi;
use crate::apify::ExtractionClient;
use crate::config::{Config, ConfigError};
use crate::pipeline::ChunkOptions;
use crate::program::ExtractionProgram;
use crate::progress::ConsoleSink;
use crate::store::{RecordStore, StoreError};

#[derive(Parser)]
#[command(name = "enf_enrich", about = "ENF Solar installer directory scraper + enricher via Apify")]
struct Cli {
    /// CSV dataset path
    #[arg(long, default_value = "data/enf_us_installers.csv")]
    store: PathBuf,
    /// Summary report path (default: next to the dataset)
    #[arg(long)]
    summary: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the directory listing and build a fresh dataset
    Init {
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        #[arg(long, default_value_t = config::TOTAL_LISTING_PAGES)]
        end_page: u32,
    },
    /// Visit each record's detail page for website, phone and address
    Enrich {
        /// Max records to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Records per remote job
        #[arg(long, default_value_t = 200)]
        chunk_size: usize,
    },
    /// Re-check only records still missing a primary website
    Rescrape {
        /// Max records to process (default: all missing)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 100)]
        chunk_size: usize,
    },
    /// Write the coverage summary report
    Report,
    /// Show dataset counts
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code(&e)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    code
}

/// Distinct exit codes per failure mode: 2 = store I/O, 3 = configuration,
/// 1 = anything else.
fn exit_code(e: &anyhow::Error) -> ExitCode {
    if e.downcast_ref::<StoreError>().is_some() {
        ExitCode::from(2)
    } else if e.downcast_ref::<ConfigError>().is_some() {
        ExitCode::from(3)
    } else {
        ExitCode::from(1)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env(cli.store, cli.summary);

    match cli.command {
        Commands::Init { start_page, end_page } => {
            let client = connect(&config).await?;
            let mut store = pipeline::new_store(&config.store_path);
            println!("Scraping listing pages {}..={}...", start_page, end_page);
            let outcome = pipeline::harvest_listing(
                &mut store,
                &client,
                config::LISTING_BASE_URL,
                start_page,
                end_page,
            )
            .await?;
            println!(
                "Saved {} entries ({} raw rows from {} pages) to {}",
                outcome.unique,
                outcome.rows,
                outcome.pages,
                config.store_path.display()
            );
            write_summary(&store, &config)?;
            Ok(())
        }
        Commands::Enrich { limit, chunk_size } => {
            let chunk_size = config::validate_chunk_size(chunk_size)?;
            let mut store = RecordStore::load(&config.store_path)?;
            if store.is_empty() {
                println!("Dataset is empty. Run 'init' first.");
                return Ok(());
            }
            println!("Loaded {} records from {}", store.len(), store.path().display());

            // Backup, then sort by listing page, before the first mutation.
            store.save_as(&config.backup_path())?;
            println!("Backup saved to {}", config.backup_path().display());
            store.sort_by_numeric("source_page");
            store.save()?;

            let client = connect(&config).await?;
            let mut sink = ConsoleSink::new();
            let indices = pipeline::select_all(&store);
            let outcome = pipeline::enrich(
                &mut store,
                &client,
                &ExtractionProgram::detail(),
                indices,
                limit,
                &ChunkOptions {
                    chunk_size,
                    chunk_pause: config.chunk_pause,
                },
                &mut sink,
            )
            .await?;
            println!(
                "Done: {} records in {} batches, {} websites found ({} without URL skipped).",
                outcome.selected, outcome.chunks, outcome.gained, outcome.skipped_no_url
            );
            write_summary(&store, &config)?;
            Ok(())
        }
        Commands::Rescrape { limit, chunk_size } => {
            let chunk_size = config::validate_chunk_size(chunk_size)?;
            let mut store = RecordStore::load(&config.store_path)?;
            let missing = pipeline::select_missing(&store);
            if missing.is_empty() {
                println!("No records missing a primary website.");
                return Ok(());
            }
            println!(
                "Found {} of {} records missing website_url_primary",
                missing.len(),
                store.len()
            );

            let client = connect(&config).await?;
            let mut sink = ConsoleSink::new();
            let outcome = pipeline::enrich(
                &mut store,
                &client,
                &ExtractionProgram::rescrape(),
                missing,
                limit,
                &ChunkOptions {
                    chunk_size,
                    chunk_pause: config.chunk_pause,
                },
                &mut sink,
            )
            .await?;

            let summary = report::render_rescrape(outcome.selected, outcome.gained);
            println!("{summary}");
            let path = config.store_path.with_file_name("enf_rescrape_summary.txt");
            std::fs::write(&path, &summary)
                .with_context(|| format!("cannot write {}", path.display()))?;
            Ok(())
        }
        Commands::Report => {
            let store = RecordStore::load(&config.store_path)?;
            write_summary(&store, &config)?;
            println!("Summary written to {}", config.summary_path.display());
            Ok(())
        }
        Commands::Stats => {
            let store = RecordStore::load(&config.store_path)?;
            let cov = report::coverage(
                &store,
                &report::COVERAGE_FIELDS,
                "area",
                report::TOP_AREAS,
            );
            println!("Total records: {}", cov.total);
            println!("Columns: {}", store.columns().join(", "));
            for f in &cov.fields {
                println!(
                    "  {:<24} {:>6} present ({:>5.1}%)",
                    f.field,
                    f.present,
                    f.percent()
                );
            }
            println!("Multiple websites: {}", cov.multi_website);
            println!(
                "Missing primary website: {}",
                pipeline::select_missing(&store).len()
            );
            Ok(())
        }
    }
}

/// Build the platform client and check the credential actually works.
async fn connect(config: &Config) -> anyhow::Result<ExtractionClient> {
    let token = config.require_token()?;
    let api = ApifyApi::new(config.api_base.clone(), token);
    let client = ExtractionClient::new(Box::new(api), config.poll_interval);
    let user = client.verify_connection().await?;
    println!("Connected as: {user}");
    Ok(client)
}

fn write_summary(store: &RecordStore, config: &Config) -> anyhow::Result<()> {
    let cov = report::coverage(
        store,
        &report::COVERAGE_FIELDS,
        "area",
        report::TOP_AREAS,
    );
    let text = report::render(&cov);
    println!("{text}");
    std::fs::write(&config.summary_path, &text)
        .with_context(|| format!("cannot write {}", config.summary_path.display()))?;
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
