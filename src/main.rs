use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use store_locator::config::Config;
use store_locator::enrich::EnrichmentPipeline;
use store_locator::export;
use store_locator::geocode::HttpGeocoder;
use store_locator::ingest;
use store_locator::logging;
use store_locator::storage::{InMemoryStore, JsonFileStore, StoreGateway};

#[derive(Parser)]
#[command(name = "store_locator")]
#[command(about = "Retail store record cleansing, dedup and geocode enrichment")]
#[command(version = "0.1.0")]
struct Cli {
    /// Storage backend for the record store
    #[arg(long, value_enum, default_value = "json")]
    store: StoreKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Durable JSON documents under the configured store directory
    Json,
    /// Ephemeral in-memory store (useful with `run`)
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest configured source files (normalize, dedup, upsert)
    Seed {
        /// Specific sources to ingest (comma-separated); defaults to the
        /// sources listed in config.toml
        #[arg(long)]
        sources: Option<String>,
    },
    /// Geocode every record still missing a valid location
    Geocode,
    /// Export cleansed, error-free stores as pretty-printed JSON
    Export,
    /// Run seed, geocode and export sequentially
    Run {
        #[arg(long)]
        sources: Option<String>,
    },
}

fn open_store(kind: StoreKind, config: &Config) -> anyhow::Result<Arc<dyn StoreGateway>> {
    Ok(match kind {
        StoreKind::Json => Arc::new(JsonFileStore::open(&config.data.store_dir)?),
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
    })
}

fn source_names(flag: Option<String>, config: &Config) -> Vec<String> {
    match flag {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => config.data.sources.clone(),
    }
}

async fn seed(
    gateway: Arc<dyn StoreGateway>,
    config: &Config,
    sources: Option<String>,
) -> anyhow::Result<()> {
    let names = source_names(sources, config);
    if names.is_empty() {
        println!("⚠️  No sources configured; nothing to seed");
        return Ok(());
    }
    let summary = ingest::run_ingest(gateway, &config.data.source_dir, &names).await?;
    println!("\n📊 Seed results:");
    println!("   Sources:        {}", summary.sources);
    println!("   Failed sources: {}", summary.failed_sources);
    println!("   Records saved:  {}", summary.records);
    println!("   Merged (dedup): {}", summary.deduped);
    Ok(())
}

async fn geocode(gateway: Arc<dyn StoreGateway>, config: &Config) -> anyhow::Result<()> {
    let geocoder = Arc::new(HttpGeocoder::new(&config.geocode)?);
    let pipeline = EnrichmentPipeline::new(
        gateway,
        geocoder,
        Duration::from_millis(config.geocode.delay_ms),
    );
    let summary = pipeline.run().await?;
    println!("\n📊 Geocode results:");
    println!("   Scanned:   {}", summary.scanned);
    println!("   Submitted: {}", summary.submitted);
    println!("   Located:   {}", summary.located);
    println!("   Failed:    {}", summary.failed);
    Ok(())
}

async fn export_stores(gateway: Arc<dyn StoreGateway>, config: &Config) -> anyhow::Result<()> {
    let path = export::to_file(gateway, &config.export.output_dir).await?;
    println!("✅ Exported stores to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let gateway = open_store(cli.store, &config)?;

    let result = match cli.command {
        Commands::Seed { sources } => {
            println!("🔄 Seeding store records...");
            seed(gateway, &config, sources).await
        }
        Commands::Geocode => {
            println!("📍 Populating missing geocode data...");
            geocode(gateway, &config).await
        }
        Commands::Export => {
            println!("📤 Exporting cleansed stores...");
            export_stores(gateway, &config).await
        }
        Commands::Run { sources } => {
            println!("🚀 Running full pipeline (seed + geocode + export)...");
            seed(gateway.clone(), &config, sources).await?;
            geocode(gateway.clone(), &config).await?;
            export_stores(gateway, &config).await
        }
    };

    if let Err(e) = &result {
        error!("Command failed: {}", e);
    }
    result
}
