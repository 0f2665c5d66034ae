//! Command-line relation resolver.
//!
//! Loads a level configuration and its datasets into the memory store,
//! resolves one geography's relations and prints them as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use georelate::store::load_memory_store;
use georelate::{
    parse_range_km, Config, LevelRegistry, RelationMode, ResolveOptions, Resolver, RootRow,
    TopologyOptions,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "georelate")]
#[command(about = "Resolve spatial relations between geographic levels")]
struct Args {
    /// Geo identifier to resolve, e.g. 05000US36001
    geo_id: String,

    /// Relation mode: children, parents, intersects, distance or neighbors
    #[arg(short, long, default_value = "intersects")]
    mode: String,

    /// Built-in level preset
    #[arg(long, default_value = "acs")]
    preset: String,

    /// Level configuration file (overrides --preset)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding <schema>/<table>.geojson and .csv datasets
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Levels to skip (comma-separated)
    #[arg(long, value_delimiter = ',')]
    skip_level: Option<Vec<String>>,

    /// Only visit these levels (comma-separated)
    #[arg(long, value_delimiter = ',')]
    target_levels: Option<Vec<String>>,

    /// Include overlap ratios
    #[arg(long)]
    overlap_size: bool,

    /// Radius in kilometers (distance mode)
    #[arg(long)]
    range_km: Option<String>,

    /// Include display names
    #[arg(long)]
    display_name: bool,

    /// Group rows by level
    #[arg(long)]
    group_by_level: bool,

    /// Emit a topology payload instead of rows
    #[arg(long)]
    topology: bool,

    /// Coordinate decimal places for topology output
    #[arg(long, default_value = "6")]
    precision: u32,

    /// Grid quantization for topology output
    #[arg(long)]
    quantization: Option<f64>,

    /// Synthetic root row policy: auto, always or never
    #[arg(long, default_value = "auto")]
    root_row: RootRow,

    /// Keep boundary-touch matches in intersects mode
    #[arg(long)]
    keep_negligible: bool,

    /// Evaluate every level geometrically
    #[arg(long)]
    no_shortcuts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading level configuration from {}", path.display());
            Config::load_from_file(path)?
        }
        None => Config::preset(&args.preset)
            .with_context(|| format!("Unknown preset '{}'", args.preset))??,
    };
    let registry = Arc::new(LevelRegistry::from_config(config).context("Invalid level configuration")?);

    let store = load_memory_store(&registry, &args.data_dir)
        .with_context(|| format!("Failed to load datasets from {}", args.data_dir.display()))?;

    let mode: RelationMode = args.mode.parse()?;
    let range_km = match mode {
        RelationMode::Distance => Some(parse_range_km(args.range_km.as_deref())?),
        _ => None,
    };

    let options = ResolveOptions {
        skip_levels: args.skip_level,
        target_levels: args.target_levels,
        overlap_size: args.overlap_size,
        range_km,
        display_name: args.display_name,
        group_by_level: args.group_by_level,
        topology: args.topology.then_some(TopologyOptions {
            precision: args.precision,
            quantization: args.quantization,
        }),
        root_row: args.root_row,
        filter_negligible: !args.keep_negligible,
        use_shortcuts: !args.no_shortcuts,
    };

    let resolver = Resolver::new(registry, store);
    let resolution = resolver
        .resolve_relations(&args.geo_id, mode, &options)
        .await
        .with_context(|| format!("Failed to resolve {} relations of {}", mode, args.geo_id))?;

    println!("{}", serde_json::to_string_pretty(&resolution)?);

    Ok(())
}
