use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use fourlep_common::Config;
use fourlep_core::gcs_reader::is_gcs_uri;
use fourlep_core::s3_reader::is_s3_uri;
use fourlep_core::{
    export_csv, export_json, print_summary, read_inventory_parallel, resolve_paths, run_all,
    sources_from_config, HzzAnalysis, LocalExecutor, WeightTable,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fourlep", version, about = "Four-lepton invariant mass histogramming")]
struct Cli {
    /// log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill data and MC histograms for every configured dataset
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// weight table (TOML or JSON), overrides [weights] table_path
        #[arg(long)]
        weights: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        format: Option<String>,
    },
    /// Per-file event counts and sample names, read from Parquet footers
    Inventory { path: String },
    /// Write the default configuration to the user config directory
    Init,
    /// Print shell completions
    Completions { shell: Shell },
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose { "fourlep=debug" } else { "fourlep=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    match cli.command {
        Commands::Run { config, weights, output, format } => run_analysis(config, weights, output, format).await?,
        Commands::Inventory { path } => run_inventory(path).await?,
        Commands::Init => run_init()?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "fourlep", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(p) => Config::load_from(p).map_err(|e| anyhow::anyhow!("{}: {e}", p.display()))?,
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}"))?,
    };
    Ok(config)
}

fn load_weights(config: &Config, path: Option<PathBuf>) -> anyhow::Result<WeightTable> {
    let lumi = config.analysis.luminosity_pb;
    match path.or_else(|| config.weights.table_path.as_ref().map(PathBuf::from)) {
        Some(p) => WeightTable::load(&p, lumi).map_err(|e| anyhow::anyhow!("{e}")),
        None => {
            // data-only runs need no table; any MC batch will fail with UnknownSample
            tracing::warn!("no weight table configured");
            Ok(WeightTable::new(lumi, HashMap::new()))
        }
    }
}

async fn run_analysis(
    config_path: Option<PathBuf>,
    weights_path: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref())?;
    if config.datasets.is_empty() {
        anyhow::bail!("no [[dataset]] entries configured (see {})", Config::config_path().display());
    }
    let weights = Arc::new(load_weights(&config, weights_path)?);
    tracing::info!(samples = weights.len(), luminosity_pb = weights.luminosity_pb(), "weight table ready");
    let sources = sources_from_config(&config).await.map_err(|e| anyhow::anyhow!("{e}"))?;
    let processor = Arc::new(HzzAnalysis::from_config(&config, weights));
    let executor = LocalExecutor::from_config(&config.analysis, config.s3.endpoint_url.clone());

    let t0 = Instant::now();
    let result = run_all(&executor, processor, &sources).await.map_err(|e| {
        // keep the failing category and its cause in the message
        match std::error::Error::source(&e) {
            Some(cause) => anyhow::anyhow!("{e}: {cause}"),
            None => anyhow::anyhow!("{e}"),
        }
    })?;
    println!("execution took {:.2} seconds", t0.elapsed().as_secs_f64());
    print_summary(&result);

    let format = format.unwrap_or_else(|| config.export.format.clone());
    let out_path = match output {
        Some(o) => o,
        None => Path::new(&config.export.output_dir).join(format!("histograms.{format}")),
    };
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match format.as_str() {
        "json" => export_json(&out_path, &result).map_err(|e| anyhow::anyhow!("{e}"))?,
        "csv" => export_csv(&out_path, &result).map_err(|e| anyhow::anyhow!("{e}"))?,
        _ => anyhow::bail!("Unknown format: {format} (use json or csv)"),
    }
    println!("Exported to {}", out_path.display());
    Ok(())
}

async fn run_inventory(input_path: String) -> anyhow::Result<()> {
    if is_s3_uri(&input_path) || is_gcs_uri(&input_path) {
        anyhow::bail!("inventory reads local files only: {input_path}");
    }
    let paths = resolve_paths(&input_path, None).await.map_err(|e| anyhow::anyhow!("{e}"))?;
    if paths.is_empty() {
        anyhow::bail!("No Parquet files found: {input_path}");
    }
    let inventory = tokio::task::spawn_blocking(move || read_inventory_parallel(&paths))
        .await?
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    for f in &inventory.files {
        let sample = f.sample.as_deref().unwrap_or("-");
        println!("{:<60} {:<24} {:>10} events {:>4} row groups", f.path, sample, f.event_count, f.row_group_count);
        if !f.missing_columns.is_empty() {
            println!("  missing: {}", f.missing_columns.join(", "));
        }
    }
    println!("{:<20} {}", "Files:", inventory.file_count);
    println!("{:<20} {}", "Events:", inventory.total_events);
    println!("{:<20} {}", "Bytes:", inventory.total_bytes);
    Ok(())
}

fn run_init() -> anyhow::Result<()> {
    let path = Config::config_path();
    if path.exists() {
        anyhow::bail!("config already exists: {}", path.display());
    }
    Config::default().save().map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Wrote {}", path.display());
    Ok(())
}
