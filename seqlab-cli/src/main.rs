//! SeqLab CLI: build sequence datasets from rate-limited bar downloads.
//!
//! Commands:
//! - `build`: fetch, enrich, normalize, and window a symbol list; write
//!   `dataset.json` and `report.json`
//! - `inspect-config`: print the effective configuration after defaults

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use seqlab_core::config::{load_symbols, EconomicSourceKind};
use seqlab_core::data::{
    CircuitBreaker, CsvEconomicSource, EnrichedStage, MarketDataSource, SyntheticSource,
    YahooSource,
};
use seqlab_core::normalize::ScalerRegistry;
use seqlab_core::pipeline::RunReport;
use seqlab_core::rate_limit::RateLimiter;
use seqlab_core::{IngestionPipeline, PipelineConfig, RunOutput};

#[derive(Parser)]
#[command(
    name = "seqlab",
    about = "SeqLab CLI: rate-limited bar ingestion into sequence datasets"
)]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build train/test tensors for a list of symbols.
    Build {
        /// Symbols to process (e.g., SPY QQQ AAPL).
        symbols: Vec<String>,

        /// JSON file holding an array of symbols, e.g. ["SPY", "QQQ"].
        #[arg(long)]
        symbols_file: Option<PathBuf>,

        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use deterministic synthetic bars instead of the network.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Stage enriched rows as Parquet here (overrides the config).
        #[arg(long)]
        stage_dir: Option<PathBuf>,

        /// Output directory for dataset.json and report.json.
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Print the effective configuration as TOML.
    InspectConfig {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Build {
            symbols,
            symbols_file,
            config,
            synthetic,
            stage_dir,
            out,
        } => run_build(symbols, symbols_file, config, synthetic, stage_dir, out),
        Commands::InspectConfig { config } => run_inspect_config(config),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_inspect_config(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    config.validate()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn run_build(
    mut symbols: Vec<String>,
    symbols_file: Option<PathBuf>,
    config_path: Option<PathBuf>,
    synthetic: bool,
    stage_dir: Option<PathBuf>,
    out: PathBuf,
) -> Result<()> {
    if let Some(path) = symbols_file {
        symbols.extend(
            load_symbols(&path)
                .with_context(|| format!("failed to read symbols from {}", path.display()))?,
        );
    }
    let symbols: Vec<String> = symbols
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        bail!("no symbols given; pass them as arguments or with --symbols-file");
    }

    let config = load_config(config_path.as_deref())?;
    let options = config.options(chrono::Local::now().naive_local());
    let cancel = config.cancel_token();

    // Retries go through the pipeline so every attempt is rate-limited.
    let market: Box<dyn MarketDataSource> = if synthetic {
        Box::new(SyntheticSource::new())
    } else {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        Box::new(YahooSource::new(breaker)?.with_retries(0))
    };

    let mut pipeline =
        IngestionPipeline::new(market, RateLimiter::new(config.rate_limit_policy()), options);

    if config.economic.source == EconomicSourceKind::Csv {
        let Some(path) = config.economic.csv_path.as_deref() else {
            bail!("economic.source = \"csv\" requires economic.csv_path");
        };
        let source = CsvEconomicSource::from_path(path)
            .with_context(|| format!("failed to read economic series {}", path.display()))?;
        info!(points = source.len(), path = %path.display(), "economic series loaded");
        pipeline = pipeline.with_economic(Box::new(source));
    }

    if let Some(dir) = stage_dir.or_else(|| config.stage_dir.clone()) {
        pipeline = pipeline.with_stage(EnrichedStage::new(dir));
    }

    let output = pipeline.run(&symbols, &cancel)?;
    print_summary(&output);

    std::fs::create_dir_all(&out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    write_json(&out.join("dataset.json"), &output.dataset)?;
    write_json(&out.join("report.json"), &RunArtifact::new(&output))?;
    println!("Artifacts saved to: {}", out.display());

    Ok(())
}

/// Contents of `report.json`.
#[derive(Serialize)]
struct RunArtifact<'a> {
    fingerprint: String,
    feature_names: &'a [String],
    x_train_shape: &'a [usize],
    x_test_shape: &'a [usize],
    report: &'a RunReport,
    scalers: &'a ScalerRegistry,
}

impl<'a> RunArtifact<'a> {
    fn new(output: &'a RunOutput) -> Self {
        Self {
            fingerprint: output.dataset.fingerprint(),
            feature_names: &output.dataset.feature_names,
            x_train_shape: output.dataset.x_train.shape(),
            x_test_shape: output.dataset.x_test.shape(),
            report: &output.report,
            scalers: &output.scalers,
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn print_summary(output: &RunOutput) {
    let report = &output.report;
    let ds = &output.dataset;

    println!();
    println!(
        "=== {} symbols: {} processed, {} skipped ===",
        report.outcomes.len(),
        report.processed_count(),
        report.skipped_count()
    );
    for o in &report.outcomes {
        match &o.skip {
            None => println!(
                "  {:<8} {:>6} bars  train {:>5}  purged {:>3}  test {:>5}",
                o.symbol, o.bars, o.train_sequences, o.purged_sequences, o.test_sequences
            ),
            Some(reason) => println!("  {:<8} skipped: {reason}", o.symbol),
        }
    }
    println!();
    println!("X_train:      {:?}", ds.x_train.shape());
    println!("X_test:       {:?}", ds.x_test.shape());
    println!("Features:     {}", ds.feature_names.join(", "));
    println!("Fingerprint:  {}", ds.fingerprint());
}
