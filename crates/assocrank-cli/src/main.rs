//! assocrank — Target–disease association scoring.
//! Entry point for the command-line binary.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use assocrank_common::PairKey;
use assocrank_config::Config;
use assocrank_db::extract::{extract_file, ExtractStats};
use assocrank_db::{
    DryRunSink, EnumerationFilter, EvidenceRepository, JsonlScoreSink, MemoryEvidenceRepository,
    ScoreSink,
};
use assocrank_pipeline::{scorer_from_config, PipelineOptions, ScoringPipeline};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RunOverrides;

#[derive(Parser, Debug)]
#[command(name = "assocrank")]
#[command(about = "Compute aggregated target-disease association scores from scored evidence")]
#[command(version)]
struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, env = "ASSOCRANK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every (target, disease) pair in an evidence file
    Score(ScoreArgs),
    /// Project evidence documents into score-map rows and report counts
    Extract(ExtractArgs),
    /// Evidence row count per datasource for one pair
    Breakdown(BreakdownArgs),
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Evidence documents, one JSON object per line
    #[arg(short, long)]
    evidence: Option<PathBuf>,

    /// Directory the JSON-lines sink writes under
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    namespace: Option<String>,

    /// Fetch workers (0 = 4 per core)
    #[arg(long = "num-workers")]
    fetch_workers: Option<usize>,

    /// Compute workers (0 = 1 per core)
    #[arg(long)]
    compute_workers: Option<usize>,

    /// Capacity of each inter-stage queue
    #[arg(long = "max-queued-events")]
    queue_capacity: Option<usize>,

    #[arg(long)]
    chunk_size: Option<usize>,

    /// Score and count, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Only pairs backed by direct evidence
    #[arg(long)]
    only_direct: bool,

    /// Restrict to these target ids
    #[arg(long, value_delimiter = ',')]
    targets: Vec<String>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[arg(short, long)]
    evidence: Option<PathBuf>,

    /// Also write the rows as JSON lines here
    #[arg(long)]
    rows_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BreakdownArgs {
    #[arg(short, long)]
    evidence: Option<PathBuf>,

    #[arg(long)]
    target: String,

    #[arg(long)]
    disease: String,
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load(cli.config.as_deref())?;
    let overrides = match &cli.command {
        Command::Score(args) => RunOverrides {
            evidence: args.evidence.clone(),
            output_dir: args.output_dir.clone(),
            namespace: args.namespace.clone(),
            fetch_workers: args.fetch_workers,
            compute_workers: args.compute_workers,
            queue_capacity: args.queue_capacity,
            chunk_size: args.chunk_size,
            dry_run: args.dry_run,
            only_direct: args.only_direct,
            targets: args.targets.clone(),
            log_level: cli.log_level.clone(),
        },
        Command::Extract(ExtractArgs { evidence, .. })
        | Command::Breakdown(BreakdownArgs { evidence, .. }) => RunOverrides {
            evidence: evidence.clone(),
            log_level: cli.log_level.clone(),
            ..RunOverrides::default()
        },
    };
    config::apply(&mut cfg, &overrides)?;
    init_tracing(&cfg.logging.level);

    match cli.command {
        Command::Score(_) => score(&cfg).await,
        Command::Extract(args) => extract(&cfg, args.rows_out).await,
        Command::Breakdown(args) => breakdown(&cfg, PairKey::new(args.target, args.disease)).await,
    }
}

async fn load_repository(cfg: &Config) -> Result<(MemoryEvidenceRepository, ExtractStats)> {
    let path = &cfg.input.evidence_path;
    let (rows, stats) = extract_file(path)
        .await
        .with_context(|| format!("Failed to read evidence from {}", path.display()))?;
    let filter = EnumerationFilter {
        only_direct: cfg.input.only_direct,
        targets: cfg.input.targets.clone(),
    };
    let repo = MemoryEvidenceRepository::from_rows(rows).with_filter(filter);
    Ok((repo, stats))
}

async fn score(cfg: &Config) -> Result<()> {
    let (repo, stats) = load_repository(cfg).await?;
    info!(
        documents = stats.documents,
        rows = stats.rows,
        pairs = repo.len(),
        "Evidence loaded"
    );

    let sink: Arc<dyn ScoreSink> = if cfg.storage.dry_run {
        info!("Dry run: results will not be written");
        Arc::new(DryRunSink::new())
    } else {
        Arc::new(JsonlScoreSink::new(&cfg.storage.output_dir))
    };

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping pipeline");
            on_signal.cancel();
        }
    });

    let pipeline = ScoringPipeline::new(
        repo,
        sink,
        scorer_from_config(cfg),
        PipelineOptions::from_config(cfg),
    )
    .with_shutdown(shutdown);

    let summary = pipeline.run().await.context("Scoring run failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn extract(cfg: &Config, rows_out: Option<PathBuf>) -> Result<()> {
    let path = &cfg.input.evidence_path;
    let (rows, stats) = extract_file(path)
        .await
        .with_context(|| format!("Failed to read evidence from {}", path.display()))?;

    if let Some(out) = rows_out {
        let mut buf = Vec::new();
        for row in &rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }
        tokio::fs::write(&out, buf)
            .await
            .with_context(|| format!("Failed to write rows to {}", out.display()))?;
        info!(path = %out.display(), rows = rows.len(), "Wrote score-map rows");
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn breakdown(cfg: &Config, key: PairKey) -> Result<()> {
    let (repo, _) = load_repository(cfg).await?;
    let counts = repo
        .count_evidence_by_datasource(&key)
        .await
        .with_context(|| format!("Failed to count evidence for {key}"))?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
