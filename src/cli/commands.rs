//! CLI command definitions for puzzle-forge.
//!
//! - `generate`: one orchestration run
//! - `batch`: many runs with a difficulty progression
//! - `inspect`: offline fingerprint, components, pattern and structural profile

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agents::{
    AcceptedPuzzle, BatchReport, DifficultyProgression, ForgeEvent, UniquenessReport,
    UniquenessValidator,
};
use crate::categories::{CategoryRegistry, PuzzleCategory};
use crate::difficulty::{structural_profile, CategoryUsage, DifficultyLevel, DifficultyProfile};
use crate::diversity::{
    classify_pattern, extract_components, fingerprint, ContentComponents, Fingerprint,
    PatternType,
};
use crate::pipeline::{ForgeConfig, ForgeServices};
use crate::puzzle::{Candidate, GenerationBrief};
use crate::storage::{HistoricalStore, SqliteStore};

/// Capacity of the progress event channel.
const EVENT_BUFFER: usize = 100;

/// Emoji puzzle generator with uniqueness, difficulty and quality gates.
#[derive(Parser)]
#[command(name = "puzzle-forge")]
#[command(about = "Generate, de-duplicate, calibrate and quality-gate emoji puzzles")]
#[command(version)]
#[command(
    long_about = "puzzle-forge drives an LLM through generation, uniqueness, difficulty calibration and a two-stage quality review, retrying within a bounded budget.\n\nExample usage:\n  puzzle-forge generate --category movies --difficulty 4\n  puzzle-forge batch --count 6 --progression oscillating --min 3 --max 8"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file; FORGE_* variables override it.
    #[arg(long, global = true, env = "FORGE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate one puzzle.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Generate several puzzles with a difficulty progression.
    Batch(BatchArgs),

    /// Analyze a candidate file without calling a model.
    Inspect(InspectArgs),
}

/// Options shared by commands that call the model.
#[derive(clap::Args, Debug, Clone)]
pub struct ServiceArgs {
    /// API key (OpenRouter or LiteLLM proxy).
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL of an OpenAI-compatible endpoint.
    #[arg(long, env = "LITELLM_API_BASE")]
    pub api_base: Option<String>,

    /// Use one model for every tier.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// SQLite history file; history stays in memory when omitted.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Skip the adversarial review stage.
    #[arg(long)]
    pub no_adversarial: bool,

    /// Do not write accepted puzzles to history.
    #[arg(long)]
    pub no_persist: bool,

    /// Output JSON to stdout instead of progress lines.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `puzzle-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Puzzle category (movies, music, books, food, animals, places, idioms, science).
    #[arg(short = 'c', long, default_value = "movies")]
    pub category: PuzzleCategory,

    /// Target difficulty, 1-10.
    #[arg(short = 'd', long, default_value = "5", value_parser = clap::value_parser!(u8).range(1..=10))]
    pub difficulty: u8,

    /// Optional theme for the answer.
    #[arg(short = 't', long)]
    pub theme: Option<String>,

    /// Attempt budget for this run.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[command(flatten)]
    pub service: ServiceArgs,
}

/// Arguments for `puzzle-forge batch`.
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Number of puzzles to generate.
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Comma-separated categories, cycled across the batch (default: all).
    #[arg(short = 'c', long, value_delimiter = ',')]
    pub categories: Vec<PuzzleCategory>,

    /// Difficulty progression: linear, oscillating or random.
    #[arg(short = 'p', long, default_value = "linear")]
    pub progression: String,

    /// Lower difficulty bound (linear start).
    #[arg(long, default_value = "3")]
    pub min: u8,

    /// Upper difficulty bound (linear end).
    #[arg(long, default_value = "7")]
    pub max: u8,

    /// Seed for the random progression.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Attempt budget per item.
    #[arg(long)]
    pub attempts_per_item: Option<u32>,

    /// Items run concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Optional theme applied to every item.
    #[arg(short = 't', long)]
    pub theme: Option<String>,

    #[command(flatten)]
    pub service: ServiceArgs,
}

/// Arguments for `puzzle-forge inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// JSON file with content, answer, category and optional explanation.
    pub path: PathBuf,

    /// SQLite history to check uniqueness and category usage against.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments from the environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(cli.config.as_deref(), args).await,
        Commands::Batch(args) => run_batch_command(cli.config.as_deref(), args).await,
        Commands::Inspect(args) => run_inspect_command(args).await,
    }
}

// ============================================================================
// Configuration
// ============================================================================

fn load_config(path: Option<&Path>, service: &ServiceArgs) -> anyhow::Result<ForgeConfig> {
    let config = match path {
        Some(path) => ForgeConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ForgeConfig::default(),
    };
    let mut config = config.apply_env()?;

    if let Some(key) = &service.api_key {
        config.api_key = Some(key.clone());
        if config.api_base.is_none() {
            config.api_base = Some(crate::pipeline::OPENROUTER_API_BASE.to_string());
        }
    }
    if let Some(base) = &service.api_base {
        config.api_base = Some(base.clone());
    }
    if let Some(model) = &service.model {
        config.models = crate::llm::ModelTiers::uniform(model.clone());
    }
    if let Some(path) = &service.database {
        config.database_path = Some(path.clone());
    }
    if service.no_adversarial {
        config.run_adversarial = false;
    }
    if service.no_persist {
        config.persist = false;
    }

    config.validate()?;
    Ok(config)
}

/// Prints progress events until the channel closes.
fn spawn_progress_printer(mut rx: mpsc::Receiver<ForgeEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ForgeEvent::RunStarted {
                    category,
                    target_difficulty,
                    max_attempts,
                    ..
                } => eprintln!(
                    "▶ {} at difficulty {} ({} attempts)",
                    category, target_difficulty, max_attempts
                ),
                ForgeEvent::StageStarted { attempt, stage, .. } => {
                    eprintln!("  [{}] {}", attempt, stage)
                }
                ForgeEvent::DuplicateDiscarded {
                    attempt, similarity, ..
                } => eprintln!("  [{}] duplicate (similarity {:.2})", attempt, similarity),
                ForgeEvent::AttemptScored {
                    attempt,
                    final_score,
                    verdict,
                    ..
                } => eprintln!("  [{}] scored {:.1} ({})", attempt, final_score, verdict),
                ForgeEvent::AttemptFailed {
                    attempt,
                    stage,
                    error,
                    ..
                } => eprintln!("  [{}] {} failed: {}", attempt, stage, error),
                ForgeEvent::Accepted {
                    answer,
                    final_score,
                    degraded,
                    ..
                } => eprintln!(
                    "✓ accepted '{}' at {:.1}{}",
                    answer,
                    final_score,
                    if degraded { " (best so far)" } else { "" }
                ),
                ForgeEvent::Exhausted {
                    attempts,
                    best_score,
                    ..
                } => eprintln!(
                    "✗ no acceptable puzzle after {} attempts (best {})",
                    attempts,
                    best_score.map_or("none".to_string(), |s| format!("{:.1}", s))
                ),
                ForgeEvent::Aborted {
                    error, reset_at, ..
                } => match reset_at {
                    Some(reset_at) => eprintln!("✗ aborted: {} (resets {})", error, reset_at),
                    None => eprintln!("✗ aborted: {}", error),
                },
            }
        }
    })
}

// ============================================================================
// Generate
// ============================================================================

async fn run_generate_command(config_path: Option<&Path>, args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = load_config(config_path, &args.service)?;
    if let Some(attempts) = args.max_attempts {
        config = config.with_max_attempts(attempts);
        config.validate()?;
    }

    let services = ForgeServices::start(config).await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let printer = (!args.service.json).then(|| spawn_progress_printer(rx));
    let events = printer.as_ref().map(|_| tx);

    let orchestrator = services.orchestrator(events)?;
    let mut brief = GenerationBrief::new(args.category, args.difficulty);
    if let Some(theme) = args.theme {
        brief = brief.with_theme(theme);
    }

    let result = orchestrator.run(&brief).await;
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let outcome = match result {
        Ok(puzzle) => {
            if args.service.json {
                println!("{}", serde_json::to_string_pretty(&puzzle)?);
            } else {
                print_puzzle(&puzzle);
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e)),
    };

    services.shutdown().await?;
    outcome
}

fn print_puzzle(puzzle: &AcceptedPuzzle) {
    let candidate = &puzzle.candidate;
    println!("\n=== Puzzle {} ===", puzzle.id());
    println!("Puzzle:      {}", candidate.content());
    println!("Answer:      {}", candidate.answer());
    println!("Category:    {}", candidate.category());
    println!("Pattern:     {}", puzzle.pattern);
    println!(
        "Difficulty:  {} (proposed {}, {})",
        puzzle.calibrated_difficulty(),
        candidate.proposed_difficulty(),
        puzzle.calibration.recommendation
    );
    println!("Final score: {:.1} ({})", puzzle.final_score, puzzle.quality.verdict());
    println!("Uniqueness:  {:.1}", puzzle.uniqueness_score);
    println!(
        "Attempts:    {} of budget{}",
        puzzle.attempts_used,
        if puzzle.degraded { ", accepted as best so far" } else { "" }
    );
    if !candidate.explanation().is_empty() {
        println!("Explanation: {}", candidate.explanation());
    }
    for (i, hint) in candidate.hints().iter().enumerate() {
        println!("Hint {}:      {}", i + 1, hint);
    }
    for item in &puzzle.quality.decision.action_items {
        println!("  - {}", item);
    }
}

// ============================================================================
// Batch
// ============================================================================

async fn run_batch_command(config_path: Option<&Path>, args: BatchArgs) -> anyhow::Result<()> {
    let config = load_config(config_path, &args.service)?;
    let progression = DifficultyProgression::from_name(&args.progression, args.min, args.max, args.seed)
        .map_err(|e| anyhow::anyhow!(e))?;

    let mut batch_config = config.batch_config(args.count).with_progression(progression);
    if !args.categories.is_empty() {
        batch_config = batch_config.with_categories(args.categories.clone());
    }
    if let Some(attempts) = args.attempts_per_item {
        batch_config = batch_config.with_attempts_per_item(attempts);
    }
    if let Some(concurrency) = args.concurrency {
        batch_config = batch_config.with_concurrency(concurrency);
    }
    if let Some(theme) = &args.theme {
        batch_config = batch_config.with_theme(theme.clone());
    }

    let services = ForgeServices::start(config).await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let printer = (!args.service.json).then(|| spawn_progress_printer(rx));
    let events = printer.as_ref().map(|_| tx);

    let batch = services.batch(batch_config, events)?;
    let report = batch.run().await;
    drop(batch);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if args.service.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch(&report);
    }

    services.shutdown().await?;

    if let Some(reason) = &report.halted_reason {
        warn!(reason = %reason, "Batch halted early");
    }
    Ok(())
}

fn print_batch(report: &BatchReport) {
    println!("\n=== Batch Results ===");
    println!("Requested:   {}", report.requested);
    println!("Accepted:    {}", report.accepted.len());
    println!("Failed:      {}", report.failures.len());
    println!("Success:     {:.0}%", report.success_rate() * 100.0);
    if let Some(reason) = &report.halted_reason {
        println!("Halted:      {}", reason);
    }
    println!();
    for puzzle in &report.accepted {
        println!(
            "  {} -> {} [{} / {} / d{} / {:.1}]",
            puzzle.candidate.content(),
            puzzle.candidate.answer(),
            puzzle.candidate.category(),
            puzzle.pattern,
            puzzle.calibrated_difficulty(),
            puzzle.final_score
        );
    }
    for failure in &report.failures {
        println!(
            "  #{} {} d{}: {}",
            failure.index + 1,
            failure.category,
            failure.target_difficulty,
            failure.error
        );
    }

    let diversity = &report.diversity;
    println!("\nPattern entropy:  {:.2}", diversity.pattern_entropy);
    println!("Category entropy: {:.2}", diversity.category_entropy);
    println!("Pattern Gini:     {:.2}", diversity.pattern_gini);
    if !diversity.repeated_patterns.is_empty() {
        println!("Repeated:         {}", diversity.repeated_patterns.join(", "));
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Candidate file accepted by `inspect`.
#[derive(Debug, Clone, Deserialize)]
pub struct InspectInput {
    pub content: String,
    pub answer: String,
    pub category: PuzzleCategory,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default = "default_inspect_difficulty")]
    pub difficulty: u8,
}

fn default_inspect_difficulty() -> u8 {
    5
}

/// Offline analysis of one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub fingerprint: Fingerprint,
    pub components: ContentComponents,
    pub pattern: PatternType,
    pub structural: DifficultyProfile,
    pub structural_level: DifficultyLevel,
    pub uniqueness: Option<UniquenessReport>,
}

/// Analyzes a candidate against an optional history.
pub async fn inspect_candidate(
    candidate: &Candidate,
    store: Option<Arc<dyn HistoricalStore>>,
) -> anyhow::Result<InspectReport> {
    let registry = CategoryRegistry::with_defaults();
    let strategy = registry
        .get(candidate.category())
        .with_context(|| format!("no strategy for category {}", candidate.category()))?;

    let (uniqueness, usage) = match store {
        Some(store) => {
            let validator = UniquenessValidator::new(store, Default::default());
            let assessment = validator.validate(candidate).await?;
            (Some(assessment.report), assessment.category_usage)
        }
        None => (None, CategoryUsage::default()),
    };

    let components = extract_components(candidate.content());
    let structural = structural_profile(candidate, strategy, &usage);
    Ok(InspectReport {
        fingerprint: fingerprint(candidate),
        pattern: classify_pattern(&components, candidate.explanation()),
        components,
        structural_level: DifficultyLevel::from_value(structural.overall.round() as u8),
        structural,
        uniqueness,
    })
}

async fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let input: InspectInput = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a candidate JSON object", args.path.display()))?;
    let candidate = Candidate::new(
        input.content,
        input.answer,
        input.category,
        input.explanation,
        input.hints,
        input.difficulty,
    );

    let store: Option<Arc<dyn HistoricalStore>> = match &args.database {
        Some(path) => Some(Arc::new(SqliteStore::open(path).await?)),
        None => None,
    };
    info!(answer = %candidate.answer(), history = store.is_some(), "Inspecting candidate");
    let report = inspect_candidate(&candidate, store.clone()).await?;
    if let Some(store) = store {
        store.close().await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n=== Inspect: {} ===", candidate.answer());
    println!("Fingerprint: {}", report.fingerprint);
    println!("Pattern:     {}", report.pattern);
    let join = |set: &std::collections::BTreeSet<String>| {
        set.iter().cloned().collect::<Vec<_>>().join(" ")
    };
    println!("Symbols:     {}", join(&report.components.symbols));
    println!("Numbers:     {}", join(&report.components.numbers));
    println!("Arrows:      {}", join(&report.components.directionals));
    println!("Text:        {}", join(&report.components.text));
    let s = &report.structural;
    println!(
        "Structural:  {:.1} ({:?}) visual {:.1}, steps {:.1}, knowledge {:.1}, vocabulary {:.1}, novelty {:.1}",
        s.overall,
        report.structural_level,
        s.visual_ambiguity,
        s.cognitive_steps,
        s.background_knowledge,
        s.vocabulary_level,
        s.pattern_novelty
    );
    if let Some(uniqueness) = &report.uniqueness {
        println!(
            "Uniqueness:  {:.1} (unique: {}, nearest {:.2})",
            uniqueness.uniqueness_score(),
            uniqueness.is_unique,
            uniqueness.nearest_similarity
        );
        for recommendation in &uniqueness.recommendations {
            println!("  - {}", recommendation);
        }
    }
    Ok(())
}
