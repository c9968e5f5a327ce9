//! tactica CLI - Chess tactics lessons and engine-backed difficulty estimates.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tactica::content::ContentWriter;
use tactica::pipeline::{ExampleSelector, LessonPipeline};
use tactica::{
    Config, EngineContext, EvaluationCache, GenerationRequest, JsonlRepository, LLMClient, Tag,
    Tier,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tactica")]
#[command(version)]
#[command(about = "Chess tactics lessons from a puzzle repository, with engine-backed difficulty")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "tactica.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a lesson for a tag and tier
    Lesson {
        #[command(flatten)]
        request: RequestArgs,

        /// Use the plain templates instead of the content endpoint
        #[arg(long)]
        offline: bool,

        /// Write the lesson JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a lesson from explicit puzzle ids
    Custom {
        /// Lesson title (defaults to the tier title)
        #[arg(long, default_value = "")]
        title: String,

        #[arg(long)]
        tag: String,

        #[arg(long, default_value = "intermediate")]
        tier: String,

        /// Comma-separated puzzle ids, in lesson order
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,

        #[arg(long)]
        no_analysis: bool,

        #[arg(long)]
        offline: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what a lesson would contain without generating text
    Preview {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Evaluate a position and estimate its difficulty
    Estimate {
        /// Position in FEN
        #[arg(long)]
        fen: String,
    },

    /// Inspect or maintain the evaluation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Count repository items per tag
    Tags,

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print cache statistics
    Stats,
    /// Drop expired entries
    Cleanup,
    /// Remove every entry and the cache file
    Clear,
}

#[derive(Args)]
struct RequestArgs {
    /// Tactic tag (e.g. fork, pin, mateIn2)
    #[arg(long)]
    tag: String,

    /// beginner, intermediate, advanced or expert
    #[arg(long, default_value = "intermediate")]
    tier: String,

    /// Number of examples
    #[arg(short = 'n', long, default_value = "5")]
    count: usize,

    /// Top-K by score instead of progressive rating bins
    #[arg(long)]
    flat: bool,

    /// Skip the per-example analysis step
    #[arg(long)]
    no_analysis: bool,

    #[arg(long)]
    min_rating: Option<u32>,

    #[arg(long)]
    max_rating: Option<u32>,

    #[arg(long)]
    min_quality: Option<f64>,
}

impl RequestArgs {
    fn build(&self, config: &Config) -> Result<GenerationRequest> {
        let mut builder = GenerationRequest::parse(&self.tag, &self.tier)?
            .count(self.count)
            .progressive(!self.flat)
            .include_analysis(!self.no_analysis)
            .weights(config.selection.weights);
        if let Some(q) = self.min_quality {
            builder = builder.min_quality(q);
        }
        if let Some(r) = self.min_rating {
            builder = builder.rating_min(r);
        }
        if let Some(r) = self.max_rating {
            builder = builder.rating_max(r);
        }
        Ok(builder.build()?)
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

fn load_repository(config: &Config) -> Result<JsonlRepository> {
    JsonlRepository::load(&config.repository.path)
        .with_context(|| format!("Failed to load puzzles from {:?}", config.repository.path))
}

/// Writer backed by the content endpoint, or the plain templates when
/// offline or no API key resolves.
fn content_writer(config: &Config, offline: bool) -> Result<ContentWriter> {
    if offline {
        return Ok(ContentWriter::offline(&config.lesson));
    }
    match config.resolve_api_key() {
        Ok(key) => {
            let client = LLMClient::new(&config.llm, Some(key), None)
                .context("Failed to create content client")?;
            info!(model = %config.llm.model.id, "Using content endpoint");
            Ok(ContentWriter::new(Arc::new(client), &config.lesson))
        }
        Err(e) => {
            warn!(error = %e, "No API key, lesson text will use templates");
            Ok(ContentWriter::offline(&config.lesson))
        }
    }
}

fn lesson_pipeline(config: &Config, offline: bool) -> Result<LessonPipeline> {
    let repository = Arc::new(load_repository(config)?);
    let selector = ExampleSelector::new(repository, &config.selection);
    let writer = content_writer(config, offline)?;
    Ok(LessonPipeline::new(selector, writer, &config.lesson))
}

fn emit_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {path:?}"))?;
            info!(path = %path.display(), "Output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_example_config() {
    let example = r#"# tactica configuration file

[llm]
# API key (can also use the env var named by api_key_env)
# api_key = "sk-..."
api_key_env = "OPENAI_API_KEY"
base_url = "https://api.openai.com/v1"
timeout_secs = 180
max_retries = 3
model = { id = "gpt-4o-mini", max_tokens = 800, temperature = 0.7 }

[engine]
path = "stockfish"
time_limit_secs = 3.0
min_depth = 25
line_count = 3
timeout_grace_ms = 250

[cache]
path = "position_cache.json"
max_age_hours = 24.0
flush_every = 10

[difficulty]
mate_in_one_threshold = 500
decisive_threshold = 1000
advanced_threshold = 200
probe_time_limit_secs = 1.0
probe_depth = 10
probe_workers = 4

[selection]
oversample_factor = 3
min_candidates = 50
popularity_scale = 1000.0
weights = { quality = 0.4, rating_fit = 0.3, tag_relevance = 0.2, diversity = 0.1 }

[lesson]
minutes_per_example = 5
minutes_per_example_with_analysis = 8
min_content_chars = 20
show_progress = true

[repository]
path = "data/puzzles.jsonl"
"#;
    println!("{example}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            config.selection.weights.validate()?;

            info!("Configuration is valid");
            info!(
                "  Engine: {:?} ({}s, depth {})",
                config.engine.path, config.engine.time_limit_secs, config.engine.min_depth
            );
            info!("  Cache: {:?}", config.cache.path);
            info!("  Repository: {:?}", config.repository.path);
            match config.resolve_api_key() {
                Ok(_) => info!("  Content model: {}", config.llm.model.id),
                Err(e) => warn!("  Content endpoint disabled: {e}"),
            }
            return Ok(());
        }

        Commands::Lesson {
            request,
            offline,
            output,
        } => {
            let config = load_config(&cli.config)?;
            let request = request.build(&config)?;
            let pipeline = lesson_pipeline(&config, offline)?;
            let lesson = pipeline
                .generate(&request)
                .await
                .context("Lesson generation failed")?;
            emit_json(&lesson, output.as_deref())?;
        }

        Commands::Custom {
            title,
            tag,
            tier,
            ids,
            no_analysis,
            offline,
            output,
        } => {
            let config = load_config(&cli.config)?;
            let pipeline = lesson_pipeline(&config, offline)?;
            let lesson = pipeline
                .generate_custom(&title, Tag::parse(&tag), Tier::parse(&tier), &ids, !no_analysis)
                .await
                .context("Custom lesson failed")?;
            emit_json(&lesson, output.as_deref())?;
        }

        Commands::Preview { request } => {
            let config = load_config(&cli.config)?;
            let request = request.build(&config)?;
            let pipeline = lesson_pipeline(&config, true)?;
            let preview = pipeline.preview(&request).await?;

            println!("\n=== Lesson Preview ===");
            println!("Title:       {}", preview.title);
            println!("Examples:    {}", preview.example_count);
            println!("Steps:       {}", preview.step_count);
            println!(
                "Ratings:     {}-{} (avg {:.0})",
                preview.rating_range.0, preview.rating_range.1, preview.avg_rating
            );
            println!("Quality:     {:.2}", preview.avg_quality);
            println!(
                "Tags:        {}",
                preview
                    .tags_covered
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("Minutes:     {}", preview.estimated_minutes);
            println!("Progressive: {}", preview.progressive);
        }

        Commands::Estimate { fen } => {
            let config = load_config(&cli.config)?;
            let context = EngineContext::from_config(&config);
            let analysis = context
                .analyze_position(&fen)
                .await
                .context("Position analysis failed")?;
            context.shutdown()?;
            emit_json(&analysis, None)?;
        }

        Commands::Cache { action } => {
            let config = load_config(&cli.config)?;
            let cache = EvaluationCache::from_config(&config.cache);
            match action {
                CacheAction::Stats => println!("{}", cache.stats()),
                CacheAction::Cleanup => {
                    let removed = cache.cleanup_expired();
                    println!("Removed {removed} expired entries");
                }
                CacheAction::Clear => {
                    cache.clear();
                    println!("Cache cleared");
                }
            }
        }

        Commands::Tags => {
            let config = load_config(&cli.config)?;
            let repository = load_repository(&config)?;
            println!("{} items", repository.len());
            for (tag, count) in repository.tag_counts() {
                println!("  {:<20} {count}", tag.to_string());
            }
        }
    }

    Ok(())
}
