//! Configuration models for tactica.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file; every
//! section has defaults, so an empty file is a valid configuration.

use super::{ScoringWeights, SearchBudget};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Top-level configuration for tactica.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Content generation endpoint
    #[serde(default)]
    pub llm: LlmConfig,

    /// External UCI engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Durable evaluation cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Difficulty estimation thresholds and probe budget
    #[serde(default)]
    pub difficulty: DifficultyConfig,

    /// Candidate selection
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Lesson assembly
    #[serde(default)]
    pub lesson: LessonConfig,

    /// Practice item store
    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// OpenAI-compatible content endpoint.
///
/// K_i: Any chat-completions endpoint works (hosted or on-prem).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (can also be set via the env var named by `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Model used for all lesson text
    #[serde(default)]
    pub model: ModelSpec,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_max_retries() -> u32 {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            model: ModelSpec::default(),
        }
    }
}

/// Specification for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model ID as the endpoint knows it
    #[serde(default = "default_model_id")]
    pub id: String,

    /// Input price per 1M tokens (USD) - set to 0 for on-prem
    #[serde(default)]
    pub input_price_per_1m: f64,

    /// Output price per 1M tokens (USD) - set to 0 for on-prem
    #[serde(default)]
    pub output_price_per_1m: f64,

    /// Maximum tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            id: default_model_id(),
            input_price_per_1m: 0.0,
            output_price_per_1m: 0.0,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// UCI engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine binary
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,

    /// Default wall-clock limit per evaluation
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f64,

    /// Default minimum search depth
    #[serde(default = "default_min_depth")]
    pub min_depth: u32,

    /// Default MultiPV line count
    #[serde(default = "default_line_count")]
    pub line_count: u32,

    /// Slack added to the time limit before an evaluation is abandoned
    #[serde(default = "default_timeout_grace_ms")]
    pub timeout_grace_ms: u64,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}

fn default_time_limit() -> f64 {
    3.0
}

fn default_min_depth() -> u32 {
    25
}

fn default_line_count() -> u32 {
    3
}

fn default_timeout_grace_ms() -> u64 {
    250
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            time_limit_secs: default_time_limit(),
            min_depth: default_min_depth(),
            line_count: default_line_count(),
            timeout_grace_ms: default_timeout_grace_ms(),
        }
    }
}

impl EngineConfig {
    pub fn budget(&self) -> SearchBudget {
        SearchBudget::new(self.time_limit_secs, self.min_depth, self.line_count)
    }

    pub fn timeout_grace(&self) -> Duration {
        Duration::from_millis(self.timeout_grace_ms)
    }
}

/// Evaluation cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Durable cache file
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Entries older than this are treated as absent
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: f64,

    /// Flush to disk every Nth insertion
    #[serde(default = "default_flush_every")]
    pub flush_every: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("position_cache.json")
}

fn default_max_age_hours() -> f64 {
    24.0
}

fn default_flush_every() -> u64 {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_age_hours: default_max_age_hours(),
            flush_every: default_flush_every(),
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs_f64(self.max_age_hours.max(0.0) * 3600.0)
    }
}

/// Difficulty estimation thresholds (centipawns) and probe budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Mate in one counts as beginner only above this score
    #[serde(default = "default_mate_in_one_threshold")]
    pub mate_in_one_threshold: i32,

    /// Advantage considered decisive
    #[serde(default = "default_decisive_threshold")]
    pub decisive_threshold: i32,

    /// Advantages above this (and not decisive) are intermediate
    #[serde(default = "default_advanced_threshold")]
    pub advanced_threshold: i32,

    /// Probe time limit per reply
    #[serde(default = "default_probe_time_limit")]
    pub probe_time_limit_secs: f64,

    /// Probe search depth
    #[serde(default = "default_probe_depth")]
    pub probe_depth: u32,

    /// Concurrent probe evaluations
    #[serde(default = "default_probe_workers")]
    pub probe_workers: usize,
}

fn default_mate_in_one_threshold() -> i32 {
    500
}

fn default_decisive_threshold() -> i32 {
    1000
}

fn default_advanced_threshold() -> i32 {
    200
}

fn default_probe_time_limit() -> f64 {
    1.0
}

fn default_probe_depth() -> u32 {
    10
}

fn default_probe_workers() -> usize {
    4
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            mate_in_one_threshold: default_mate_in_one_threshold(),
            decisive_threshold: default_decisive_threshold(),
            advanced_threshold: default_advanced_threshold(),
            probe_time_limit_secs: default_probe_time_limit(),
            probe_depth: default_probe_depth(),
            probe_workers: default_probe_workers(),
        }
    }
}

impl DifficultyConfig {
    pub fn probe_budget(&self) -> SearchBudget {
        SearchBudget::probe(self.probe_time_limit_secs, self.probe_depth)
    }
}

/// Candidate selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Default scoring weights for requests built from the CLI
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Candidates fetched per requested item
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    /// Lower bound on candidates fetched
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Popularity at which the diversity component bottoms out
    #[serde(default = "default_popularity_scale")]
    pub popularity_scale: f64,
}

fn default_oversample_factor() -> usize {
    3
}

fn default_min_candidates() -> usize {
    50
}

fn default_popularity_scale() -> f64 {
    1000.0
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            oversample_factor: default_oversample_factor(),
            min_candidates: default_min_candidates(),
            popularity_scale: default_popularity_scale(),
        }
    }
}

/// Lesson assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonConfig {
    #[serde(default = "default_minutes_per_example")]
    pub minutes_per_example: u32,

    #[serde(default = "default_minutes_with_analysis")]
    pub minutes_per_example_with_analysis: u32,

    /// Generated text shorter than this is replaced by a fallback
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Show a progress bar while generating text
    #[serde(default)]
    pub show_progress: bool,
}

fn default_minutes_per_example() -> u32 {
    5
}

fn default_minutes_with_analysis() -> u32 {
    8
}

fn default_min_content_chars() -> usize {
    20
}

impl Default for LessonConfig {
    fn default() -> Self {
        Self {
            minutes_per_example: default_minutes_per_example(),
            minutes_per_example_with_analysis: default_minutes_with_analysis(),
            min_content_chars: default_min_content_chars(),
            show_progress: false,
        }
    }
}

/// Practice item store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// JSONL file of practice items
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,
}

fn default_repository_path() -> PathBuf {
    PathBuf::from("data/puzzles.jsonl")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Resolve the content endpoint API key from config or environment.
    ///
    /// B_i(api key available) → Result
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.llm.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.llm.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.llm.api_key_env.clone(),
        })
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern"));

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }
    result
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error
/// - I^B materialized: Missing required values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or llm.api_key in config")]
    MissingApiKey { env_var: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tactica.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.engine.min_depth, 25);
        assert_eq!(config.engine.line_count, 3);
        assert_eq!(config.cache.flush_every, 10);
        assert_eq!(config.cache.max_age(), Duration::from_secs(24 * 3600));
        assert_eq!(config.difficulty.decisive_threshold, 1000);
        assert_eq!(config.difficulty.probe_budget().line_count, 1);
        assert_eq!(config.selection.weights, ScoringWeights::default());
    }

    #[test]
    fn test_partial_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tactica.toml");
        std::fs::write(
            &path,
            r#"
[engine]
path = "/usr/games/stockfish"
time_limit_secs = 1.5

[selection.weights]
quality = 0.5
diversity = 0.0
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.engine.path, PathBuf::from("/usr/games/stockfish"));
        assert_eq!(config.engine.budget().time_limit_secs, 1.5);
        assert_eq!(config.engine.min_depth, 25);
        assert_eq!(config.selection.weights.quality, 0.5);
        assert_eq!(config.selection.weights.rating_fit, 0.3);
        assert_eq!(config.selection.weights.diversity, 0.0);
    }

    #[test]
    fn test_parse_error_names_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[engine\npath = 3").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_expand_env_vars_leaves_unset() {
        assert_eq!(
            expand_env_vars("key-${TACTICA_SURELY_UNSET_VAR}"),
            "key-${TACTICA_SURELY_UNSET_VAR}"
        );
    }
}
