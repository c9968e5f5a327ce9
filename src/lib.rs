//! tactica - Chess tactics lessons built from a puzzle repository.
//!
//! ## Architecture
//!
//! tactica has two halves that share the data models:
//! - **Lesson pipeline**: Select examples → Write text → Assemble and validate
//! - **Engine context**: Cached UCI evaluation → Difficulty estimation with a
//!   bounded one-ply uniqueness probe
//!
//! ## Selection
//!
//! - **Flat**: Top-K candidates by weighted score
//! - **Progressive**: Three rating bins inside the resolved bounds, ascending output
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Engine, network and disk uncertainties (timeouts, fallbacks)

pub mod cache;
pub mod client;
pub mod content;
pub mod context;
pub mod evaluation;
pub mod mocks;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod repository;

// Re-exports for convenience
pub use cache::EvaluationCache;
pub use client::{LLMClient, RateLimiter, UciEngine};
pub use content::{ContentGenerator, ContentWriter};
pub use context::EngineContext;
pub use evaluation::{DifficultyEstimator, Evaluator, PositionAnalysis};
pub use models::{
    Config, Difficulty, GenerationRequest, Lesson, LessonError, PracticeItem, Result, Tag, Tier,
};
pub use pipeline::{ExampleSelector, LessonAssembler, LessonPipeline, Selection};
pub use repository::{JsonlRepository, PuzzleRepository};
