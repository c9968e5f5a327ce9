//! Position evaluation and difficulty estimation.
//!
//! Epistemic foundation:
//! - K_i: The engine is an external oracle reached through [`Evaluator`]
//! - B_i: Each call may fail (bad position, engine gone) → Result, no retry
//! - I^B: Search time is bounded by the caller's budget plus a grace period
//!
//! The uniqueness probe reaches the engine only through [`ProbeEvaluator`],
//! which has no path back into [`DifficultyEstimator`].

mod cached;
mod difficulty;
pub mod position;

pub use cached::{CachedEvaluator, ProbeEvaluator};
pub use difficulty::{DifficultyEstimator, MateEvidence, PositionAnalysis};

use crate::models::{Evaluation, Result, SearchBudget};
use async_trait::async_trait;

/// External evaluation oracle.
///
/// Scores are reported from White's perspective, forced mates projected
/// through [`crate::models::MATE_SCORE`].
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, position: &str, budget: &SearchBudget) -> Result<Evaluation>;
}
