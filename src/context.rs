//! Engine context: one cache, one cached evaluator and the difficulty
//! estimator wired over them.
//!
//! Epistemic foundation:
//! - K_i: The probe reaches the engine through the same cache as full searches
//! - B_i: The cache file may not be writable at shutdown → logged, not fatal
//! - I^R: Budgets, thresholds and probe concurrency come from [`Config`]

use crate::cache::EvaluationCache;
use crate::client::UciEngine;
use crate::evaluation::{
    CachedEvaluator, DifficultyEstimator, Evaluator, MateEvidence, PositionAnalysis,
    ProbeEvaluator,
};
use crate::models::{Config, Difficulty, Evaluation, Result, SearchBudget};
use crate::pool::ProbePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the engine-facing components for one process.
///
/// Call [`EngineContext::shutdown`] when done; dropping without it still
/// makes a best-effort flush of the cache.
pub struct EngineContext {
    cache: Arc<EvaluationCache>,
    evaluator: Arc<CachedEvaluator>,
    estimator: DifficultyEstimator,
    budget: SearchBudget,
    shut_down: AtomicBool,
}

impl EngineContext {
    /// Context backed by the configured UCI binary and cache file.
    pub fn from_config(config: &Config) -> Self {
        let engine: Arc<dyn Evaluator> = Arc::new(UciEngine::from_config(&config.engine));
        let cache = Arc::new(EvaluationCache::from_config(&config.cache));
        Self::with_evaluator(config, engine, cache)
    }

    /// Context over an arbitrary evaluator and cache.
    pub fn with_evaluator(
        config: &Config,
        engine: Arc<dyn Evaluator>,
        cache: Arc<EvaluationCache>,
    ) -> Self {
        let evaluator = Arc::new(CachedEvaluator::new(
            engine,
            Arc::clone(&cache),
            config.engine.timeout_grace(),
        ));
        let probe = ProbeEvaluator::new(
            Arc::clone(&evaluator) as Arc<dyn Evaluator>,
            config.difficulty.probe_time_limit_secs,
            config.difficulty.probe_depth,
        );
        let probes = ProbePool::new(probe, config.difficulty.probe_workers);
        let estimator = DifficultyEstimator::new(&config.difficulty, probes);

        info!(
            engine_budget_secs = config.engine.time_limit_secs,
            probe_workers = config.difficulty.probe_workers,
            cached_positions = cache.len(),
            "Engine context ready"
        );

        Self {
            cache,
            evaluator,
            estimator,
            budget: config.engine.budget(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &Arc<EvaluationCache> {
        &self.cache
    }

    pub fn evaluator(&self) -> &Arc<CachedEvaluator> {
        &self.evaluator
    }

    /// Evaluate at an explicit budget, through the cache.
    pub async fn evaluate(&self, position: &str, budget: &SearchBudget) -> Result<Evaluation> {
        self.evaluator.evaluate(position, budget).await
    }

    /// Estimate difficulty from an already known score and mate distance.
    pub async fn estimate_difficulty(
        &self,
        score: i32,
        mate: Option<i32>,
        position: Option<&str>,
    ) -> Result<Difficulty> {
        self.estimator
            .estimate(score, MateEvidence::Distance(mate), position)
            .await
    }

    /// Evaluate `position` at the default budget and classify it.
    pub async fn analyze_position(&self, position: &str) -> Result<PositionAnalysis> {
        let evaluation = self.evaluator.evaluate(position, &self.budget).await?;
        let score = evaluation.score.unwrap_or_else(|| {
            warn!(position = position, "Evaluation has no score, treating as level");
            0
        });

        // Cached results keep only the projected mate, not the raw engine score.
        let evidence = if evaluation.metadata.engine_score.is_some() {
            MateEvidence::Metadata(&evaluation.metadata)
        } else {
            MateEvidence::Distance(evaluation.mate)
        };
        let difficulty = self
            .estimator
            .estimate(score, evidence, Some(position))
            .await?;
        debug!(score = score, mate = ?evaluation.mate, %difficulty, "Position analyzed");

        Ok(PositionAnalysis {
            position: position.to_string(),
            score: evaluation.score,
            mate: evaluation.mate,
            difficulty,
            pv: evaluation.metadata.pv,
        })
    }

    /// Persist the cache. Later drops do not flush again.
    pub fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        self.cache.flush()?;
        info!(cached_positions = self.cache.len(), "Engine context shut down");
        Ok(())
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        if !self.shut_down.load(Ordering::SeqCst) {
            self.cache.flush_best_effort();
        }
    }
}
