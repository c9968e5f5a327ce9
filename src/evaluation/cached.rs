//! Cache-aware evaluation entry points.

use super::position::parse_position;
use super::Evaluator;
use crate::cache::EvaluationCache;
use crate::models::{Evaluation, LessonError, Result, SearchBudget};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Validates the position, consults the cache, and enforces the caller's
/// time budget as a hard upper bound on the underlying evaluator.
pub struct CachedEvaluator {
    inner: Arc<dyn Evaluator>,
    cache: Arc<EvaluationCache>,
    grace: Duration,
}

impl CachedEvaluator {
    pub fn new(inner: Arc<dyn Evaluator>, cache: Arc<EvaluationCache>, grace: Duration) -> Self {
        Self {
            inner,
            cache,
            grace,
        }
    }

    pub fn cache(&self) -> &Arc<EvaluationCache> {
        &self.cache
    }
}

#[async_trait]
impl Evaluator for CachedEvaluator {
    async fn evaluate(&self, position: &str, budget: &SearchBudget) -> Result<Evaluation> {
        parse_position(position)?;

        if let Some(hit) = self.cache.get(position, budget) {
            return Ok(hit);
        }

        let limit = Duration::from_secs_f64(budget.time_limit_secs.max(0.0)) + self.grace;
        let evaluation = tokio::time::timeout(limit, self.inner.evaluate(position, budget))
            .await
            .map_err(|_| LessonError::Timeout(limit))??;

        debug!(
            score = ?evaluation.score,
            mate = ?evaluation.mate,
            depth = ?evaluation.metadata.depth,
            "Position evaluated"
        );
        self.cache.set(position, budget, &evaluation);
        Ok(evaluation)
    }
}

/// Reduced-budget entry point used by the uniqueness probe.
///
/// Always evaluates a single line at the fixed probe budget. It holds only
/// an evaluator, so a probe can never trigger another probe.
#[derive(Clone)]
pub struct ProbeEvaluator {
    evaluator: Arc<dyn Evaluator>,
    budget: SearchBudget,
}

impl ProbeEvaluator {
    pub fn new(evaluator: Arc<dyn Evaluator>, time_limit_secs: f64, min_depth: u32) -> Self {
        Self {
            evaluator,
            budget: SearchBudget::probe(time_limit_secs, min_depth),
        }
    }

    pub fn budget(&self) -> &SearchBudget {
        &self.budget
    }

    /// Evaluate the position reached by one reply.
    pub async fn evaluate_reply(&self, position: &str) -> Result<Evaluation> {
        self.evaluator.evaluate(position, &self.budget).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockEvaluator;

    const FEN: &str = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";

    fn cached(mock: Arc<MockEvaluator>) -> CachedEvaluator {
        let cache = Arc::new(EvaluationCache::in_memory(Duration::from_secs(3600)));
        CachedEvaluator::new(mock, cache, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let mock = Arc::new(MockEvaluator::new().with_score(FEN, 350));
        let evaluator = cached(Arc::clone(&mock));
        let budget = SearchBudget::new(0.5, 12, 1);

        let first = evaluator.evaluate(FEN, &budget).await.unwrap();
        let second = evaluator.evaluate(FEN, &budget).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.calls(), 1);
        assert_eq!(evaluator.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_invalid_position_never_reaches_engine() {
        let mock = Arc::new(MockEvaluator::new());
        let evaluator = cached(Arc::clone(&mock));

        let err = evaluator
            .evaluate("8/8/8/8 w - -", &SearchBudget::new(0.5, 12, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LessonError::InvalidPosition { .. }));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_slow_engine_times_out() {
        let mock = Arc::new(MockEvaluator::new().with_delay(Duration::from_millis(500)));
        let evaluator = cached(Arc::clone(&mock));

        let err = evaluator
            .evaluate(FEN, &SearchBudget::new(0.05, 12, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LessonError::Timeout(_)));
        assert!(evaluator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_probe_uses_single_line_budget() {
        let mock = Arc::new(MockEvaluator::new());
        let probe = ProbeEvaluator::new(mock.clone(), 1.0, 10);
        probe.evaluate_reply(FEN).await.unwrap();

        assert_eq!(probe.budget().line_count, 1);
        assert_eq!(mock.budgets(), vec![SearchBudget::new(1.0, 10, 1)]);
    }
}
