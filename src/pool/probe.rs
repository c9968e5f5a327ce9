//! Bounded worker pool for the one-ply uniqueness probe.
//!
//! Epistemic foundation:
//! - K_i: Reply evaluations share no mutable state → safe to run in parallel
//! - K_i: The decisive count is a sum, so completion order does not matter
//! - B_i: Each evaluation may fail → the first failure fails the probe

use crate::evaluation::position::Reply;
use crate::evaluation::ProbeEvaluator;
use crate::models::{LessonError, Result, MATE_SCORE};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Runs probe evaluations with at most `size` in flight.
pub struct ProbePool {
    probe: ProbeEvaluator,
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl ProbePool {
    pub fn new(probe: ProbeEvaluator, size: usize) -> Self {
        let size = size.max(1);
        Self {
            probe,
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Count replies that keep an advantage beyond `threshold` for the side
    /// that `root_score` favours.
    ///
    /// Checkmating replies count without an engine call; stalemates never do.
    pub async fn count_decisive(
        &self,
        replies: Vec<Reply>,
        root_score: i32,
        threshold: i32,
    ) -> Result<usize> {
        let direction = root_score.signum();
        let mut handles = Vec::with_capacity(replies.len());
        let mut decisive = 0usize;

        for reply in replies {
            if reply.checkmate {
                let score = if reply.mover_is_white { MATE_SCORE } else { -MATE_SCORE };
                if is_decisive(score, direction, threshold) {
                    decisive += 1;
                }
                continue;
            }
            if reply.stalemate {
                continue;
            }

            let probe = self.probe.clone();
            let semaphore = Arc::clone(&self.semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| LessonError::Internal("Probe semaphore closed".to_string()))?;
                let evaluation = probe.evaluate_reply(&reply.position).await?;
                Ok::<_, LessonError>((reply.uci, evaluation.score))
            }));
        }

        let mut first_error: Option<LessonError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok((uci, Some(score)))) => {
                    if is_decisive(score, direction, threshold) {
                        debug!(reply = %uci, score = score, "Decisive reply");
                        decisive += 1;
                    }
                }
                Ok(Ok((uci, None))) => {
                    debug!(reply = %uci, "Probe returned no score");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Probe evaluation failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Probe task panicked");
                    if first_error.is_none() {
                        first_error = Some(LessonError::Internal(format!("Probe task failed: {e}")));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(decisive),
        }
    }
}

/// True when `score` lies beyond `threshold` on the `direction` side.
fn is_decisive(score: i32, direction: i32, threshold: i32) -> bool {
    direction != 0 && (score as i64) * (direction as i64) > threshold as i64
}
