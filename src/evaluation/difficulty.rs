//! Coarse difficulty estimation from an engine evaluation.
//!
//! Priority order:
//! 1. The position is already checkmate → beginner
//! 2. Forced mate: in 1 → beginner (or intermediate when the score is small),
//!    in 2 → intermediate, longer → advanced
//! 3. Decisive advantage without mate → one-ply uniqueness probe
//! 4. Otherwise banded on |score|

use super::position::{parse_position, reply_positions};
use crate::models::{Difficulty, DifficultyConfig, EvalMetadata, Result};
use crate::pool::ProbePool;
use serde::Serialize;
use shakmaty::Position;
use tracing::{debug, warn};

/// What the caller knows about a forced mate.
#[derive(Debug, Clone, Copy)]
pub enum MateEvidence<'a> {
    /// Signed mate distance, if any
    Distance(Option<i32>),
    /// Raw engine metadata; the mate is read from its engine score
    Metadata(&'a EvalMetadata),
}

/// Result of a full analysis of one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionAnalysis {
    pub position: String,
    pub score: Option<i32>,
    pub mate: Option<i32>,
    pub difficulty: Difficulty,
    pub pv: Vec<String>,
}

/// Maps an evaluation to beginner / intermediate / advanced.
pub struct DifficultyEstimator {
    mate_in_one_threshold: i32,
    decisive_threshold: i32,
    advanced_threshold: i32,
    probes: ProbePool,
}

impl DifficultyEstimator {
    pub fn new(config: &DifficultyConfig, probes: ProbePool) -> Self {
        Self {
            mate_in_one_threshold: config.mate_in_one_threshold,
            decisive_threshold: config.decisive_threshold,
            advanced_threshold: config.advanced_threshold,
            probes,
        }
    }

    /// Estimate difficulty. `score` is White-perspective centipawns.
    ///
    /// Fails only on an invalid `position` or when a probe evaluation fails.
    pub async fn estimate(
        &self,
        score: i32,
        evidence: MateEvidence<'_>,
        position: Option<&str>,
    ) -> Result<Difficulty> {
        if let Some(fen) = position {
            if parse_position(fen)?.is_checkmate() {
                return Ok(Difficulty::Beginner);
            }
        }

        let mate = match evidence {
            MateEvidence::Distance(mate) => mate,
            MateEvidence::Metadata(metadata) => match metadata.engine_score {
                Some(engine_score) => engine_score.mate(),
                None => {
                    warn!(score = score, "Metadata carries no engine score, using score-only banding");
                    return Ok(self.band_by_score(score));
                }
            },
        };

        if let Some(n) = mate {
            return Ok(match n.abs() {
                1 if score.abs() > self.mate_in_one_threshold => Difficulty::Beginner,
                1 | 2 => Difficulty::Intermediate,
                _ => Difficulty::Advanced,
            });
        }

        if score.abs() > self.decisive_threshold {
            let Some(fen) = position else {
                return Ok(Difficulty::Beginner);
            };
            let replies = reply_positions(fen)?;
            let decisive = self
                .probes
                .count_decisive(replies, score, self.decisive_threshold)
                .await?;
            debug!(decisive_replies = decisive, "Uniqueness probe finished");
            return Ok(match decisive {
                1 => Difficulty::Advanced,
                0..=3 => Difficulty::Intermediate,
                _ => Difficulty::Beginner,
            });
        }

        Ok(if score.abs() > self.advanced_threshold {
            Difficulty::Intermediate
        } else {
            Difficulty::Advanced
        })
    }

    /// Fallback when the mate information cannot be read.
    fn band_by_score(&self, score: i32) -> Difficulty {
        let magnitude = score.abs();
        if magnitude > self.decisive_threshold {
            Difficulty::Beginner
        } else if magnitude > self.advanced_threshold {
            Difficulty::Intermediate
        } else {
            Difficulty::Advanced
        }
    }
}
