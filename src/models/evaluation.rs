//! Engine evaluation results.
//!
//! All scores are from White's perspective. Forced mates are projected onto
//! the centipawn scale through [`MATE_SCORE`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel used to turn a forced mate into a comparable numeric score.
pub const MATE_SCORE: i32 = 10_000;

/// Search parameters for one evaluation call. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Hard wall-clock limit in seconds
    pub time_limit_secs: f64,
    /// Minimum depth the engine is asked to reach
    pub min_depth: u32,
    /// Number of principal variations (MultiPV)
    pub line_count: u32,
}

impl SearchBudget {
    pub fn new(time_limit_secs: f64, min_depth: u32, line_count: u32) -> Self {
        Self {
            time_limit_secs,
            min_depth,
            line_count,
        }
    }

    /// Fixed cheap budget for one-ply uniqueness probes.
    pub fn probe(time_limit_secs: f64, min_depth: u32) -> Self {
        Self::new(time_limit_secs, min_depth, 1)
    }
}

/// Raw engine score as reported on an `info` line, White's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineScore {
    Centipawns(i32),
    /// Signed mate distance in moves; positive means White mates
    Mate(i32),
}

impl EngineScore {
    /// Numeric projection: `MATE_SCORE - n` for White mating,
    /// `-MATE_SCORE - n` for Black mating.
    pub fn projected(&self) -> i32 {
        match *self {
            EngineScore::Centipawns(cp) => cp,
            EngineScore::Mate(n) if n > 0 => MATE_SCORE - n,
            EngineScore::Mate(n) if n < 0 => -MATE_SCORE - n,
            // Mate 0 is unsigned; read as White already mated
            EngineScore::Mate(_) => -MATE_SCORE,
        }
    }

    pub fn mate(&self) -> Option<i32> {
        match *self {
            EngineScore::Mate(n) => Some(n),
            EngineScore::Centipawns(_) => None,
        }
    }
}

/// Auxiliary search information kept alongside a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetadata {
    /// Principal variation in UCI notation
    #[serde(default)]
    pub pv: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipv: Option<u32>,
    /// Remaining engine fields, stringified
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    /// Never persisted; only the numeric and mate projections are.
    #[serde(skip)]
    pub engine_score: Option<EngineScore>,
}

/// Result of one evaluation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Option<i32>,
    pub mate: Option<i32>,
    #[serde(default)]
    pub metadata: EvalMetadata,
}

impl Evaluation {
    /// Build from a raw engine score, projecting mates.
    pub fn from_engine(score: EngineScore, metadata: EvalMetadata) -> Self {
        Self {
            score: Some(score.projected()),
            mate: score.mate(),
            metadata: EvalMetadata {
                engine_score: Some(score),
                ..metadata
            },
        }
    }
}
