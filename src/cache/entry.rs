//! Cache entries and key derivation.

use crate::models::{EvalMetadata, Evaluation, SearchBudget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Deterministic key over the position and every budget parameter.
pub fn cache_key(position: &str, budget: &SearchBudget) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        position, budget.time_limit_secs, budget.min_depth, budget.line_count
    );
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// One memoized evaluation, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub position: String,
    pub score: Option<i32>,
    pub mate: Option<i32>,
    #[serde(default)]
    pub metadata: EvalMetadata,
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(position: &str, evaluation: &Evaluation) -> Self {
        Self {
            position: position.to_string(),
            score: evaluation.score,
            mate: evaluation.mate,
            metadata: evaluation.metadata.clone(),
            inserted_at: Utc::now(),
        }
    }

    /// Valid only while age < max_age.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.inserted_at);
        match age.to_std() {
            Ok(age) => age < max_age,
            // Timestamp in the future (clock moved back)
            Err(_) => true,
        }
    }

    pub fn to_evaluation(&self) -> Evaluation {
        Evaluation {
            score: self.score,
            mate: self.mate,
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEN: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";

    #[test]
    fn test_key_changes_with_any_budget_parameter() {
        let base = SearchBudget::new(3.0, 25, 3);
        let key = cache_key(FEN, &base);
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key(FEN, &base));

        assert_ne!(key, cache_key(FEN, &SearchBudget::new(1.0, 25, 3)));
        assert_ne!(key, cache_key(FEN, &SearchBudget::new(3.0, 10, 3)));
        assert_ne!(key, cache_key(FEN, &SearchBudget::new(3.0, 25, 1)));
    }

    #[test]
    fn test_freshness_window() {
        let entry = CacheEntry::new(FEN, &Evaluation::default());
        let now = entry.inserted_at;
        assert!(entry.is_fresh(Duration::from_secs(1), now));
        assert!(!entry.is_fresh(Duration::from_secs(1), now + chrono::Duration::seconds(1)));
        assert!(!entry.is_fresh(Duration::ZERO, now));
    }
}
