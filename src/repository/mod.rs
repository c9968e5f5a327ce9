//! Practice item repository.
//!
//! Epistemic foundation:
//! - K_i: Items are read-only here; ingestion lives elsewhere
//! - B_i: A query may match nothing → empty Vec, not an error
//! - I^B: Backing store may be unreadable → Result

mod jsonl;

pub use jsonl::{JsonlRepository, PuzzleRecord};

use crate::models::{PracticeItem, Result, Tag};
use async_trait::async_trait;
use std::cmp::Ordering;

/// Candidate filter handed to a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub tag: Tag,
    pub rating_min: u32,
    pub rating_max: u32,
    pub min_quality: f64,
    pub limit: usize,
}

impl SearchQuery {
    pub fn matches(&self, item: &PracticeItem) -> bool {
        item.quality >= self.min_quality
            && item.has_tag(&self.tag)
            && item.rating >= self.rating_min
            && item.rating <= self.rating_max
    }
}

/// Queryable store of practice items.
#[async_trait]
pub trait PuzzleRepository: Send + Sync {
    /// Items matching `query`, best quality first, at most `query.limit`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PracticeItem>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<PracticeItem>>;
}

/// Filter, order by quality then rating (both descending), and truncate.
pub fn apply_query<'a>(
    items: impl IntoIterator<Item = &'a PracticeItem>,
    query: &SearchQuery,
) -> Vec<PracticeItem> {
    let mut matched: Vec<PracticeItem> = items
        .into_iter()
        .filter(|item| query.matches(item))
        .cloned()
        .collect();
    matched.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(Ordering::Equal)
            .then(b.rating.cmp(&a.rating))
    });
    matched.truncate(query.limit);
    matched
}
