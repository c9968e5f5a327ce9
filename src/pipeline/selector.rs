//! Example selection: flat top-K or progressive three-bin bucketing.
//!
//! Epistemic foundation:
//! - K_i: Output length ≤ requested count, ids unique
//! - K_i: Progressive bin targets always sum to the requested count
//! - B_i: Repository may fail or match nothing → `Selection::NoExamples`
//! - I^R: Oversampling factor, candidate floor and popularity scale come from config

use super::scorer::{score, ScoredCandidate};
use crate::models::{
    GenerationRequest, PracticeItem, RatingBounds, Result, SelectionConfig, Tag,
};
use crate::repository::{PuzzleRepository, SearchQuery};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Relative rating positions separating the lower, middle and upper bins.
const BIN_EDGES: [f64; 2] = [0.33, 0.67];

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Found(Vec<PracticeItem>),
    /// Nothing matched, or the repository could not be queried
    NoExamples,
}

impl Selection {
    pub fn items(&self) -> &[PracticeItem] {
        match self {
            Selection::Found(items) => items,
            Selection::NoExamples => &[],
        }
    }
}

/// Chooses lesson examples from a repository.
pub struct ExampleSelector {
    repository: Arc<dyn PuzzleRepository>,
    oversample_factor: usize,
    min_candidates: usize,
    popularity_scale: f64,
}

impl ExampleSelector {
    pub fn new(repository: Arc<dyn PuzzleRepository>, config: &SelectionConfig) -> Self {
        Self {
            repository,
            oversample_factor: config.oversample_factor.max(1),
            min_candidates: config.min_candidates,
            popularity_scale: config.popularity_scale,
        }
    }

    pub fn repository(&self) -> &Arc<dyn PuzzleRepository> {
        &self.repository
    }

    /// Select at most `request.count` items.
    ///
    /// Fails only on an invalid request; an empty or failed repository query
    /// is `Selection::NoExamples`.
    pub async fn select(&self, request: &GenerationRequest) -> Result<Selection> {
        request.validate()?;
        let bounds = request.resolved_bounds()?;
        let query = SearchQuery {
            tag: request.tag.clone(),
            rating_min: bounds.min,
            rating_max: bounds.max,
            min_quality: request.min_quality,
            limit: (request.count * self.oversample_factor).max(self.min_candidates),
        };

        let candidates = match self.repository.search(&query).await {
            Ok(found) => unique_by_id(found),
            Err(e) => {
                warn!(tag = %request.tag, error = %e, "Candidate search failed");
                return Ok(Selection::NoExamples);
            }
        };
        if candidates.is_empty() {
            info!(tag = %request.tag, tier = %request.tier, "No candidates found");
            return Ok(Selection::NoExamples);
        }
        debug!(candidates = candidates.len(), limit = query.limit, "Candidates fetched");

        if candidates.len() <= request.count {
            let mut items = candidates;
            if request.progressive {
                items.sort_by_key(|item| item.rating);
            }
            return Ok(Selection::Found(items));
        }

        let scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|item| {
                let score = score(&item, request, self.popularity_scale);
                ScoredCandidate { item, score }
            })
            .collect();

        let items = if request.progressive {
            select_progressive(scored, request.count, bounds)
        } else {
            select_flat(scored, request.count)
        };
        info!(
            tag = %request.tag,
            selected = items.len(),
            progressive = request.progressive,
            "Examples selected"
        );
        Ok(Selection::Found(items))
    }
}

/// Drop later duplicates of an item id, keeping input order.
fn unique_by_id(items: Vec<PracticeItem>) -> Vec<PracticeItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// Stable sort by score, best first.
fn sort_by_score(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Top `count` by score, in score order.
pub fn select_flat(mut scored: Vec<ScoredCandidate>, count: usize) -> Vec<PracticeItem> {
    sort_by_score(&mut scored);
    scored.into_iter().take(count).map(|c| c.item).collect()
}

/// Per-bin targets: `count / 3`, plus one for the first `count % 3` bins.
pub fn bin_targets(count: usize) -> [usize; 3] {
    let base = count / 3;
    let extra = count % 3;
    [0, 1, 2].map(|bin| base + usize::from(bin < extra))
}

/// Bin of `rating` within `bounds` (0 lower, 1 middle, 2 upper).
/// A degenerate span puts everything in the lower bin.
pub fn bin_of(rating: u32, bounds: RatingBounds) -> usize {
    let position = bounds.position_of(rating);
    if position < BIN_EDGES[0] {
        0
    } else if position < BIN_EDGES[1] {
        1
    } else {
        2
    }
}

/// Best-scoring items from each rating third, shortfall filled from the best
/// remaining candidates, returned in ascending rating order.
pub fn select_progressive(
    scored: Vec<ScoredCandidate>,
    count: usize,
    bounds: RatingBounds,
) -> Vec<PracticeItem> {
    let mut bins: [Vec<ScoredCandidate>; 3] = Default::default();
    for candidate in scored {
        bins[bin_of(candidate.item.rating, bounds)].push(candidate);
    }

    let targets = bin_targets(count);
    let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(count);
    let mut remaining: Vec<ScoredCandidate> = Vec::new();
    for (bin, target) in bins.into_iter().zip(targets) {
        let mut bin = bin;
        sort_by_score(&mut bin);
        let rest = bin.split_off(target.min(bin.len()));
        selected.extend(bin);
        remaining.extend(rest);
    }

    if selected.len() < count {
        let chosen: HashSet<String> = selected.iter().map(|c| c.item.id.clone()).collect();
        remaining.retain(|c| !chosen.contains(&c.item.id));
        sort_by_score(&mut remaining);
        let shortfall = count - selected.len();
        debug!(shortfall = shortfall, "Filling progressive shortfall");
        selected.extend(remaining.into_iter().take(shortfall));
    }

    let mut items: Vec<PracticeItem> = selected.into_iter().map(|c| c.item).collect();
    items.sort_by_key(|item| item.rating);
    items
}

/// Aggregates over a selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionStats {
    pub count: usize,
    pub rating_min: u32,
    pub rating_max: u32,
    pub rating_avg: f64,
    pub quality_min: f64,
    pub quality_max: f64,
    pub quality_avg: f64,
    /// Occurrences of each tag across all items
    pub tag_distribution: BTreeMap<Tag, usize>,
}

pub fn selection_statistics(items: &[PracticeItem]) -> SelectionStats {
    if items.is_empty() {
        return SelectionStats::default();
    }
    let n = items.len() as f64;
    let mut tag_distribution = BTreeMap::new();
    for tag in items.iter().flat_map(|i| &i.tags) {
        *tag_distribution.entry(tag.clone()).or_insert(0) += 1;
    }
    let qualities = items.iter().map(|i| i.quality);

    SelectionStats {
        count: items.len(),
        rating_min: items.iter().map(|i| i.rating).min().unwrap_or(0),
        rating_max: items.iter().map(|i| i.rating).max().unwrap_or(0),
        rating_avg: items.iter().map(|i| i.rating as f64).sum::<f64>() / n,
        quality_min: qualities.clone().fold(f64::INFINITY, f64::min),
        quality_max: qualities.clone().fold(f64::NEG_INFINITY, f64::max),
        quality_avg: qualities.sum::<f64>() / n,
        tag_distribution,
    }
}

/// Advisory problem with a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionIssue {
    Empty,
    LowQuality { count: usize },
    NarrowRatingSpan { span: u32 },
    MixedPrimaryTags { distinct: usize },
    DuplicatePositions,
}

impl fmt::Display for SelectionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionIssue::Empty => write!(f, "no examples selected"),
            SelectionIssue::LowQuality { count } => {
                write!(f, "{count} examples have quality below 0.5")
            }
            SelectionIssue::NarrowRatingSpan { span } => {
                write!(f, "rating span of {span} is too narrow for a progression")
            }
            SelectionIssue::MixedPrimaryTags { distinct } => {
                write!(f, "{distinct} different primary tags")
            }
            SelectionIssue::DuplicatePositions => write!(f, "duplicate positions found"),
        }
    }
}

/// Check a selection for teaching problems. An empty result means no issues.
pub fn review_selection(items: &[PracticeItem]) -> Vec<SelectionIssue> {
    if items.is_empty() {
        return vec![SelectionIssue::Empty];
    }
    let mut issues = Vec::new();

    let low = items.iter().filter(|i| i.quality < 0.5).count();
    if low > 0 {
        issues.push(SelectionIssue::LowQuality { count: low });
    }

    let stats = selection_statistics(items);
    let span = stats.rating_max - stats.rating_min;
    if items.len() > 3 && span < 200 {
        issues.push(SelectionIssue::NarrowRatingSpan { span });
    }

    let primaries: HashSet<&Tag> = items.iter().map(|i| &i.primary_tag).collect();
    if primaries.len() > 2 {
        issues.push(SelectionIssue::MixedPrimaryTags {
            distinct: primaries.len(),
        });
    }

    let fingerprints: HashSet<&str> = items.iter().map(|i| i.fingerprint.as_str()).collect();
    if fingerprints.len() != items.len() {
        issues.push(SelectionIssue::DuplicatePositions);
    }
    issues
}

/// Composite teaching quality of one item in [0, 1].
///
/// Averages the stored quality, play-count reliability (when known), tag
/// clarity (fewer tags is clearer) and solution length (1-3 moves best).
pub fn example_quality(item: &PracticeItem) -> f64 {
    let mut factors = vec![item.quality];
    if let Some(plays) = item.provenance.as_ref().and_then(|p| p.play_count) {
        factors.push((plays as f64 / 1000.0).min(1.0));
    }
    let extra_tags = item.tags.len().saturating_sub(1) as f64;
    factors.push((1.0 - extra_tags * 0.1).max(0.5));
    factors.push(match item.solution.len() {
        1..=3 => 1.0,
        4 => 0.8,
        _ => 0.6,
    });
    factors.iter().sum::<f64>() / factors.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::StaticRepository;
    use crate::models::{Provenance, Tier};

    const FEN: &str = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";

    fn item(id: &str, rating: u32, quality: f64) -> PracticeItem {
        PracticeItem::new(id, FEN, vec!["d1d8".into()], vec![Tag::Pin], rating, quality)
    }

    fn scored(id: &str, rating: u32, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            item: item(id, rating, 0.8),
            score,
        }
    }

    fn selector(items: Vec<PracticeItem>) -> ExampleSelector {
        ExampleSelector::new(Arc::new(StaticRepository::new(items)), &SelectionConfig::default())
    }

    fn request(count: usize, progressive: bool) -> GenerationRequest {
        GenerationRequest::builder(Tag::Pin, Tier::Intermediate)
            .count(count)
            .min_quality(0.5)
            .progressive(progressive)
            .build()
            .unwrap()
    }

    #[test]
    fn test_bin_targets_sum_to_count() {
        for count in 1..=20 {
            let targets = bin_targets(count);
            assert_eq!(targets.iter().sum::<usize>(), count);
        }
        assert_eq!(bin_targets(7), [3, 2, 2]);
        assert_eq!(bin_targets(8), [3, 3, 2]);
        assert_eq!(bin_targets(2), [1, 1, 0]);
    }

    #[test]
    fn test_bin_edges() {
        let bounds = RatingBounds { min: 1200, max: 1800 };
        assert_eq!(bin_of(1200, bounds), 0);
        assert_eq!(bin_of(1397, bounds), 0);
        assert_eq!(bin_of(1400, bounds), 1);
        assert_eq!(bin_of(1600, bounds), 1);
        assert_eq!(bin_of(1610, bounds), 2);
        assert_eq!(bin_of(1500, RatingBounds { min: 1500, max: 1500 }), 0);
    }

    #[tokio::test]
    async fn test_explicit_bounds_drive_the_bins() {
        let explicit = RatingBounds { min: 1400, max: 1700 };
        let band = RatingBounds { min: 1200, max: 1800 };
        assert_eq!(bin_of(1410, explicit), 0);
        assert_eq!(bin_of(1410, band), 1);

        let items = [1400, 1410, 1500, 1510, 1520, 1530, 1650, 1660]
            .into_iter()
            .map(|r| item(&format!("r{r}"), r, 0.9))
            .collect();
        let request = GenerationRequest::builder(Tag::Pin, Tier::Intermediate)
            .count(3)
            .min_quality(0.5)
            .rating_min(1400)
            .rating_max(1700)
            .build()
            .unwrap();

        let selection = selector(items).select(&request).await.unwrap();
        let ratings: Vec<u32> = selection.items().iter().map(|i| i.rating).collect();
        // Tier-band bins would leave the lower third empty and pick 1510 instead
        assert_eq!(ratings, vec![1410, 1500, 1650]);
    }

    #[test]
    fn test_flat_takes_top_scores() {
        let picked = select_flat(
            vec![scored("a", 1300, 0.2), scored("b", 1400, 0.9), scored("c", 1500, 0.5)],
            2,
        );
        let ids: Vec<&str> = picked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_progressive_fills_shortfall_from_best_remaining() {
        let bounds = RatingBounds { min: 1200, max: 1800 };
        // Upper bin empty: its share comes from the best leftovers
        let candidates = vec![
            scored("low1", 1250, 0.9),
            scored("low2", 1300, 0.8),
            scored("low3", 1350, 0.7),
            scored("mid1", 1450, 0.6),
            scored("mid2", 1500, 0.95),
        ];
        let picked = select_progressive(candidates, 3, bounds);
        let ids: Vec<&str> = picked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["low1", "low2", "mid2"]);
    }

    #[tokio::test]
    async fn test_few_candidates_returned_sorted() {
        let sel = selector(vec![item("b", 1600, 0.9), item("a", 1300, 0.9)]);
        let selection = sel.select(&request(5, true)).await.unwrap();
        let ratings: Vec<u32> = selection.items().iter().map(|i| i.rating).collect();
        assert_eq!(ratings, vec![1300, 1600]);
    }

    #[tokio::test]
    async fn test_oversampling_limit() {
        let repo = Arc::new(StaticRepository::new(vec![item("a", 1500, 0.9)]));
        let sel = ExampleSelector::new(repo.clone(), &SelectionConfig::default());
        sel.select(&request(30, false)).await.unwrap();
        sel.select(&request(4, false)).await.unwrap();
        let limits: Vec<usize> = repo.searches().iter().map(|q| q.limit).collect();
        assert_eq!(limits, vec![90, 50]);
    }

    #[tokio::test]
    async fn test_no_duplicate_ids() {
        let items: Vec<PracticeItem> = (0..12)
            .map(|i| item(&format!("p{}", i % 6), 1200 + i * 50, 0.9))
            .collect();
        let selection = selector(items).select(&request(5, true)).await.unwrap();
        let ids: HashSet<&str> = selection.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), selection.items().len());
        assert!(selection.items().len() <= 5);
    }

    #[tokio::test]
    async fn test_empty_and_failed_search_are_no_examples() {
        let empty = selector(vec![]).select(&request(3, true)).await.unwrap();
        assert_eq!(empty, Selection::NoExamples);

        let failing = ExampleSelector::new(
            Arc::new(StaticRepository::failing()),
            &SelectionConfig::default(),
        );
        assert_eq!(
            failing.select(&request(3, true)).await.unwrap(),
            Selection::NoExamples
        );
    }

    #[tokio::test]
    async fn test_invalid_request_is_an_error() {
        let mut bad = request(3, true);
        bad.tier = Tier::Unknown("wizard".into());
        assert!(selector(vec![]).select(&bad).await.is_err());
    }

    #[test]
    fn test_review_flags_issues() {
        let items = vec![
            item("a", 1500, 0.4),
            item("b", 1520, 0.9),
            item("c", 1540, 0.9),
            item("d", 1560, 0.9),
        ];
        let issues = review_selection(&items);
        assert!(issues.contains(&SelectionIssue::LowQuality { count: 1 }));
        assert!(issues.contains(&SelectionIssue::NarrowRatingSpan { span: 60 }));
        assert!(issues.contains(&SelectionIssue::DuplicatePositions));
        assert_eq!(review_selection(&[]), vec![SelectionIssue::Empty]);
    }

    #[test]
    fn test_statistics() {
        let stats = selection_statistics(&[item("a", 1300, 0.6), item("b", 1700, 1.0)]);
        assert_eq!(stats.count, 2);
        assert_eq!((stats.rating_min, stats.rating_max), (1300, 1700));
        assert_eq!(stats.rating_avg, 1500.0);
        assert!((stats.quality_avg - 0.8).abs() < 1e-9);
        assert_eq!(stats.tag_distribution.get(&Tag::Pin), Some(&2));
    }

    #[test]
    fn test_example_quality() {
        let plain = item("a", 1500, 0.8);
        // (0.8 + 1.0 + 1.0) / 3
        assert!((example_quality(&plain) - 2.8 / 3.0).abs() < 1e-9);

        let played = plain.with_provenance(Provenance {
            play_count: Some(500),
            ..Default::default()
        });
        assert!((example_quality(&played) - 3.3 / 4.0).abs() < 1e-9);
    }
}
