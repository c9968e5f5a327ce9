//! Weighted relevance score for one candidate.
//!
//! Every component is computed on its own and degrades to a neutral value
//! when its input is missing; scoring never fails.

use crate::models::{GenerationRequest, PracticeItem, ScoringWeights, Tier};

/// Tag relevance when the requested tag is neither primary nor present.
const UNRELATED_TAG_RELEVANCE: f64 = 0.5;

/// A candidate with its computed score. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item: PracticeItem,
    pub score: f64,
}

/// Individual components before weighting. Rating fit goes negative outside
/// the tier band; the others stay in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub quality: f64,
    pub rating_fit: f64,
    pub tag_relevance: f64,
    pub diversity: f64,
}

impl ScoreBreakdown {
    pub fn of(item: &PracticeItem, request: &GenerationRequest, popularity_scale: f64) -> Self {
        Self {
            quality: item.quality,
            rating_fit: rating_fit(item.rating, &request.tier),
            tag_relevance: tag_relevance(item, request),
            diversity: diversity(item.popularity(), popularity_scale),
        }
    }

    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        weights.quality * self.quality
            + weights.rating_fit * self.rating_fit
            + weights.tag_relevance * self.tag_relevance
            + weights.diversity * self.diversity
    }
}

/// Score `item` against `request` using the request's weights.
pub fn score(item: &PracticeItem, request: &GenerationRequest, popularity_scale: f64) -> f64 {
    ScoreBreakdown::of(item, request, popularity_scale).weighted(&request.weights)
}

/// 1 at the tier optimum, falling linearly to 0 at the farther band edge and
/// below 0 past it, so explicit bounds wider than the band still rank by
/// distance. Unknown tiers contribute 0.
pub fn rating_fit(rating: u32, tier: &Tier) -> f64 {
    let Some(band) = tier.rating_band() else {
        return 0.0;
    };
    let half_width = band.half_width();
    if half_width == 0 {
        return if rating == band.optimal { 1.0 } else { 0.0 };
    }
    let distance = (rating as f64 - band.optimal as f64).abs();
    1.0 - distance / half_width as f64
}

pub fn tag_relevance(item: &PracticeItem, request: &GenerationRequest) -> f64 {
    if item.has_tag(&request.tag) {
        1.0
    } else {
        UNRELATED_TAG_RELEVANCE
    }
}

/// Less-played positions score higher. Unknown popularity contributes 0.
pub fn diversity(popularity: Option<i32>, scale: f64) -> f64 {
    let Some(popularity) = popularity else {
        return 0.0;
    };
    let normalized = if scale > 0.0 {
        (popularity as f64 / scale).clamp(0.0, 1.0)
    } else {
        1.0
    };
    1.0 - normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, Tag};

    const FEN: &str = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";

    fn request() -> GenerationRequest {
        GenerationRequest::builder(Tag::Pin, Tier::Intermediate)
            .build()
            .unwrap()
    }

    fn item(rating: u32, tags: Vec<Tag>, popularity: Option<i32>) -> PracticeItem {
        let item = PracticeItem::new("x", FEN, vec!["d1d8".into()], tags, rating, 0.8);
        match popularity {
            Some(p) => item.with_provenance(Provenance {
                popularity: Some(p),
                ..Default::default()
            }),
            None => item,
        }
    }

    #[test]
    fn test_rating_fit_peaks_at_optimum() {
        assert_eq!(rating_fit(1500, &Tier::Intermediate), 1.0);
        assert!((rating_fit(1650, &Tier::Intermediate) - 0.5).abs() < 1e-9);
        assert_eq!(rating_fit(1800, &Tier::Intermediate), 0.0);
        assert!((rating_fit(2600, &Tier::Intermediate) + 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(rating_fit(1500, &Tier::Unknown("x".into())), 0.0);
    }

    #[test]
    fn test_rating_fit_keeps_falling_outside_band() {
        assert!((rating_fit(1900, &Tier::Intermediate) + 1.0 / 3.0).abs() < 1e-9);
        assert!((rating_fit(2400, &Tier::Intermediate) + 2.0).abs() < 1e-9);
        assert!((rating_fit(900, &Tier::Intermediate) + 1.0).abs() < 1e-9);

        // Explicit bounds past the band must not tie every outlier
        let req = GenerationRequest::builder(Tag::Pin, Tier::Intermediate)
            .rating_min(1200)
            .rating_max(2500)
            .build()
            .unwrap();
        let near = score(&item(1900, vec![Tag::Pin], Some(250)), &req, 1000.0);
        let far = score(&item(2400, vec![Tag::Pin], Some(250)), &req, 1000.0);
        assert!(near > far);
        assert!((near - far - 0.3 * (2.0 - 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tag_relevance_levels() {
        let req = request();
        assert_eq!(tag_relevance(&item(1500, vec![Tag::Pin], None), &req), 1.0);
        assert_eq!(
            tag_relevance(&item(1500, vec![Tag::Fork, Tag::Pin], None), &req),
            1.0
        );
        assert_eq!(tag_relevance(&item(1500, vec![Tag::Fork], None), &req), 0.5);
    }

    #[test]
    fn test_missing_popularity_zeroes_diversity_only() {
        let req = request();
        let without = ScoreBreakdown::of(&item(1500, vec![Tag::Pin], None), &req, 1000.0);
        assert_eq!(without.diversity, 0.0);
        assert_eq!(without.quality, 0.8);
        assert_eq!(without.rating_fit, 1.0);

        let known = ScoreBreakdown::of(&item(1500, vec![Tag::Pin], Some(250)), &req, 1000.0);
        assert!((known.diversity - 0.75).abs() < 1e-9);
        assert_eq!(diversity(Some(5000), 1000.0), 0.0);
        assert_eq!(diversity(Some(-10), 1000.0), 1.0);
    }

    #[test]
    fn test_default_weighting() {
        let req = request();
        // 0.4 * 0.8 + 0.3 * 1.0 + 0.2 * 1.0 + 0.1 * 0.75
        let s = score(&item(1500, vec![Tag::Pin], Some(250)), &req, 1000.0);
        assert!((s - 0.895).abs() < 1e-9);
    }
}
