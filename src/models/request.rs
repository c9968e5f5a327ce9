//! Lesson generation requests.
//!
//! Epistemic foundation:
//! - K_i: Tier defaults are a fixed table
//! - B_i: Caller-supplied tokens may be unknown → validate() before use
//! - I^R: Weights and bounds are caller-tunable

use super::{LessonError, RatingBand, Result, Tag, Tier};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Relative weight of each scoring component.
///
/// Weights are free-form non-negative multipliers. They are expected to sum
/// to 1.0 but are not renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_quality_weight")]
    pub quality: f64,
    #[serde(default = "default_rating_fit_weight")]
    pub rating_fit: f64,
    #[serde(default = "default_tag_relevance_weight")]
    pub tag_relevance: f64,
    #[serde(default = "default_diversity_weight")]
    pub diversity: f64,
}

fn default_quality_weight() -> f64 {
    0.4
}

fn default_rating_fit_weight() -> f64 {
    0.3
}

fn default_tag_relevance_weight() -> f64 {
    0.2
}

fn default_diversity_weight() -> f64 {
    0.1
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            quality: default_quality_weight(),
            rating_fit: default_rating_fit_weight(),
            tag_relevance: default_tag_relevance_weight(),
            diversity: default_diversity_weight(),
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.quality + self.rating_fit + self.tag_relevance + self.diversity
    }

    /// Reject negative or non-finite weights.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("quality", self.quality),
            ("rating_fit", self.rating_fit),
            ("tag_relevance", self.tag_relevance),
            ("diversity", self.diversity),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(LessonError::InvalidWeights(format!(
                    "{name} weight must be a non-negative number, got {value}"
                )));
            }
        }
        if (self.sum() - 1.0).abs() > 1e-6 {
            warn!(sum = self.sum(), "Scoring weights do not sum to 1.0");
        }
        Ok(())
    }
}

/// Inclusive rating window used for the repository query and bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBounds {
    pub min: u32,
    pub max: u32,
}

impl RatingBounds {
    pub fn span(&self) -> i64 {
        self.max as i64 - self.min as i64
    }

    /// Relative position of `rating` inside the window, unclamped.
    pub fn position_of(&self, rating: u32) -> f64 {
        let span = self.span();
        if span <= 0 {
            return 0.0;
        }
        (rating as i64 - self.min as i64) as f64 / span as f64
    }
}

/// A request for one lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tag: Tag,
    pub tier: Tier,
    pub count: usize,
    pub min_quality: f64,
    pub progressive: bool,
    pub rating_min: Option<u32>,
    pub rating_max: Option<u32>,
    pub weights: ScoringWeights,
    pub include_analysis: bool,
}

impl GenerationRequest {
    /// Start a request with the defaults: 5 items, quality ≥ 0.7,
    /// progressive, analysis included.
    pub fn builder(tag: Tag, tier: Tier) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            request: GenerationRequest {
                tag,
                tier,
                count: 5,
                min_quality: 0.7,
                progressive: true,
                rating_min: None,
                rating_max: None,
                weights: ScoringWeights::default(),
                include_analysis: true,
            },
        }
    }

    /// Parse tag and tier tokens, then start a builder.
    pub fn parse(tag: &str, tier: &str) -> Result<GenerationRequestBuilder> {
        let tag = Tag::parse(tag);
        if !tag.is_known() {
            return Err(LessonError::UnknownTag(tag.to_string()));
        }
        let tier = Tier::parse(tier);
        if let Tier::Unknown(raw) = &tier {
            return Err(LessonError::UnknownTier(raw.clone()));
        }
        Ok(Self::builder(tag, tier))
    }

    /// Check the request before any repository or engine work.
    pub fn validate(&self) -> Result<()> {
        if let Tag::Other(raw) = &self.tag {
            return Err(LessonError::UnknownTag(raw.clone()));
        }
        if let Tier::Unknown(raw) = &self.tier {
            return Err(LessonError::UnknownTier(raw.clone()));
        }
        if self.count == 0 {
            return Err(LessonError::InvalidInput(
                "requested item count must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err(LessonError::InvalidInput(format!(
                "quality threshold must be within [0, 1], got {}",
                self.min_quality
            )));
        }
        let bounds = self.resolved_bounds()?;
        if bounds.min > bounds.max {
            return Err(LessonError::InvalidInput(format!(
                "rating bounds are inverted: {} > {}",
                bounds.min, bounds.max
            )));
        }
        self.weights.validate()
    }

    /// Tier table row for this request.
    pub fn band(&self) -> Result<RatingBand> {
        self.tier
            .rating_band()
            .ok_or_else(|| LessonError::UnknownTier(self.tier.to_string()))
    }

    /// Explicit bounds override the tier defaults, each side independently.
    pub fn resolved_bounds(&self) -> Result<RatingBounds> {
        let band = self.band()?;
        Ok(RatingBounds {
            min: self.rating_min.unwrap_or(band.min),
            max: self.rating_max.unwrap_or(band.max),
        })
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    request: GenerationRequest,
}

impl GenerationRequestBuilder {
    pub fn count(mut self, count: usize) -> Self {
        self.request.count = count;
        self
    }

    pub fn min_quality(mut self, min_quality: f64) -> Self {
        self.request.min_quality = min_quality;
        self
    }

    pub fn progressive(mut self, progressive: bool) -> Self {
        self.request.progressive = progressive;
        self
    }

    pub fn rating_min(mut self, rating: u32) -> Self {
        self.request.rating_min = Some(rating);
        self
    }

    pub fn rating_max(mut self, rating: u32) -> Self {
        self.request.rating_max = Some(rating);
        self
    }

    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.request.weights = weights;
        self
    }

    pub fn include_analysis(mut self, include: bool) -> Self {
        self.request.include_analysis = include;
        self
    }

    /// Finish and validate.
    pub fn build(self) -> Result<GenerationRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}
