//! End-to-end lesson generation.
//!
//! Pipeline flow:
//! Request → Selector (repository + scorer) → ContentWriter → Assembler → Lesson

use super::assembler::{estimated_minutes, lesson_title, LessonAssembler};
use super::selector::{review_selection, selection_statistics, ExampleSelector, Selection};
use crate::content::ContentWriter;
use crate::models::{
    GenerationRequest, Lesson, LessonConfig, LessonError, PracticeItem, Result, Tag, Tier,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// What a lesson would contain, computed without generating any text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonPreview {
    pub title: String,
    pub tag: Tag,
    pub tag_display_name: String,
    pub tier: Tier,
    pub example_count: usize,
    pub step_count: usize,
    pub avg_rating: f64,
    pub rating_range: (u32, u32),
    pub avg_quality: f64,
    pub tags_covered: Vec<Tag>,
    pub estimated_minutes: u32,
    pub includes_analysis: bool,
    pub progressive: bool,
}

/// Select → write → assemble.
pub struct LessonPipeline {
    selector: ExampleSelector,
    writer: ContentWriter,
    assembler: LessonAssembler,
    lesson_config: LessonConfig,
}

impl LessonPipeline {
    pub fn new(selector: ExampleSelector, writer: ContentWriter, config: &LessonConfig) -> Self {
        Self {
            selector,
            writer,
            assembler: LessonAssembler::new(config),
            lesson_config: config.clone(),
        }
    }

    /// Generate a lesson for `request`.
    ///
    /// B_i(request valid) → InvalidInput family
    /// B_i(examples exist) → NoExamplesFound
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Lesson> {
        let start = Instant::now();
        let items = self.selected(request).await?;

        for issue in review_selection(&items) {
            info!(tag = %request.tag, %issue, "Selection review");
        }

        let text = self.writer.write(&items, request).await;
        let lesson = self.assembler.assemble(&items, request, &text)?;

        info!(
            title = %lesson.title,
            examples = items.len(),
            steps = lesson.steps.len(),
            fallbacks = text.fallbacks,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Lesson generated"
        );
        Ok(lesson)
    }

    /// Build a lesson from explicit repository ids, in the given order.
    ///
    /// Missing ids are skipped with a warning; if none resolve the call fails
    /// with `ItemNotFound`. An empty title falls back to the tier title.
    pub async fn generate_custom(
        &self,
        title: &str,
        tag: Tag,
        tier: Tier,
        ids: &[String],
        include_analysis: bool,
    ) -> Result<Lesson> {
        if ids.is_empty() {
            return Err(LessonError::InvalidInput(
                "a custom lesson needs at least one item id".to_string(),
            ));
        }

        let mut items: Vec<PracticeItem> = Vec::with_capacity(ids.len());
        for id in ids {
            match self.selector.repository().get_by_id(id).await? {
                Some(item) => items.push(item),
                None => warn!(id = %id, "Practice item not found, skipping"),
            }
        }
        if items.is_empty() {
            return Err(LessonError::ItemNotFound(ids.join(", ")));
        }

        let request = GenerationRequest::builder(tag, tier)
            .count(items.len())
            .min_quality(0.0)
            .progressive(false)
            .include_analysis(include_analysis)
            .build()?;

        let text = self.writer.write(&items, &request).await;
        let title = if title.trim().is_empty() {
            lesson_title(&request.tag, &request.tier)
        } else {
            title.trim().to_string()
        };
        let lesson = self
            .assembler
            .assemble_titled(title, &items, &request, &text)?;

        info!(title = %lesson.title, examples = items.len(), "Custom lesson built");
        Ok(lesson)
    }

    /// Run selection only and report what the lesson would contain.
    pub async fn preview(&self, request: &GenerationRequest) -> Result<LessonPreview> {
        let items = self.selected(request).await?;
        let stats = selection_statistics(&items);
        let steps_per_example = if request.include_analysis { 3 } else { 2 };

        Ok(LessonPreview {
            title: lesson_title(&request.tag, &request.tier),
            tag: request.tag.clone(),
            tag_display_name: request.tag.info().display_name,
            tier: request.tier.clone(),
            example_count: stats.count,
            step_count: stats.count * steps_per_example,
            avg_rating: stats.rating_avg,
            rating_range: (stats.rating_min, stats.rating_max),
            avg_quality: stats.quality_avg,
            tags_covered: stats.tag_distribution.into_keys().collect(),
            estimated_minutes: estimated_minutes(
                stats.count,
                request.include_analysis,
                &self.lesson_config,
            ),
            includes_analysis: request.include_analysis,
            progressive: request.progressive,
        })
    }

    async fn selected(&self, request: &GenerationRequest) -> Result<Vec<PracticeItem>> {
        match self.selector.select(request).await? {
            Selection::Found(items) => Ok(items),
            Selection::NoExamples => Err(LessonError::NoExamplesFound {
                tag: request.tag.to_string(),
                tier: request.tier.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockGenerator, StaticRepository};
    use crate::models::SelectionConfig;
    use std::sync::Arc;

    const FEN: &str = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";
    const GOOD: &str = "A well-formed paragraph about the tactic that is long enough.";

    fn items() -> Vec<PracticeItem> {
        (0..8)
            .map(|i| {
                PracticeItem::new(
                    format!("p{i}"),
                    FEN,
                    vec!["d1d8".into()],
                    vec![Tag::Pin],
                    1250 + 70 * i,
                    0.9,
                )
            })
            .collect()
    }

    fn pipeline(generator: impl Into<Arc<MockGenerator>>) -> LessonPipeline {
        let config = LessonConfig::default();
        let selector = ExampleSelector::new(
            Arc::new(StaticRepository::new(items())),
            &SelectionConfig::default(),
        );
        let generator: Arc<MockGenerator> = generator.into();
        let writer = ContentWriter::new(generator, &config);
        LessonPipeline::new(selector, writer, &config)
    }

    fn request(tag: Tag) -> GenerationRequest {
        GenerationRequest::builder(tag, Tier::Intermediate)
            .count(4)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let lesson = pipeline(MockGenerator::new(GOOD))
            .generate(&request(Tag::Pin))
            .await
            .unwrap();
        assert_eq!(lesson.metadata.example_count, 4);
        assert_eq!(lesson.steps.len(), 12);
        assert_eq!(lesson.introduction, GOOD);
    }

    #[tokio::test]
    async fn test_no_examples_is_an_error() {
        let err = pipeline(MockGenerator::new(GOOD))
            .generate(&request(Tag::Fork))
            .await
            .unwrap_err();
        assert!(matches!(err, LessonError::NoExamplesFound { .. }));
    }

    #[tokio::test]
    async fn test_custom_lesson_skips_missing_ids() {
        let ids = vec!["p3".to_string(), "nope".to_string(), "p1".to_string()];
        let lesson = pipeline(MockGenerator::new(GOOD))
            .generate_custom("My Pins", Tag::Pin, Tier::Beginner, &ids, false)
            .await
            .unwrap();
        assert_eq!(lesson.title, "My Pins");
        assert_eq!(lesson.steps[0].item_id, "p3");
        assert_eq!(lesson.steps[2].item_id, "p1");
        assert!(!lesson.metadata.progressive);

        let missing = pipeline(MockGenerator::new(GOOD))
            .generate_custom("", Tag::Pin, Tier::Beginner, &["x".to_string()], false)
            .await
            .unwrap_err();
        assert!(matches!(missing, LessonError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_preview_does_not_generate() {
        let generator = Arc::new(MockGenerator::new(GOOD));
        let preview = pipeline(Arc::clone(&generator))
            .preview(&request(Tag::Pin))
            .await
            .unwrap();
        assert_eq!(generator.calls(), 0);
        assert_eq!(preview.example_count, 4);
        assert_eq!(preview.step_count, 12);
        assert_eq!(preview.estimated_minutes, 32);
        assert_eq!(preview.title, "Mastering Pin Tactics");
        assert_eq!(preview.tags_covered, vec![Tag::Pin]);
    }
}
