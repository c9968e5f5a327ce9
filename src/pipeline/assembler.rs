//! Lesson assembly and the validation gate.

use crate::content::{fallback, LessonText};
use crate::models::{
    GenerationRequest, Lesson, LessonConfig, LessonError, LessonMetadata, LessonStep,
    PracticeItem, Result, StepKind, Tag, Tier,
};
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Non-fatal inconsistency found in an assembled lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    DuplicateOrder { order: u32 },
    ExampleCountMismatch { metadata: usize, presentations: usize },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::DuplicateOrder { order } => {
                write!(f, "duplicate step order {order}")
            }
            ValidationWarning::ExampleCountMismatch {
                metadata,
                presentations,
            } => write!(
                f,
                "metadata lists {metadata} examples but the lesson has {presentations} presentation steps"
            ),
        }
    }
}

/// `Introduction to Fork Tactics`, `Mastering Pin Tactics`, ...
pub fn lesson_title(tag: &Tag, tier: &Tier) -> String {
    format!("{} {}", tier.title_prefix(), tag.info().display_name)
}

/// Minutes needed for `count` examples.
pub fn estimated_minutes(count: usize, include_analysis: bool, config: &LessonConfig) -> u32 {
    let per_example = if include_analysis {
        config.minutes_per_example_with_analysis
    } else {
        config.minutes_per_example
    };
    count as u32 * per_example
}

/// Builds lessons from selected items and their text.
pub struct LessonAssembler {
    config: LessonConfig,
}

impl LessonAssembler {
    pub fn new(config: &LessonConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Assemble with the tier-derived title.
    pub fn assemble(
        &self,
        items: &[PracticeItem],
        request: &GenerationRequest,
        text: &LessonText,
    ) -> Result<Lesson> {
        let title = lesson_title(&request.tag, &request.tier);
        self.assemble_titled(title, items, request, text)
    }

    /// Assemble under an explicit title, then run the validation gate.
    pub fn assemble_titled(
        &self,
        title: String,
        items: &[PracticeItem],
        request: &GenerationRequest,
        text: &LessonText,
    ) -> Result<Lesson> {
        let lesson = Lesson {
            id: Uuid::new_v4(),
            title,
            tag: request.tag.clone(),
            tier: request.tier.clone(),
            introduction: text.introduction.clone(),
            steps: build_steps(items, request.include_analysis, text),
            summary: text.summary.clone(),
            metadata: self.metadata(items, request),
            created_at: Utc::now(),
        };

        let warnings = validate_lesson(&lesson)?;
        debug!(
            steps = lesson.steps.len(),
            warnings = warnings.len(),
            "Lesson assembled"
        );
        Ok(lesson)
    }

    fn metadata(&self, items: &[PracticeItem], request: &GenerationRequest) -> LessonMetadata {
        let count = items.len();
        let ratings = items.iter().map(|i| i.rating);
        let (avg_rating, avg_quality) = if count == 0 {
            (0.0, 0.0)
        } else {
            (
                ratings.clone().map(f64::from).sum::<f64>() / count as f64,
                items.iter().map(|i| i.quality).sum::<f64>() / count as f64,
            )
        };
        let tags_covered: BTreeSet<Tag> = items.iter().flat_map(|i| i.tags.iter().cloned()).collect();

        LessonMetadata {
            example_count: count,
            min_rating: ratings.clone().min().unwrap_or(0),
            max_rating: ratings.max().unwrap_or(0),
            avg_rating,
            avg_quality,
            tags_covered: tags_covered.into_iter().collect(),
            estimated_minutes: estimated_minutes(count, request.include_analysis, &self.config),
            includes_analysis: request.include_analysis,
            progressive: request.progressive,
        }
    }
}

/// Steps for every item. With analysis the orders are 3i+1..3i+3, without
/// they are 2i+1, 2i+2.
fn build_steps(items: &[PracticeItem], include_analysis: bool, text: &LessonText) -> Vec<LessonStep> {
    let kinds: &[StepKind] = if include_analysis {
        &[StepKind::Presentation, StepKind::Solution, StepKind::Analysis]
    } else {
        &[StepKind::Presentation, StepKind::Solution]
    };
    let stride = kinds.len() as u32;

    items
        .iter()
        .enumerate()
        .flat_map(|(index, item)| {
            kinds.iter().enumerate().map(move |(offset, &kind)| {
                let body = text
                    .body(index, kind)
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback::step(item, kind));
                LessonStep {
                    kind,
                    title: format!("Example {}: {}", index + 1, kind.title_role()),
                    body,
                    position: item.position.clone(),
                    solution: (kind != StepKind::Presentation).then(|| item.solution.clone()),
                    order: index as u32 * stride + offset as u32 + 1,
                    item_id: item.id.clone(),
                }
            })
        })
        .collect()
}

/// Hard failures are errors; consistency problems are logged and returned.
pub fn validate_lesson(lesson: &Lesson) -> Result<Vec<ValidationWarning>> {
    if lesson.title.trim().is_empty() {
        return Err(LessonError::Validation("lesson has no title".to_string()));
    }
    if lesson.introduction.trim().is_empty() || lesson.summary.trim().is_empty() {
        return Err(LessonError::Validation(
            "lesson is missing its introduction or summary".to_string(),
        ));
    }
    if lesson.steps.is_empty() {
        return Err(LessonError::Validation("lesson has no steps".to_string()));
    }
    for (i, step) in lesson.steps.iter().enumerate() {
        if step.title.trim().is_empty() || step.body.trim().is_empty() {
            return Err(LessonError::Validation(format!("step {i} is missing its content")));
        }
        if step.position.trim().is_empty() {
            return Err(LessonError::Validation(format!("step {i} has no position")));
        }
    }

    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    for step in &lesson.steps {
        if !seen.insert(step.order) {
            warnings.push(ValidationWarning::DuplicateOrder { order: step.order });
        }
    }
    let presentations = lesson.presentation_count();
    if lesson.metadata.example_count != presentations {
        warnings.push(ValidationWarning::ExampleCountMismatch {
            metadata: lesson.metadata.example_count,
            presentations,
        });
    }

    for warning in &warnings {
        warn!(lesson = %lesson.id, %warning, "Lesson validation warning");
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEN: &str = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";

    fn items(n: usize) -> Vec<PracticeItem> {
        (0..n)
            .map(|i| {
                PracticeItem::new(
                    format!("p{i}"),
                    FEN,
                    vec!["d1d8".into(), "g8h7".into()],
                    if i == 0 { vec![Tag::Pin, Tag::Fork] } else { vec![Tag::Pin] },
                    1300 + 200 * i as u32,
                    0.7 + 0.1 * i as f64,
                )
            })
            .collect()
    }

    fn request(include_analysis: bool) -> GenerationRequest {
        GenerationRequest::builder(Tag::Pin, Tier::Intermediate)
            .include_analysis(include_analysis)
            .build()
            .unwrap()
    }

    fn text() -> LessonText {
        LessonText {
            introduction: "Intro".to_string(),
            summary: "Summary".to_string(),
            ..Default::default()
        }
    }

    fn assembler() -> LessonAssembler {
        LessonAssembler::new(&LessonConfig::default())
    }

    #[test]
    fn test_analysis_steps_and_orders() {
        let lesson = assembler().assemble(&items(3), &request(true), &text()).unwrap();
        assert_eq!(lesson.steps.len(), 9);
        let orders: Vec<u32> = lesson.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, (1..=9).collect::<Vec<_>>());
        assert_eq!(lesson.metadata.example_count, 3);
        assert_eq!(lesson.metadata.estimated_minutes, 24);
        assert_eq!(lesson.steps[4].title, "Example 2: Solution");
        assert_eq!(lesson.steps[8].kind, StepKind::Analysis);
    }

    #[test]
    fn test_without_analysis_uses_plain_templates() {
        let lesson = assembler().assemble(&items(2), &request(false), &text()).unwrap();
        let orders: Vec<u32> = lesson.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        assert_eq!(lesson.steps[0].body, "Find the best move for White in this position.");
        assert_eq!(lesson.steps[0].solution, None);
        assert_eq!(lesson.steps[1].body, "The solution is: d1d8 g8h7");
        assert_eq!(lesson.metadata.estimated_minutes, 10);
        assert_eq!(lesson.title, "Mastering Pin Tactics");
    }

    #[test]
    fn test_metadata_aggregates() {
        let lesson = assembler().assemble(&items(3), &request(true), &text()).unwrap();
        let meta = &lesson.metadata;
        assert_eq!((meta.min_rating, meta.max_rating), (1300, 1700));
        assert_eq!(meta.avg_rating, 1500.0);
        assert!((meta.avg_quality - 0.8).abs() < 1e-9);
        assert_eq!(meta.tags_covered, vec![Tag::Fork, Tag::Pin]);
        assert!(meta.progressive);
    }

    #[test]
    fn test_generated_bodies_are_used() {
        let mut text = text();
        text.bodies
            .insert((1, StepKind::Analysis), "Deep analysis".to_string());
        let lesson = assembler().assemble(&items(2), &request(true), &text).unwrap();
        assert_eq!(lesson.steps[5].body, "Deep analysis");
    }

    #[test]
    fn test_gate_rejects_missing_content() {
        let mut empty = text();
        empty.summary = "  ".to_string();
        let err = assembler()
            .assemble(&items(1), &request(true), &empty)
            .unwrap_err();
        assert!(matches!(err, LessonError::Validation(_)));

        let none = assembler().assemble(&[], &request(true), &text()).unwrap_err();
        assert!(matches!(none, LessonError::Validation(_)));
    }

    #[test]
    fn test_inconsistencies_are_warnings() {
        let mut lesson = assembler().assemble(&items(2), &request(false), &text()).unwrap();
        lesson.steps[1].order = 1;
        lesson.metadata.example_count = 5;

        let warnings = validate_lesson(&lesson).unwrap();
        assert_eq!(
            warnings,
            vec![
                ValidationWarning::DuplicateOrder { order: 1 },
                ValidationWarning::ExampleCountMismatch {
                    metadata: 5,
                    presentations: 2
                },
            ]
        );
    }

    #[test]
    fn test_titles_by_tier() {
        assert_eq!(lesson_title(&Tag::Fork, &Tier::Beginner), "Introduction to Fork Tactics");
        assert_eq!(lesson_title(&Tag::MateIn2, &Tier::Expert), "Expert-Level Mate in Two");
    }
}
