//! Produces all text for one lesson, substituting fallbacks as needed.

use super::prompts::{self, ExampleStats};
use super::{fallback, is_valid_content, ContentGenerator};
use crate::models::{GenerationRequest, LessonConfig, PracticeItem, StepKind};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Text for one lesson. Step bodies are keyed by (example index, step kind).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonText {
    pub introduction: String,
    pub summary: String,
    pub bodies: HashMap<(usize, StepKind), String>,
    /// Pieces that fell back to a template
    pub fallbacks: usize,
}

impl LessonText {
    pub fn body(&self, index: usize, kind: StepKind) -> Option<&str> {
        self.bodies.get(&(index, kind)).map(String::as_str)
    }
}

/// Drives a [`ContentGenerator`] over every component of a lesson.
///
/// Without a generator every piece is a fallback template.
pub struct ContentWriter {
    generator: Option<Arc<dyn ContentGenerator>>,
    min_chars: usize,
    show_progress: bool,
}

impl ContentWriter {
    pub fn new(generator: Arc<dyn ContentGenerator>, config: &LessonConfig) -> Self {
        Self {
            generator: Some(generator),
            min_chars: config.min_content_chars,
            show_progress: config.show_progress,
        }
    }

    /// Writer that never calls out.
    pub fn offline(config: &LessonConfig) -> Self {
        Self {
            generator: None,
            min_chars: config.min_content_chars,
            show_progress: false,
        }
    }

    /// Write the introduction, summary and, when analysis is requested, the
    /// body of every step.
    pub async fn write(&self, items: &[PracticeItem], request: &GenerationRequest) -> LessonText {
        let info = request.tag.info();
        let stats = ExampleStats::from_items(items);
        let step_kinds: &[StepKind] = if request.include_analysis {
            &[StepKind::Presentation, StepKind::Solution, StepKind::Analysis]
        } else {
            &[]
        };

        let total = 2 + items.len() * step_kinds.len();
        let pb = self.progress_bar(total as u64);
        let mut text = LessonText::default();

        let (introduction, fell_back) = self
            .produce(
                "introduction",
                prompts::introduction(&request.tier, &info, stats),
                || fallback::introduction(&request.tag, &request.tier, stats),
            )
            .await;
        text.introduction = introduction;
        text.fallbacks += usize::from(fell_back);
        pb.inc(1);

        for (index, item) in items.iter().enumerate() {
            for &kind in step_kinds {
                let prompt = match kind {
                    StepKind::Presentation => prompts::presentation(item, &request.tier, &info),
                    StepKind::Solution => prompts::solution(item, &request.tier, &info),
                    StepKind::Analysis => prompts::analysis(item, &request.tier, &info),
                };
                let (body, fell_back) = self
                    .produce(kind_part(kind), prompt, || fallback::step(item, kind))
                    .await;
                text.bodies.insert((index, kind), body);
                text.fallbacks += usize::from(fell_back);
                pb.inc(1);
            }
            pb.set_message(format!("example {}", index + 1));
        }

        let (summary, fell_back) = self
            .produce(
                "summary",
                prompts::summary(&request.tier, &info, stats),
                || fallback::summary(&request.tag, stats),
            )
            .await;
        text.summary = summary;
        text.fallbacks += usize::from(fell_back);
        pb.finish_with_message(format!("{} fallbacks", text.fallbacks));

        debug!(
            pieces = total,
            fallbacks = text.fallbacks,
            "Lesson text written"
        );
        text
    }

    /// Generated text when it passes the validity check, else the fallback.
    async fn produce(
        &self,
        part: &str,
        prompt: String,
        fallback: impl FnOnce() -> String,
    ) -> (String, bool) {
        let Some(generator) = &self.generator else {
            return (fallback(), true);
        };

        match generator.generate(&prompt).await {
            Ok(content) if is_valid_content(&content, self.min_chars) => {
                (content.trim().to_string(), false)
            }
            Ok(content) => {
                warn!(
                    part = part,
                    chars = content.trim().chars().count(),
                    "Generated content rejected, using fallback"
                );
                (fallback(), true)
            }
            Err(e) => {
                warn!(part = part, error = %e, "Content generation failed, using fallback");
                (fallback(), true)
            }
        }
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

fn kind_part(kind: StepKind) -> &'static str {
    match kind {
        StepKind::Presentation => "presentation",
        StepKind::Solution => "solution",
        StepKind::Analysis => "analysis",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockGenerator;
    use crate::models::{Tag, Tier};

    const GOOD: &str = "A well-formed paragraph about the tactic that is long enough.";

    fn items(n: usize) -> Vec<PracticeItem> {
        (0..n)
            .map(|i| {
                PracticeItem::new(
                    format!("p{i}"),
                    "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
                    vec!["d1d8".into()],
                    vec![Tag::Pin],
                    1300 + i as u32 * 100,
                    0.8,
                )
            })
            .collect()
    }

    fn request(include_analysis: bool) -> GenerationRequest {
        GenerationRequest::builder(Tag::Pin, Tier::Intermediate)
            .count(2)
            .include_analysis(include_analysis)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_pieces_generated_with_analysis() {
        let generator = Arc::new(MockGenerator::new(GOOD));
        let writer = ContentWriter::new(generator.clone(), &LessonConfig::default());

        let text = writer.write(&items(2), &request(true)).await;
        assert_eq!(generator.calls(), 2 + 2 * 3);
        assert_eq!(text.fallbacks, 0);
        assert_eq!(text.introduction, GOOD);
        assert_eq!(text.body(1, StepKind::Analysis), Some(GOOD));
    }

    #[tokio::test]
    async fn test_without_analysis_only_intro_and_summary() {
        let generator = Arc::new(MockGenerator::new(GOOD));
        let writer = ContentWriter::new(generator.clone(), &LessonConfig::default());

        let text = writer.write(&items(2), &request(false)).await;
        assert_eq!(generator.calls(), 2);
        assert!(text.bodies.is_empty());
    }

    #[tokio::test]
    async fn test_refusal_falls_back_per_piece() {
        let generator = Arc::new(
            MockGenerator::new(GOOD).with_response("introduction", "I'm sorry, I cannot help with that"),
        );
        let writer = ContentWriter::new(generator, &LessonConfig::default());

        let text = writer.write(&items(1), &request(true)).await;
        assert_eq!(text.fallbacks, 1);
        assert!(text.introduction.starts_with("Welcome to Pin Tactics!"));
        assert_eq!(text.summary, GOOD);
    }

    #[tokio::test]
    async fn test_failing_generator_uses_templates() {
        let writer = ContentWriter::new(Arc::new(MockGenerator::failing()), &LessonConfig::default());
        let text = writer.write(&items(1), &request(true)).await;
        assert_eq!(text.fallbacks, 5);
        assert_eq!(text.body(0, StepKind::Solution), Some("The solution is: d1d8"));
    }

    #[tokio::test]
    async fn test_offline_writer() {
        let writer = ContentWriter::offline(&LessonConfig::default());
        let text = writer.write(&items(1), &request(false)).await;
        assert_eq!(text.fallbacks, 2);
        assert!(text.summary.starts_with("Lesson Summary: Pin Tactics"));
    }
}
