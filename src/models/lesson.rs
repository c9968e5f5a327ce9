//! Assembled lessons.

use super::{Tag, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role of a step within an example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Presentation,
    Solution,
    Analysis,
}

impl StepKind {
    /// Role shown in the step title.
    pub fn title_role(&self) -> &'static str {
        match self {
            StepKind::Presentation => "Find the Best Move",
            StepKind::Solution => "Solution",
            StepKind::Analysis => "Analysis",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::Presentation => "presentation",
            StepKind::Solution => "solution",
            StepKind::Analysis => "analysis",
        };
        f.write_str(s)
    }
}

/// One step of a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonStep {
    pub kind: StepKind,
    pub title: String,
    pub body: String,
    /// FEN of the associated position
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Vec<String>>,
    /// Unique within a lesson
    pub order: u32,
    /// Id of the practice item this step presents
    pub item_id: String,
}

/// Aggregates over the lesson's items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonMetadata {
    pub example_count: usize,
    pub min_rating: u32,
    pub max_rating: u32,
    pub avg_rating: f64,
    pub avg_quality: f64,
    /// Union of all item tags, sorted
    pub tags_covered: Vec<Tag>,
    pub estimated_minutes: u32,
    pub includes_analysis: bool,
    pub progressive: bool,
}

/// A complete lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub tag: Tag,
    pub tier: Tier,
    pub introduction: String,
    pub steps: Vec<LessonStep>,
    pub summary: String,
    pub metadata: LessonMetadata,
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &LessonStep> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    pub fn presentation_count(&self) -> usize {
        self.steps_of(StepKind::Presentation).count()
    }
}
