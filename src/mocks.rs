//! Mock implementations of the engine, content and repository seams for
//! testing without a UCI binary, network access or puzzle file.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::content::ContentGenerator;
use crate::evaluation::Evaluator;
use crate::models::{
    EngineScore, EvalMetadata, Evaluation, LessonError, PracticeItem, Result, SearchBudget,
};
use crate::repository::{apply_query, PuzzleRepository, SearchQuery};

// ---------------------------------------------------------------------------
// MockEvaluator
// ---------------------------------------------------------------------------

/// Mock evaluator returning canned scores keyed by exact FEN.
pub struct MockEvaluator {
    scores: HashMap<String, EngineScore>,
    default_score: i32,
    delay: Option<Duration>,
    delays: HashMap<String, Duration>,
    failing: bool,
    calls: AtomicUsize,
    budgets: Mutex<Vec<SearchBudget>>,
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvaluator {
    /// Evaluator that scores every position 0.
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
            default_score: 0,
            delay: None,
            delays: HashMap::new(),
            failing: false,
            calls: AtomicUsize::new(0),
            budgets: Mutex::new(Vec::new()),
        }
    }

    /// Centipawn score for an exact position.
    pub fn with_score(mut self, fen: &str, centipawns: i32) -> Self {
        self.scores
            .insert(fen.to_string(), EngineScore::Centipawns(centipawns));
        self
    }

    /// Forced mate (signed, White's perspective) for an exact position.
    pub fn with_mate(mut self, fen: &str, moves: i32) -> Self {
        self.scores.insert(fen.to_string(), EngineScore::Mate(moves));
        self
    }

    /// Score for positions without a canned entry.
    pub fn with_default_score(mut self, centipawns: i32) -> Self {
        self.default_score = centipawns;
        self
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering for one position only.
    pub fn with_delay_for(mut self, fen: &str, delay: Duration) -> Self {
        self.delays.insert(fen.to_string(), delay);
        self
    }

    /// Every call fails with an engine error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of evaluate calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Budgets seen, in call order.
    pub fn budgets(&self) -> Vec<SearchBudget> {
        self.budgets
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(&self, position: &str, budget: &SearchBudget) -> Result<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut budgets) = self.budgets.lock() {
            budgets.push(*budget);
        }

        if let Some(delay) = self.delays.get(position).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(LessonError::Engine("mock engine failure".to_string()));
        }

        let score = self
            .scores
            .get(position)
            .copied()
            .unwrap_or(EngineScore::Centipawns(self.default_score));
        let metadata = EvalMetadata {
            pv: vec!["e2e4".to_string()],
            depth: Some(budget.min_depth),
            ..Default::default()
        };
        Ok(Evaluation::from_engine(score, metadata))
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Mock content generator with canned text matched by prompt substring.
pub struct MockGenerator {
    contains_responses: Vec<(String, String)>,
    default_response: String,
    failing: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Generator answering every prompt with `text`.
    pub fn new(text: &str) -> Self {
        Self {
            contains_responses: Vec::new(),
            default_response: text.to_string(),
            failing: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts containing `pattern` with `text`. First match wins.
    pub fn with_response(mut self, pattern: &str, text: &str) -> Self {
        self.contains_responses
            .push((pattern.to_string(), text.to_string()));
        self
    }

    /// Every call fails with an upstream error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if self.failing {
            return Err(LessonError::Timeout(Duration::from_secs(1)));
        }
        for (pattern, text) in &self.contains_responses {
            if prompt.contains(pattern.as_str()) {
                return Ok(text.clone());
            }
        }
        Ok(self.default_response.clone())
    }
}

// ---------------------------------------------------------------------------
// StaticRepository
// ---------------------------------------------------------------------------

/// Repository over a fixed item list.
pub struct StaticRepository {
    items: Vec<PracticeItem>,
    failing: bool,
    searches: Mutex<Vec<SearchQuery>>,
}

impl StaticRepository {
    pub fn new(items: Vec<PracticeItem>) -> Self {
        Self {
            items,
            failing: false,
            searches: Mutex::new(Vec::new()),
        }
    }

    /// Every search fails with an IO error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    /// Queries received, in call order.
    pub fn searches(&self) -> Vec<SearchQuery> {
        self.searches
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PuzzleRepository for StaticRepository {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PracticeItem>> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(query.clone());
        }
        if self.failing {
            return Err(LessonError::io(
                "reading mock repository",
                std::io::Error::other("mock repository failure"),
            ));
        }
        Ok(apply_query(&self.items, query))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PracticeItem>> {
        Ok(self.items.iter().find(|item| item.id == id).cloned())
    }
}
