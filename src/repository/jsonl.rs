//! In-memory repository loaded from a JSONL export.

use super::{apply_query, PuzzleRepository, SearchQuery};
use crate::models::{LessonError, PracticeItem, Provenance, Result, Tag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// One line of a puzzle export (lichess column names accepted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleRecord {
    #[serde(alias = "PuzzleId", alias = "id")]
    pub puzzle_id: String,
    #[serde(alias = "FEN")]
    pub fen: String,
    /// Space-separated UCI moves
    #[serde(alias = "Moves")]
    pub moves: String,
    #[serde(alias = "Rating")]
    pub rating: u32,
    #[serde(default, alias = "Themes")]
    pub themes: ThemeField,
    #[serde(default)]
    pub primary_theme: Option<String>,
    #[serde(default, alias = "Popularity")]
    pub popularity: Option<i32>,
    #[serde(default, alias = "NbPlays")]
    pub nb_plays: Option<u32>,
    #[serde(default, alias = "GameUrl")]
    pub game_url: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

/// Themes as a JSON list or a space-separated string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeField {
    List(Vec<String>),
    Text(String),
}

impl Default for ThemeField {
    fn default() -> Self {
        ThemeField::List(Vec::new())
    }
}

impl ThemeField {
    fn tags(&self) -> Vec<Tag> {
        match self {
            ThemeField::List(list) => list.iter().map(|t| Tag::parse(t)).collect(),
            ThemeField::Text(text) => text.split_whitespace().map(Tag::parse).collect(),
        }
    }
}

impl PuzzleRecord {
    pub fn into_item(self) -> PracticeItem {
        let solution = self.moves.split_whitespace().map(str::to_string).collect();
        let item = PracticeItem::new(
            self.puzzle_id,
            self.fen,
            solution,
            self.themes.tags(),
            self.rating,
            self.quality_score.unwrap_or(0.5),
        );

        let item = match self.primary_theme.filter(|t| !t.trim().is_empty()) {
            Some(primary) => item.with_primary_tag(Tag::parse(&primary)),
            None => item,
        };

        if self.popularity.is_some() || self.nb_plays.is_some() || self.game_url.is_some() {
            item.with_provenance(Provenance {
                popularity: self.popularity,
                play_count: self.nb_plays,
                source_url: self.game_url,
            })
        } else {
            item
        }
    }
}

/// Repository holding every item in memory.
#[derive(Debug, Default)]
pub struct JsonlRepository {
    items: Vec<PracticeItem>,
    by_id: HashMap<String, usize>,
}

impl JsonlRepository {
    /// Load items from a JSONL file. Blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LessonError::io("opening puzzle file", e))?;
        let reader = BufReader::new(file);
        let mut items = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LessonError::io("reading puzzle file", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: PuzzleRecord = serde_json::from_str(&line)
                .map_err(|e| LessonError::ParseError(format!("Line {}: {}", line_num + 1, e)))?;
            items.push(record.into_item());
        }

        info!(count = items.len(), path = %path.display(), "Loaded practice items");
        Ok(Self::from_items(items))
    }

    /// Build from items already in memory. Later duplicates of an id are dropped.
    pub fn from_items(items: Vec<PracticeItem>) -> Self {
        let mut by_id = HashMap::with_capacity(items.len());
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if by_id.contains_key(&item.id) {
                debug!(id = %item.id, "Duplicate item id ignored");
                continue;
            }
            by_id.insert(item.id.clone(), kept.len());
            kept.push(item);
        }
        Self { items: kept, by_id }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PracticeItem] {
        &self.items
    }

    /// Number of items carrying each tag.
    pub fn tag_counts(&self) -> BTreeMap<Tag, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            for tag in &item.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl PuzzleRepository for JsonlRepository {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PracticeItem>> {
        let found = apply_query(&self.items, query);
        debug!(tag = %query.tag, found = found.len(), "Repository search");
        Ok(found)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PracticeItem>> {
        Ok(self.by_id.get(id).map(|&idx| self.items[idx].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LINES: &str = r#"{"puzzle_id":"p1","fen":"6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1","moves":"d1d8","rating":900,"themes":["mateIn1","backRankMate"],"popularity":95,"nb_plays":1200,"quality_score":0.9}

{"PuzzleId":"p2","FEN":"r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4","Moves":"h5f7","Rating":1100,"Themes":"mateIn1 short","quality_score":0.7}
{"puzzle_id":"p3","fen":"6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1","moves":"d1d8","rating":1500,"themes":["pin"],"primary_theme":"fork"}
"#;

    fn write_repo(dir: &TempDir) -> JsonlRepository {
        let path = dir.path().join("puzzles.jsonl");
        std::fs::write(&path, LINES).unwrap();
        JsonlRepository::load(&path).unwrap()
    }

    #[tokio::test]
    async fn test_load_accepts_both_column_styles() {
        let dir = TempDir::new().unwrap();
        let repo = write_repo(&dir);
        assert_eq!(repo.len(), 3);

        let p2 = repo.get_by_id("p2").await.unwrap().unwrap();
        assert_eq!(p2.tags, vec![Tag::MateIn1, Tag::Other("short".into())]);
        assert_eq!(p2.solution, vec!["h5f7"]);
        assert!(p2.provenance.is_none());

        let p3 = repo.get_by_id("p3").await.unwrap().unwrap();
        assert_eq!(p3.primary_tag, Tag::Fork);
        assert_eq!(p3.quality, 0.5);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let repo = write_repo(&dir);
        let query = SearchQuery {
            tag: Tag::MateIn1,
            rating_min: 600,
            rating_max: 1200,
            min_quality: 0.6,
            limit: 10,
        };
        let found = repo.search(&query).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);

        let limited = repo.search(&SearchQuery { limit: 1, ..query }).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"puzzle_id\":\"x\"}\n").unwrap();
        let err = JsonlRepository::load(&path).unwrap_err();
        assert!(err.to_string().contains("Line 1"));
    }

    #[test]
    fn test_tag_counts() {
        let dir = TempDir::new().unwrap();
        let repo = write_repo(&dir);
        let counts = repo.tag_counts();
        assert_eq!(counts.get(&Tag::MateIn1), Some(&2));
        assert_eq!(counts.get(&Tag::Fork), Some(&1));
    }
}
