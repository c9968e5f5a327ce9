//! In-memory evaluation cache with best-effort durable persistence.

use super::entry::{cache_key, CacheEntry};
use crate::models::{CacheConfig, Evaluation, LessonError, Result, SearchBudget};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Memoizes evaluator calls keyed by (position, budget).
///
/// One coarse lock guards the map; evaluation calls dominate latency.
/// The durable file must be owned by a single process.
pub struct EvaluationCache {
    /// Durable file; `None` keeps the cache purely in memory
    path: Option<PathBuf>,
    max_age: Duration,
    flush_every: u64,
    entries: Mutex<HashMap<String, CacheEntry>>,
    insertions: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Fraction of lookups that hit, in [0, 1]
    pub hit_rate: f64,
    pub cached_positions: usize,
    pub file_size_bytes: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} positions, {} hits, {} misses ({:.1}% hit rate), {} bytes on disk",
            self.cached_positions,
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.file_size_bytes
        )
    }
}

impl EvaluationCache {
    /// Open a durable cache, loading and pruning any existing file.
    ///
    /// Never fails: a missing file starts empty, an unreadable or corrupt
    /// file is logged and treated as a cold cache.
    pub fn open(path: impl Into<PathBuf>, max_age: Duration, flush_every: u64) -> Self {
        let path = path.into();
        let entries = load_entries(&path, max_age);
        Self {
            path: Some(path),
            max_age,
            flush_every: flush_every.max(1),
            entries: Mutex::new(entries),
            insertions: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::open(config.path.clone(), config.max_age(), config.flush_every)
    }

    /// Cache without a backing file.
    pub fn in_memory(max_age: Duration) -> Self {
        Self {
            path: None,
            max_age,
            flush_every: u64::MAX,
            entries: Mutex::new(HashMap::new()),
            insertions: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a fresh result. Expired entries are removed and count as misses.
    pub fn get(&self, position: &str, budget: &SearchBudget) -> Option<Evaluation> {
        let key = cache_key(position, budget);
        let now = Utc::now();
        let mut entries = self.lock();

        let fresh = match entries.get(&key).map(|e| e.is_fresh(self.max_age, now)) {
            Some(true) => entries.get(&key).map(CacheEntry::to_evaluation),
            Some(false) => {
                entries.remove(&key);
                debug!(key = %key, "Expired cache entry removed");
                None
            }
            None => None,
        };

        match fresh {
            Some(evaluation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(position = %short(position), "Cache hit");
                Some(evaluation)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(position = %short(position), "Cache miss");
                None
            }
        }
    }

    /// Store a result, flushing every Nth insertion.
    pub fn set(&self, position: &str, budget: &SearchBudget, evaluation: &Evaluation) {
        let key = cache_key(position, budget);
        {
            let mut entries = self.lock();
            entries.insert(key, CacheEntry::new(position, evaluation));
        }
        debug!(position = %short(position), "Cached evaluation");

        let inserted = self.insertions.fetch_add(1, Ordering::Relaxed) + 1;
        if inserted % self.flush_every == 0 {
            self.flush_best_effort();
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let removed = {
            let mut entries = self.lock();
            let before = entries.len();
            entries.retain(|_, entry| entry.is_fresh(self.max_age, now));
            before - entries.len()
        };

        if removed > 0 {
            info!(removed = removed, "Removed expired cache entries");
            self.flush_best_effort();
        }
        removed
    }

    /// Drop all entries and counters, and delete the durable file.
    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.insertions.store(0, Ordering::Relaxed);

        if let Some(path) = &self.path {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "Could not delete cache file");
                }
            }
        }
        info!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let file_size_bytes = self
            .path
            .as_deref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            cached_positions: self.len(),
            file_size_bytes,
        }
    }

    /// Write the full map to disk (atomic write-then-rename).
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = {
            let entries = self.lock();
            serde_json::to_vec_pretty(&*entries)
                .map_err(|e| LessonError::Internal(format!("Serializing cache: {e}")))?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LessonError::io("creating cache dir", e))?;
        }

        let temp_path = temp_path_for(path);
        fs::write(&temp_path, &bytes).map_err(|e| LessonError::io("writing temp cache", e))?;
        fs::rename(&temp_path, path).map_err(|e| LessonError::io("renaming cache file", e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Cache flushed");
        Ok(())
    }

    /// Flush, logging instead of failing.
    pub fn flush_best_effort(&self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Could not save cache file");
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_entries(path: &Path, max_age: Duration) -> HashMap<String, CacheEntry> {
    if !path.exists() {
        return HashMap::new();
    }

    let loaded: std::result::Result<HashMap<String, CacheEntry>, String> = File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|file| serde_json::from_reader(BufReader::new(file)).map_err(|e| e.to_string()));

    match loaded {
        Ok(all) => {
            let total = all.len();
            let now = Utc::now();
            let kept: HashMap<String, CacheEntry> = all
                .into_iter()
                .filter(|(_, entry)| entry.is_fresh(max_age, now))
                .collect();
            info!(
                loaded = kept.len(),
                expired = total - kept.len(),
                "Loaded cached positions"
            );
            kept
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not load cache file, starting cold");
            HashMap::new()
        }
    }
}

fn short(position: &str) -> &str {
    match position.char_indices().nth(20) {
        Some((idx, _)) => &position[..idx],
        None => position,
    }
}
