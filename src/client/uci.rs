//! UCI engine adapter.
//!
//! Epistemic foundation:
//! - K_i: UCI is line-oriented text over stdin/stdout
//! - K_i: Engine scores are from the side to move; ours are from White
//! - B_i: The binary exists and speaks UCI (might fail → EngineUnavailable / Engine)
//! - I^B: Search time is bounded by `movetime`; reads carry their own timeout
//! - I^B: Startup eats into the caller's budget, so `movetime` is what is left
//!   after the handshake

use crate::evaluation::position::white_to_move;
use crate::evaluation::Evaluator;
use crate::models::{
    EngineConfig, EngineScore, EvalMetadata, Evaluation, LessonError, Result, SearchBudget,
    MATE_SCORE,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Time allowed for the `uci` / `isready` handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Held back from the search for `bestmove` and `quit`.
const SEARCH_RESERVE: Duration = Duration::from_millis(100);

/// Floor for `movetime` once startup has used up the budget.
const MIN_MOVETIME: Duration = Duration::from_millis(10);

/// Search time left in `budget` after `startup` has elapsed.
pub fn search_movetime(budget: &SearchBudget, startup: Duration) -> Duration {
    Duration::from_secs_f64(budget.time_limit_secs.max(0.0))
        .saturating_sub(startup + SEARCH_RESERVE)
        .max(MIN_MOVETIME)
}

/// Evaluator backed by an external UCI binary, one process per call.
#[derive(Debug, Clone)]
pub struct UciEngine {
    path: PathBuf,
}

impl UciEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn spawn(&self) -> Result<UciSession> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LessonError::EngineUnavailable {
                path: self.path.display().to_string(),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LessonError::Engine("Failed to capture engine stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LessonError::Engine("Failed to capture engine stdout".into()))?;

        Ok(UciSession {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }
}

#[async_trait]
impl Evaluator for UciEngine {
    async fn evaluate(&self, position: &str, budget: &SearchBudget) -> Result<Evaluation> {
        let white = white_to_move(position)?;
        let started = Instant::now();
        let mut session = self.spawn()?;

        session.send("uci").await?;
        session.read_until("uciok", HANDSHAKE_TIMEOUT).await?;
        session
            .send(&format!("setoption name MultiPV value {}", budget.line_count.max(1)))
            .await?;
        session.send("isready").await?;
        session.read_until("readyok", HANDSHAKE_TIMEOUT).await?;

        let startup = started.elapsed();
        let movetime_ms = search_movetime(budget, startup).as_millis() as u64;
        debug!(
            startup_ms = startup.as_millis() as u64,
            movetime_ms = movetime_ms,
            "Engine ready"
        );
        session.send(&format!("position fen {}", position.trim())).await?;
        session
            .send(&format!("go depth {} movetime {}", budget.min_depth, movetime_ms))
            .await?;

        let search_limit = Duration::from_millis(movetime_ms) + HANDSHAKE_TIMEOUT;
        let info_lines = session.read_search(search_limit).await?;
        session.quit().await;

        let best = pick_line(&info_lines).ok_or_else(|| {
            LessonError::Engine(format!("No score reported for position '{position}'"))
        })?;

        debug!(
            engine = %self.path.display(),
            depth = ?best.depth,
            lines = info_lines.len(),
            "Engine search finished"
        );
        Ok(best.into_evaluation(white))
    }
}

/// One running engine process.
struct UciSession {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl UciSession {
    async fn send(&mut self, command: &str) -> Result<()> {
        let io = |e| LessonError::io("writing to engine", e);
        self.stdin.write_all(command.as_bytes()).await.map_err(io)?;
        self.stdin.write_all(b"\n").await.map_err(io)?;
        self.stdin.flush().await.map_err(io)
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String> {
        let mut line = String::new();
        match tokio::time::timeout(timeout, self.stdout.read_line(&mut line)).await {
            Ok(Ok(0)) => Err(LessonError::Engine("Engine process exited".to_string())),
            Ok(Ok(_)) => Ok(line.trim().to_string()),
            Ok(Err(e)) => Err(LessonError::io("reading from engine", e)),
            Err(_) => Err(LessonError::Timeout(timeout)),
        }
    }

    async fn read_until(&mut self, token: &str, timeout: Duration) -> Result<()> {
        loop {
            if self.read_line(timeout).await? == token {
                return Ok(());
            }
        }
    }

    /// Collect the latest scored `info` line per MultiPV slot until `bestmove`.
    async fn read_search(&mut self, timeout: Duration) -> Result<BTreeMap<u32, InfoLine>> {
        let mut lines = BTreeMap::new();
        loop {
            let line = self.read_line(timeout).await?;
            if line.starts_with("bestmove") {
                return Ok(lines);
            }
            if let Some(info) = parse_info(&line) {
                lines.insert(info.multipv, info);
            }
        }
    }

    async fn quit(mut self) {
        if self.send("quit").await.is_err() {
            let _ = self.child.kill().await;
        }
        if let Err(e) = self.child.wait().await {
            warn!(error = %e, "Engine process did not exit cleanly");
        }
    }
}

/// Parsed `info ... score ...` line. Score is from the side to move.
#[derive(Debug, Clone, PartialEq)]
struct InfoLine {
    multipv: u32,
    depth: Option<u32>,
    seldepth: Option<u32>,
    nodes: Option<u64>,
    score: EngineScore,
    pv: Vec<String>,
    extra: BTreeMap<String, String>,
}

impl InfoLine {
    fn into_evaluation(self, white_to_move: bool) -> Evaluation {
        let score = if white_to_move {
            self.score
        } else {
            match self.score {
                EngineScore::Centipawns(cp) => EngineScore::Centipawns(-cp),
                EngineScore::Mate(n) => EngineScore::Mate(-n),
            }
        };
        let metadata = EvalMetadata {
            pv: self.pv,
            depth: self.depth,
            seldepth: self.seldepth,
            nodes: self.nodes,
            multipv: Some(self.multipv),
            extra: self.extra,
            engine_score: None,
        };
        let mut evaluation = Evaluation::from_engine(score, metadata);
        // Mate 0 cannot be negated; Black to move and mated is a White win
        if score == EngineScore::Mate(0) && !white_to_move {
            evaluation.score = Some(MATE_SCORE);
        }
        evaluation
    }
}

fn parse_info(line: &str) -> Option<InfoLine> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }

    let mut multipv = 1;
    let mut depth = None;
    let mut seldepth = None;
    let mut nodes = None;
    let mut score = None;
    let mut pv = Vec::new();
    let mut extra = BTreeMap::new();

    while let Some(key) = tokens.next() {
        match key {
            "multipv" => multipv = tokens.next()?.parse().ok()?,
            "depth" => depth = tokens.next().and_then(|t| t.parse().ok()),
            "seldepth" => seldepth = tokens.next().and_then(|t| t.parse().ok()),
            "nodes" => nodes = tokens.next().and_then(|t| t.parse().ok()),
            "score" => {
                let kind = tokens.next()?;
                let value: i32 = tokens.next()?.parse().ok()?;
                score = match kind {
                    "cp" => Some(EngineScore::Centipawns(value)),
                    "mate" => Some(EngineScore::Mate(value)),
                    _ => None,
                };
            }
            "lowerbound" | "upperbound" => {
                extra.insert("bound".to_string(), key.to_string());
            }
            "pv" => {
                pv = tokens.by_ref().map(str::to_string).collect();
            }
            "string" => return None,
            other => {
                if let Some(value) = tokens.next() {
                    extra.insert(other.to_string(), value.to_string());
                }
            }
        }
    }

    Some(InfoLine {
        multipv,
        depth,
        seldepth,
        nodes,
        score: score?,
        pv,
        extra,
    })
}

/// The shortest mate for the side to move across all lines, else line 1.
fn pick_line(lines: &BTreeMap<u32, InfoLine>) -> Option<InfoLine> {
    let shortest_mate = lines
        .values()
        .filter_map(|line| match line.score {
            EngineScore::Mate(n) if n > 0 => Some((n, line)),
            _ => None,
        })
        .min_by_key(|(n, _)| *n)
        .map(|(_, line)| line);

    shortest_mate
        .or_else(|| lines.get(&1))
        .or_else(|| lines.values().next())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_line() {
        let line = "info depth 22 seldepth 30 multipv 2 score cp -35 nodes 123456 nps 900000 hashfull 12 tbhits 0 time 137 pv e7e5 g1f3 b8c6";
        let info = parse_info(line).unwrap();
        assert_eq!(info.multipv, 2);
        assert_eq!(info.depth, Some(22));
        assert_eq!(info.seldepth, Some(30));
        assert_eq!(info.nodes, Some(123_456));
        assert_eq!(info.score, EngineScore::Centipawns(-35));
        assert_eq!(info.pv, vec!["e7e5", "g1f3", "b8c6"]);
        assert_eq!(info.extra.get("nps").map(String::as_str), Some("900000"));
    }

    #[test]
    fn test_lines_without_score_are_ignored() {
        assert!(parse_info("info depth 3 currmove e2e4 currmovenumber 1").is_none());
        assert!(parse_info("info string NNUE evaluation enabled").is_none());
        assert!(parse_info("bestmove e2e4").is_none());
    }

    #[test]
    fn test_black_to_move_is_flipped() {
        let info = parse_info("info depth 10 score mate 2 pv d8d1").unwrap();
        let evaluation = info.into_evaluation(false);
        assert_eq!(evaluation.mate, Some(-2));
        assert_eq!(evaluation.score, Some(-9_998));

        let info = parse_info("info depth 10 score cp 120 pv e2e4").unwrap();
        assert_eq!(info.into_evaluation(false).score, Some(-120));
    }

    #[test]
    fn test_mated_side_sets_the_sign() {
        let info = parse_info("info depth 0 score mate 0").unwrap();
        let black_mated = info.clone().into_evaluation(false);
        assert_eq!(black_mated.score, Some(MATE_SCORE));
        assert_eq!(black_mated.mate, Some(0));

        let white_mated = info.into_evaluation(true);
        assert_eq!(white_mated.score, Some(-MATE_SCORE));
        assert_eq!(white_mated.mate, Some(0));
    }

    #[test]
    fn test_search_movetime_leaves_room_for_startup() {
        let budget = SearchBudget::new(3.0, 25, 3);
        assert_eq!(
            search_movetime(&budget, Duration::ZERO),
            Duration::from_millis(2_900)
        );
        assert_eq!(
            search_movetime(&budget, Duration::from_millis(800)),
            Duration::from_millis(2_100)
        );
        assert_eq!(search_movetime(&budget, Duration::from_secs(5)), MIN_MOVETIME);
        assert_eq!(
            search_movetime(&SearchBudget::new(-1.0, 5, 1), Duration::ZERO),
            MIN_MOVETIME
        );
    }

    #[test]
    fn test_pick_prefers_shortest_mate() {
        let mut lines = BTreeMap::new();
        for raw in [
            "info depth 20 multipv 1 score cp 900 pv a1a8",
            "info depth 20 multipv 2 score mate 3 pv b1b8",
            "info depth 20 multipv 3 score mate 2 pv c1c8",
        ] {
            let info = parse_info(raw).unwrap();
            lines.insert(info.multipv, info);
        }
        let best = pick_line(&lines).unwrap();
        assert_eq!(best.score, EngineScore::Mate(2));

        lines.retain(|k, _| *k == 1);
        assert_eq!(pick_line(&lines).unwrap().score, EngineScore::Centipawns(900));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = UciEngine::new("/nonexistent/uci-engine-binary");
        let err = engine
            .evaluate(
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                &SearchBudget::new(0.1, 5, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LessonError::EngineUnavailable { .. }));
    }

    /// Answers after a half-second load, then searches for exactly the
    /// requested `movetime` and reports it back as `time`.
    #[cfg(unix)]
    const SLOW_START_ENGINE: &str = r#"#!/bin/sh
sleep 0.5
while read -r line; do
  case "$line" in
    uci) echo "id name slowstart"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      ms=${line##*movetime }
      sleep "$(awk "BEGIN { print $ms / 1000 }")"
      echo "info depth 12 multipv 1 score cp 35 time $ms pv e2e4"
      echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_startup_fits_inside_hard_bound() {
        use crate::cache::EvaluationCache;
        use crate::evaluation::CachedEvaluator;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::Arc;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("slowstart");
        std::fs::write(&path, SLOW_START_ENGINE).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let evaluator = CachedEvaluator::new(
            Arc::new(UciEngine::new(&path)),
            Arc::new(EvaluationCache::in_memory(Duration::from_secs(3600))),
            Duration::from_millis(250),
        );
        let budget = SearchBudget::new(1.0, 25, 1);
        let evaluation = evaluator
            .evaluate(
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                &budget,
            )
            .await
            .unwrap();

        assert_eq!(evaluation.score, Some(35));
        let searched: u64 = evaluation.metadata.extra["time"].parse().unwrap();
        assert!(searched <= 400, "movetime {searched} ignores startup");
        assert!(searched >= MIN_MOVETIME.as_millis() as u64);
    }
}
