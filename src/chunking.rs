//! Turns a parsed report into text chunks for embedding and keeps a copy of
//! them on disk.
//!
//! Chunk 0 is the plain-text summary; every test case then gets its own
//! chunk (several when its text is longer than `max_chars`). Chunk ids are
//! UUIDv5 values derived from the run UUID and the chunk index, so
//! processing the same report again overwrites the same vector points.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::insights::ReportSummary;
use crate::report::{format_summary_with, Captions, TestCase, LINE_BREAK};

pub const DEFAULT_MAX_CHARS: usize = 2000;
const MIN_CHUNK_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub index: usize,
    pub text: String,
}

#[derive(Debug)]
pub struct ChunkSet {
    pub chunks: Vec<Chunk>,
    /// Where the chunk file was written.
    pub path: PathBuf,
}

impl ChunkSet {
    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }
}

#[derive(Serialize)]
struct ChunkFile<'a> {
    uuid: &'a str,
    team: &'a str,
    chunks: &'a [Chunk],
}

pub struct ChunkStore {
    dir: PathBuf,
    max_chars: usize,
}

impl ChunkStore {
    pub fn new(dir: impl Into<PathBuf>, max_chars: usize) -> Self {
        Self {
            dir: dir.into(),
            max_chars: max_chars.max(MIN_CHUNK_CHARS),
        }
    }

    /// Build the chunk set and write it to `{dir}/{uuid}_chunks.json`.
    pub fn persist(
        &self,
        uuid: &str,
        team: &str,
        cases: &[TestCase],
        summary: &ReportSummary,
    ) -> Result<ChunkSet> {
        let chunks = build_chunks(uuid, team, cases, summary, self.max_chars);

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}_chunks.json", safe_file_stem(uuid)));
        let file = ChunkFile {
            uuid,
            team,
            chunks: &chunks,
        };
        std::fs::write(&path, serde_json::to_vec_pretty(&file)?)?;

        Ok(ChunkSet { chunks, path })
    }
}

pub fn build_chunks(
    uuid: &str,
    team: &str,
    cases: &[TestCase],
    summary: &ReportSummary,
    max_chars: usize,
) -> Vec<Chunk> {
    let summary_text = format_summary_with(summary, false, &Captions::english())
        .replace(LINE_BREAK, "\n")
        .replace("**", "");

    let mut texts: Vec<String> = split_text(&summary_text, max_chars)
        .into_iter()
        .map(str::to_string)
        .collect();
    for case in cases {
        let case_text = describe_case(case, team);
        texts.extend(split_text(&case_text, max_chars).into_iter().map(str::to_string));
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: chunk_id(uuid, index),
            index,
            text,
        })
        .collect()
}

fn chunk_id(uuid: &str, index: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{uuid}:{index}").as_bytes()).to_string()
}

fn describe_case(case: &TestCase, team: &str) -> String {
    let mut lines = vec![
        format!("Test: {}", case.name.as_deref().unwrap_or("<unnamed>")),
        format!("Status: {}", case.status.as_deref().unwrap_or("unknown")),
        format!("Team: {team}"),
    ];

    let labels: Vec<String> = case
        .labels
        .iter()
        .filter_map(|l| Some(format!("{}={}", l.name.as_deref()?, l.value.as_deref()?)))
        .collect();
    if !labels.is_empty() {
        lines.push(format!("Labels: {}", labels.join(", ")));
    }

    let defects = case.defect_links();
    if !defects.is_empty() {
        lines.push(format!("Defects: {}", defects.join(", ")));
    }

    lines.join("\n")
}

/// Split on line or space boundaries so that no piece exceeds `max_chars`
/// bytes, falling back to a hard cut on a char boundary.
fn split_text(text: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = text.trim();

    while remaining.len() > max_chars {
        let mut split_at = max_chars;
        while !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        if split_at == 0 {
            split_at = remaining.chars().next().map_or(1, char::len_utf8);
        }

        let head = &remaining[..split_at];
        let cut = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .filter(|&pos| pos > 0)
            .map_or(split_at, |pos| pos + 1);

        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        remaining = remaining[cut..].trim_start();
    }

    if !remaining.is_empty() {
        pieces.push(remaining);
    }

    pieces
}

/// File-name-safe form of a run UUID.
pub(crate) fn safe_file_stem(uuid: &str) -> String {
    uuid.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate;
    use serde_json::json;

    fn cases() -> Vec<TestCase> {
        serde_json::from_value(json!([
            {
                "name": "login works",
                "status": "passed",
                "labels": [{"name": "parentSuite", "value": "Auth"}, {"name": "owner", "value": "alice"}],
            },
            {
                "name": "logout works",
                "status": "failed",
                "links": [{"type": "jira", "url": "https://jira/AUTH-1"}],
            },
        ]))
        .unwrap()
    }

    #[test]
    fn test_summary_chunk_then_one_per_case() {
        let cases = cases();
        let summary = aggregate(&cases, 0);
        let chunks = build_chunks("run-1", "Auth", &cases, &summary, DEFAULT_MAX_CHARS);

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.contains("passed=1, failed=1, broken=0, skipped=0"));
        assert!(!chunks[0].text.contains(LINE_BREAK));
        assert!(chunks[1].text.starts_with("Test: login works\nStatus: passed\nTeam: Auth"));
        assert!(chunks[1].text.contains("owner=alice"));
        assert!(chunks[2].text.contains("Defects: https://jira/AUTH-1"));
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_chunk_ids_are_deterministic_per_run() {
        let cases = cases();
        let summary = aggregate(&cases, 0);
        let first = build_chunks("run-1", "Auth", &cases, &summary, DEFAULT_MAX_CHARS);
        let again = build_chunks("run-1", "Auth", &cases, &summary, DEFAULT_MAX_CHARS);
        let other = build_chunks("run-2", "Auth", &cases, &summary, DEFAULT_MAX_CHARS);

        assert_eq!(first, again);
        assert_ne!(first[0].id, other[0].id);
        assert_ne!(first[0].id, first[1].id);
    }

    #[test]
    fn test_long_case_spans_several_chunks() {
        let long_name = "step ".repeat(60);
        let cases: Vec<TestCase> = serde_json::from_value(json!([
            {"name": long_name.trim(), "status": "failed"},
            {"name": "short", "status": "passed"},
        ]))
        .unwrap();
        let summary = aggregate(&cases, 0);

        let chunks = build_chunks("run-1", "Auth", &cases, &summary, 128);

        assert!(chunks.len() > 3);
        assert!(chunks.iter().all(|c| c.text.len() <= 128));
        assert!(chunks[1].text.starts_with("Test: step step"));
        assert!(chunks.last().unwrap().text.contains("Test: short"));
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            (0..chunks.len()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_split_long_text_on_spaces() {
        let text = "word ".repeat(100);
        let pieces = split_text(&text, 64);

        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.len() <= 64));
        assert!(pieces.iter().all(|p| p.starts_with("word")));
        assert_eq!(pieces.join(" ").split(' ').count(), 100);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ж".repeat(100);
        let pieces = split_text(&text, 65);

        assert!(pieces.iter().all(|p| p.len() <= 65));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_split_short_and_empty_text() {
        assert_eq!(split_text("  short  ", 64), vec!["short"]);
        assert!(split_text("   ", 64).is_empty());
    }

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("abc-123_x"), "abc-123_x");
        assert_eq!(safe_file_stem("../etc/passwd"), "___etc_passwd");
    }

    #[test]
    fn test_persist_writes_chunk_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path().join("chunks"), DEFAULT_MAX_CHARS);
        let cases = cases();
        let summary = aggregate(&cases, 0);

        let set = store.persist("run/1", "Auth", &cases, &summary).unwrap();

        assert_eq!(set.path, dir.path().join("chunks").join("run_1_chunks.json"));
        let saved: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&set.path).unwrap()).unwrap();
        assert_eq!(saved["uuid"], "run/1");
        assert_eq!(saved["team"], "Auth");
        assert_eq!(saved["chunks"].as_array().unwrap().len(), set.chunks.len());
        assert_eq!(set.texts().len(), 3);
    }
}
