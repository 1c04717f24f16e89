//! Report pipeline: fetch, validate, aggregate, chunk, embed/upload, analyze.
//!
//! Stages run strictly in order. Anything that fails up to and including
//! the embedding upload ends the run with an error. A failed analysis only
//! downgrades the run to [`RunOutcome::Partial`]; the uploaded chunks stay
//! searchable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;

use crate::analysis::{AnalysisRequest, Analyst};
use crate::chunking::{safe_file_stem, ChunkSet, ChunkStore};
use crate::embedding::Embedder;
use crate::error::{ReportLensError, Result};
use crate::providers::ReportSource;
use crate::report::{aggregate, extract_team_name, parse_report};
use crate::vector_store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Validating,
    Aggregating,
    Chunking,
    Embedding,
    Analyzing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Aggregating => "aggregating",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding/uploading",
            Self::Analyzing => "analyzing",
        };
        f.write_str(name)
    }
}

/// How a run that got past the embedding upload ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum RunOutcome {
    Ok { team: String },
    Partial { team: String, error: String },
}

pub struct Pipeline {
    source: Arc<dyn ReportSource>,
    chunks: ChunkStore,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    analyst: Arc<dyn Analyst>,
    diagnostics_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ReportSource>,
        chunks: ChunkStore,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        analyst: Arc<dyn Analyst>,
        diagnostics_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            chunks,
            embedder,
            store,
            analyst,
            diagnostics_dir: diagnostics_dir.into(),
        }
    }

    /// Run every stage for one report, asking `question` in the analysis.
    pub async fn run(&self, uuid: &str, question: &str) -> Result<RunOutcome> {
        enter(uuid, Stage::Fetching);
        let body = self
            .source
            .fetch_report(uuid)
            .await
            .inspect_err(|e| error!("[{uuid}] {e}"))?;

        enter(uuid, Stage::Validating);
        let cases = match parse_report(&body) {
            Ok(cases) => cases,
            Err(source) => {
                let path = self
                    .save_invalid_body(uuid, &body)
                    .inspect_err(|e| error!("[{uuid}] Could not save invalid response: {e}"))?;
                error!(
                    "[{uuid}] Invalid JSON received, saved raw response to {}",
                    path.display()
                );
                return Err(ReportLensError::InvalidReport { path, source });
            }
        };

        let Some(team) = extract_team_name(&cases) else {
            error!("[{uuid}] Team name not found in report");
            return Err(ReportLensError::Input(
                "Team name (parentSuite) not found.".to_string(),
            ));
        };
        info!("[{uuid}] Team name extracted: {team}");

        enter(uuid, Stage::Aggregating);
        let summary = aggregate(&cases, Utc::now().timestamp());
        info!(
            "[{uuid}] Aggregated {} cases, {} with a known status",
            cases.len(),
            summary.total_counted()
        );

        enter(uuid, Stage::Chunking);
        let chunk_set = self
            .chunks
            .persist(uuid, &team, &cases, &summary)
            .inspect_err(|e| error!("[{uuid}] Failed to save chunks: {e}"))?;
        info!(
            "[{uuid}] Saved {} chunks to {}",
            chunk_set.chunks.len(),
            chunk_set.path.display()
        );

        enter(uuid, Stage::Embedding);
        self.embed_and_upload(uuid, &team, &chunk_set)
            .await
            .map_err(|e| {
                error!("[{uuid}] Failed to upload embeddings: {e:#}");
                ReportLensError::Upload(format!("{e:#}"))
            })?;
        info!("[{uuid}] Embeddings uploaded");

        enter(uuid, Stage::Analyzing);
        let request = AnalysisRequest {
            uuid,
            team: &team,
            cases: &cases,
            summary: &summary,
            question,
        };
        match self.analyst.analyze_and_post(request).await {
            Ok(()) => {
                info!("[{uuid}] Done");
                Ok(RunOutcome::Ok { team })
            }
            Err(e) => {
                warn!("[{uuid}] Analysis failed, embeddings are kept: {e:#}");
                Ok(RunOutcome::Partial {
                    team,
                    error: format!("{e:#}"),
                })
            }
        }
    }

    async fn embed_and_upload(
        &self,
        uuid: &str,
        team: &str,
        chunk_set: &ChunkSet,
    ) -> anyhow::Result<()> {
        let vectors = self.embedder.embed(&chunk_set.texts()).await?;
        if vectors.len() != chunk_set.chunks.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunk_set.chunks.len()
            );
        }
        self.store
            .upsert(&chunk_set.chunks, &vectors, team, uuid)
            .await
    }

    fn save_invalid_body(&self, uuid: &str, body: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.diagnostics_dir)?;
        let path = diagnostic_path(&self.diagnostics_dir, uuid);
        std::fs::write(&path, body)?;
        Ok(path)
    }
}

pub fn diagnostic_path(dir: &Path, uuid: &str) -> PathBuf {
    dir.join(format!("{}_invalid_allure_response.txt", safe_file_stem(uuid)))
}

fn enter(uuid: &str, stage: Stage) {
    info!("[{uuid}] {stage}");
}
