//! Durable storage for embedded report chunks.
//!
//! Points are tagged with the run's team and UUID so that later retrieval
//! can be scoped to one report or one team. [`QdrantStore`] speaks the
//! Qdrant REST API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::info;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::auth::Token;
use crate::chunking::Chunk;

/// A stored chunk returned by [`VectorStore::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter<'a> {
    pub team: Option<&'a str>,
    pub uuid: Option<&'a str>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        team: &str,
        uuid: &str,
    ) -> Result<()>;

    async fn search(
        &self,
        vector: &[f32],
        filter: SearchFilter<'_>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;
}

pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    api_key: Option<Token>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    score: f32,
    #[serde(default)]
    payload: serde_json::Map<String, serde_json::Value>,
}

impl QdrantStore {
    pub fn new(
        base_url: &str,
        collection: &str,
        api_key: Option<Token>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create Qdrant HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key.as_str()),
            None => request,
        }
    }

    /// Create the collection with cosine distance when it does not exist yet.
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let response = self
            .authed(self.client.get(self.collection_url()))
            .send()
            .await
            .context("Qdrant collection lookup failed")?;

        match response.status() {
            status if status.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => {
                let body = response.text().await.unwrap_or_default();
                bail!("Qdrant collection lookup error {status}: {body}");
            }
        }

        info!("Creating Qdrant collection {} ({dims} dims)", self.collection);
        let body = json!({"vectors": {"size": dims, "distance": "Cosine"}});
        let response = self
            .authed(self.client.put(self.collection_url()).json(&body))
            .send()
            .await
            .context("Qdrant collection creation failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant collection creation error {status}: {body}");
        }

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        team: &str,
        uuid: &str,
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "Got {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }
        let Some(dims) = vectors.first().map(Vec::len) else {
            return Ok(());
        };

        self.ensure_collection(dims).await?;

        let points: Vec<_> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                json!({
                    "id": chunk.id,
                    "vector": vector,
                    "payload": {
                        "uuid": uuid,
                        "team": team,
                        "index": chunk.index,
                        "text": chunk.text,
                    },
                })
            })
            .collect();

        let response = self
            .authed(
                self.client
                    .put(format!("{}/points?wait=true", self.collection_url()))
                    .json(&json!({ "points": points })),
            )
            .send()
            .await
            .context("Qdrant upsert failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant upsert error {status}: {body}");
        }

        info!(
            "Upserted {} points into {} for team {team}, report {uuid}",
            points.len(),
            self.collection
        );
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: SearchFilter<'_>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let must: Vec<_> = [("team", filter.team), ("uuid", filter.uuid)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| json!({"key": key, "match": {"value": v}})))
            .collect();

        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if !must.is_empty() {
            body["filter"] = json!({ "must": must });
        }

        let response = self
            .authed(
                self.client
                    .post(format!("{}/points/search", self.collection_url()))
                    .json(&body),
            )
            .send()
            .await
            .context("Qdrant search failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant search error {status}: {body}");
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Invalid Qdrant search response")?;

        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredChunk {
                score: hit.score,
                text: hit
                    .payload
                    .get("text")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }
}
