//! Natural-language analysis of a processed report.
//!
//! [`RagAnalyst`] retrieves the run's own chunks from the vector store,
//! asks an OpenAI-compatible chat model the run's question, and posts the
//! answer together with the rendered summary to a webhook.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::Token;
use crate::embedding::Embedder;
use crate::insights::ReportSummary;
use crate::report::{format_summary, TestCase, LINE_BREAK};
use crate::vector_store::{SearchFilter, VectorStore};

pub const DEFAULT_QUESTION: &str =
    "Summarise the failures in this test run, group them by likely cause and point out anything that needs attention.";

const SYSTEM_PROMPT: &str =
    "You analyse automated test-run reports. Answer using only the report summary and fragments provided. Be concise and concrete.";
const CONTEXT_CHUNKS: usize = 8;

pub struct AnalysisRequest<'a> {
    pub uuid: &'a str,
    pub team: &'a str,
    pub cases: &'a [TestCase],
    pub summary: &'a ReportSummary,
    pub question: &'a str,
}

#[async_trait]
pub trait Analyst: Send + Sync {
    /// Produce the analysis and deliver it.
    async fn analyze_and_post(&self, request: AnalysisRequest<'_>) -> Result<()>;
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AnalysisPost<'a> {
    pub uuid: &'a str,
    pub team: &'a str,
    pub question: &'a str,
    pub summary: String,
    pub analysis: String,
}

pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<Token>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        api_key: Option<Token>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create chat HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.as_str());
        }

        let response = request.send().await.context("Chat request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Chat API error {status}: {body_text}");
        }

        let parsed: ChatResponse = response.json().await.context("Invalid chat response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Chat API returned no answer"))
    }
}

pub struct RagAnalyst {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chat: ChatClient,
    http: Client,
    webhook_url: Option<String>,
}

impl RagAnalyst {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chat: ChatClient,
        webhook_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create webhook HTTP client")?;

        Ok(Self {
            embedder,
            store,
            chat,
            http,
            webhook_url,
        })
    }

    async fn retrieve_context(&self, request: &AnalysisRequest<'_>) -> Result<Vec<String>> {
        let vector = self
            .embedder
            .embed(&[request.question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response for question"))?;

        let filter = SearchFilter {
            team: Some(request.team),
            uuid: Some(request.uuid),
        };
        let hits = self.store.search(&vector, filter, CONTEXT_CHUNKS).await?;
        Ok(hits.into_iter().map(|h| h.text).collect())
    }

    async fn post(&self, post: &AnalysisPost<'_>) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            info!("No webhook configured; analysis for {}:\n{}", post.uuid, post.analysis);
            return Ok(());
        };

        let response = self
            .http
            .post(url)
            .json(post)
            .send()
            .await
            .context("Webhook request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Webhook error {status}: {body}");
        }
        Ok(())
    }
}

pub fn build_prompt(request: &AnalysisRequest<'_>, context: &[String]) -> String {
    let summary = format_summary(request.summary, false).replace(LINE_BREAK, "\n");
    let mut prompt = format!(
        "Team: {}\nReport: {}\nTest cases: {}\n\nSummary:\n{summary}\n",
        request.team,
        request.uuid,
        request.cases.len()
    );

    if !context.is_empty() {
        prompt.push_str("\nReport fragments:\n");
        for fragment in context {
            prompt.push_str("---\n");
            prompt.push_str(fragment);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!("\nQuestion: {}", request.question));
    prompt
}

#[async_trait]
impl Analyst for RagAnalyst {
    async fn analyze_and_post(&self, request: AnalysisRequest<'_>) -> Result<()> {
        // Retrieval only adds context; the summary alone still gives an answer.
        let context = match self.retrieve_context(&request).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Context retrieval failed for {}: {e:#}", request.uuid);
                Vec::new()
            }
        };

        let prompt = build_prompt(&request, &context);
        let analysis = self.chat.complete(SYSTEM_PROMPT, &prompt).await?;

        let post = AnalysisPost {
            uuid: request.uuid,
            team: request.team,
            question: request.question,
            summary: format_summary(request.summary, true),
            analysis,
        };
        self.post(&post).await?;

        info!("Analysis posted for {}", request.uuid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::report::aggregate;
    use crate::vector_store::ScoredChunk;
    use mockito::Matcher;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct FixedStore {
        fail: bool,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn upsert(&self, _: &[Chunk], _: &[Vec<f32>], _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        async fn search(
            &self,
            _: &[f32],
            filter: SearchFilter<'_>,
            _: usize,
        ) -> Result<Vec<ScoredChunk>> {
            if self.fail {
                bail!("qdrant unavailable");
            }
            Ok(vec![ScoredChunk {
                score: 0.9,
                text: format!("fragment for {}", filter.team.unwrap_or_default()),
            }])
        }
    }

    fn cases() -> Vec<TestCase> {
        serde_json::from_value(json!([
            {"name": "login", "status": "failed", "labels": [{"name": "parentSuite", "value": "Auth"}]},
        ]))
        .unwrap()
    }

    fn analyst(
        server: &mockito::Server,
        store_fails: bool,
        webhook: Option<String>,
    ) -> RagAnalyst {
        let chat = ChatClient::new(
            &server.url(),
            Some(Token::from("sk-chat")),
            "gpt-4o-mini",
            Duration::from_secs(5),
        )
        .unwrap();
        RagAnalyst::new(
            Arc::new(FixedEmbedder),
            Arc::new(FixedStore { fail: store_fails }),
            chat,
            webhook,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_build_prompt_includes_question_summary_and_context() {
        let cases = cases();
        let summary = aggregate(&cases, 0);
        let request = AnalysisRequest {
            uuid: "run-1",
            team: "Auth",
            cases: &cases,
            summary: &summary,
            question: "Why did login fail?",
        };

        let prompt = build_prompt(&request, &["fragment one".to_string()]);

        assert!(prompt.starts_with("Team: Auth\nReport: run-1\nTest cases: 1\n"));
        assert!(prompt.contains("passed=0, failed=1, broken=0, skipped=0"));
        assert!(prompt.contains("---\nfragment one\n"));
        assert!(prompt.ends_with("Question: Why did login fail?"));
        assert!(!prompt.contains(LINE_BREAK));
    }

    #[tokio::test]
    async fn test_analyze_posts_answer_to_webhook() {
        let mut server = mockito::Server::new_async().await;
        let chat = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-chat")
            .match_body(Matcher::Regex("fragment for Auth".to_string()))
            .with_body(json!({"choices": [{"message": {"content": "Login broke."}}]}).to_string())
            .create_async()
            .await;
        let hook = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "uuid": "run-1",
                "team": "Auth",
                "question": "What failed?",
                "analysis": "Login broke.",
            })))
            .with_status(204)
            .create_async()
            .await;

        let cases = cases();
        let summary = aggregate(&cases, 0);
        let webhook = Some(format!("{}/hook", server.url()));
        analyst(&server, false, webhook)
            .analyze_and_post(AnalysisRequest {
                uuid: "run-1",
                team: "Auth",
                cases: &cases,
                summary: &summary,
                question: "What failed?",
            })
            .await
            .unwrap();

        chat.assert_async().await;
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrieval_failure_still_answers() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(json!({"choices": [{"message": {"content": "ok"}}]}).to_string())
            .create_async()
            .await;

        let cases = cases();
        let summary = aggregate(&cases, 0);
        let result = analyst(&server, true, None)
            .analyze_and_post(AnalysisRequest {
                uuid: "run-1",
                team: "Auth",
                cases: &cases,
                summary: &summary,
                question: "q",
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_chat_failure_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("model overloaded")
            .create_async()
            .await;

        let cases = cases();
        let summary = aggregate(&cases, 0);
        let err = analyst(&server, false, None)
            .analyze_and_post(AnalysisRequest {
                uuid: "run-1",
                team: "Auth",
                cases: &cases,
                summary: &summary,
                question: "q",
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_webhook_failure_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(json!({"choices": [{"message": {"content": "ok"}}]}).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/hook")
            .with_status(502)
            .create_async()
            .await;

        let cases = cases();
        let summary = aggregate(&cases, 0);
        let webhook = Some(format!("{}/hook", server.url()));
        let err = analyst(&server, false, webhook)
            .analyze_and_post(AnalysisRequest {
                uuid: "run-1",
                team: "Auth",
                cases: &cases,
                summary: &summary,
                question: "q",
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("502"));
    }
}
