//! Connection settings shared by the `analyze` and `serve` commands.
//!
//! Every flag can also come from the environment, which is how the service
//! is configured when deployed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::analysis::{ChatClient, RagAnalyst};
use crate::auth::{Credentials, Token};
use crate::chunking::{ChunkStore, DEFAULT_MAX_CHARS};
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::pipeline::Pipeline;
use crate::providers::allure::{AllureClient, AllureClientOptions};
use crate::service::ReportService;
use crate::vector_store::{QdrantStore, VectorStore};

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Allure report service base URL
    #[arg(long, env = "ALLURE_API")]
    pub allure_url: String,

    /// Allure API token (bearer auth, takes precedence over user/password)
    #[arg(long, env = "ALLURE_TOKEN", hide_env_values = true)]
    pub allure_token: Option<String>,

    /// Allure user for basic auth
    #[arg(long, env = "ALLURE_USER")]
    pub allure_user: Option<String>,

    /// Allure password for basic auth
    #[arg(long, env = "ALLURE_PASSWORD", hide_env_values = true)]
    pub allure_password: Option<String>,

    /// Skip TLS certificate validation when talking to Allure
    #[arg(long, env = "ALLURE_INSECURE", default_value_t = false)]
    pub insecure: bool,

    /// Timeout for Allure requests, in seconds
    #[arg(long, env = "ALLURE_TIMEOUT_SECS", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Timeout for embedding, chat, vector store and webhook calls, in seconds
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 60)]
    pub provider_timeout_secs: u64,

    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    #[arg(long, env = "QDRANT_COLLECTION", default_value = "allure_reports")]
    pub qdrant_collection: String,

    /// Where analysis results are posted (logged only when unset)
    #[arg(long, env = "ANALYSIS_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Initial default analysis question
    #[arg(long = "default-question", env = "ANALYSIS_QUESTION")]
    pub question: Option<String>,

    /// Directory for persisted chunk files
    #[arg(long, env = "CHUNK_DIR")]
    pub chunk_dir: Option<PathBuf>,

    /// Directory for invalid report bodies kept for diagnosis
    #[arg(long, env = "DIAGNOSTICS_DIR")]
    pub diagnostics_dir: Option<PathBuf>,
}

impl Settings {
    pub fn credentials(&self) -> Credentials {
        Credentials::resolve(
            self.allure_token.as_deref(),
            self.allure_user.as_deref(),
            self.allure_password.as_deref(),
        )
    }

    pub fn chunk_dir(&self) -> PathBuf {
        self.chunk_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("reportlens").join("chunks"))
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.diagnostics_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// The configured default question, when one is set and not blank.
    pub fn question_override(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Wire the real collaborators into a ready-to-use service.
    pub fn build_service(&self) -> Result<ReportService> {
        let provider_timeout = Duration::from_secs(self.provider_timeout_secs);
        let openai_key = self.openai_api_key.as_deref().map(Token::from);

        let source = AllureClient::new(
            &self.allure_url,
            AllureClientOptions {
                credentials: self.credentials(),
                insecure: self.insecure,
                timeout: Duration::from_secs(self.fetch_timeout_secs),
            },
        )
        .context("Failed to create Allure client")?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
            &self.openai_base_url,
            openai_key.clone(),
            &self.embedding_model,
            provider_timeout,
        )?);

        let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(
            &self.qdrant_url,
            &self.qdrant_collection,
            self.qdrant_api_key.as_deref().map(Token::from),
            provider_timeout,
        )?);

        let chat = ChatClient::new(
            &self.openai_base_url,
            openai_key,
            &self.chat_model,
            provider_timeout,
        )?;
        let analyst = RagAnalyst::new(
            embedder.clone(),
            store.clone(),
            chat,
            self.webhook_url.clone(),
            provider_timeout,
        )?;

        let pipeline = Pipeline::new(
            Arc::new(source),
            ChunkStore::new(self.chunk_dir(), DEFAULT_MAX_CHARS),
            embedder,
            store,
            Arc::new(analyst),
            self.diagnostics_dir(),
        );

        Ok(match self.question_override() {
            Some(question) => ReportService::with_question(pipeline, question),
            None => ReportService::new(pipeline),
        })
    }
}
