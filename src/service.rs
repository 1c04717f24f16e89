//! Caller-facing entry points over the [`Pipeline`].
//!
//! The default analysis question is shared by every run. Updates are
//! last-writer-wins and each run reads it once when it starts, so a change
//! never affects a run that is already in flight.

use log::info;
use tokio::sync::RwLock;

use crate::analysis::DEFAULT_QUESTION;
use crate::error::{ReportLensError, Result};
use crate::pipeline::{Pipeline, RunOutcome};

pub struct ReportService {
    pipeline: Pipeline,
    default_question: RwLock<String>,
}

impl ReportService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self::with_question(pipeline, DEFAULT_QUESTION)
    }

    pub fn with_question(pipeline: Pipeline, question: &str) -> Self {
        Self {
            pipeline,
            default_question: RwLock::new(question.to_string()),
        }
    }

    /// Replace the default question and return the stored value.
    pub async fn set_default_question(&self, question: &str) -> Result<String> {
        let question = require(question, "Prompt not provided.")?;
        *self.default_question.write().await = question.to_string();
        info!("Default analysis question updated");
        Ok(question.to_string())
    }

    pub async fn default_question(&self) -> String {
        self.default_question.read().await.clone()
    }

    /// Process a report with the current default question.
    pub async fn analyze(&self, uuid: &str) -> Result<RunOutcome> {
        let uuid = require(uuid, "UUID not provided.")?;
        let question = self.default_question().await;
        self.pipeline.run(uuid, &question).await
    }

    /// Process a report with a one-off question. The default is left alone.
    pub async fn analyze_with_question(&self, uuid: &str, question: &str) -> Result<RunOutcome> {
        let uuid = require(uuid, "UUID not provided.")?;
        let question = require(question, "Prompt not provided.")?;
        self.pipeline.run(uuid, question).await
    }
}

fn require<'a>(value: &'a str, message: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ReportLensError::Input(message.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::fakes::{healthy, Harness};

    fn service() -> (ReportService, Harness) {
        let h = healthy();
        (ReportService::new(h.pipeline()), h)
    }

    #[tokio::test]
    async fn test_analyze_uses_default_question() {
        let (service, h) = service();

        let outcome = service.analyze("run-1").await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Ok {
                team: "Auth".to_string()
            }
        );
        assert_eq!(*h.analyst.questions.lock().unwrap(), vec![DEFAULT_QUESTION]);
    }

    #[tokio::test]
    async fn test_set_default_question_applies_to_later_runs() {
        let (service, h) = service();

        let stored = service
            .set_default_question("  Which tests are flaky?  ")
            .await
            .unwrap();
        service.analyze("run-1").await.unwrap();

        assert_eq!(stored, "Which tests are flaky?");
        assert_eq!(service.default_question().await, "Which tests are flaky?");
        assert_eq!(
            *h.analyst.questions.lock().unwrap(),
            vec!["Which tests are flaky?"]
        );
    }

    #[tokio::test]
    async fn test_one_off_question_leaves_default_alone() {
        let (service, h) = service();

        service
            .analyze_with_question("run-1", "Why did logout fail?")
            .await
            .unwrap();

        assert_eq!(service.default_question().await, DEFAULT_QUESTION);
        assert_eq!(
            *h.analyst.questions.lock().unwrap(),
            vec!["Why did logout fail?"]
        );
    }

    #[tokio::test]
    async fn test_blank_inputs_are_rejected_before_fetching() {
        let (service, h) = service();

        let err = service.analyze("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.to_string(), "UUID not provided.");

        let err = service.analyze_with_question("run-1", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Prompt not provided.");

        let err = service.set_default_question("\n").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(service.default_question().await, DEFAULT_QUESTION);

        assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
    }
}
