pub mod allure;

use async_trait::async_trait;

use crate::error::Result;

/// Fetches the raw body of a report run. Parsing belongs to the caller so
/// that an unparsable body can still be kept for diagnosis.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_report(&self, uuid: &str) -> Result<String>;
}
