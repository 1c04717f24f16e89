use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use url::Url;

use crate::auth::Credentials;
use crate::error::{ReportLensError, Result};
use crate::providers::ReportSource;

#[derive(Debug, Clone)]
pub struct AllureClientOptions {
    pub credentials: Credentials,
    /// Skip TLS certificate validation.
    pub insecure: bool,
    pub timeout: Duration,
}

impl Default for AllureClientOptions {
    fn default() -> Self {
        Self {
            credentials: Credentials::Anonymous,
            insecure: false,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct AllureClient {
    client: Client,
    api_url: Url,
    credentials: Credentials,
}

impl AllureClient {
    pub fn new(base_url: &str, options: AllureClientOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reportlens/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure)
            .build()
            .map_err(|e| ReportLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| ReportLensError::Config(format!("Invalid Allure URL: {e}")))?;
        if api_url.cannot_be_a_base() {
            return Err(ReportLensError::Config(format!(
                "Invalid Allure URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            api_url,
            credentials: options.credentials,
        })
    }

    /// `{base}/report/{uuid}/test-cases/aggregate`, with `uuid` percent-encoded.
    pub fn report_url(&self, uuid: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| ReportLensError::Config("Allure URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["report", uuid, "test-cases", "aggregate"]);
        Ok(url)
    }
}

#[async_trait]
impl ReportSource for AllureClient {
    async fn fetch_report(&self, uuid: &str) -> Result<String> {
        let url = self.report_url(uuid)?;
        debug!("GET {url}");

        let request = self.credentials.apply(self.client.get(url));
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportLensError::Api(format!("{status} - {body}")));
        }

        let body = response.text().await?;
        info!("Fetched report data from Allure for {uuid} ({} bytes)", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::error::ErrorKind;

    fn client(base: &str, credentials: Credentials) -> AllureClient {
        let options = AllureClientOptions {
            credentials,
            ..AllureClientOptions::default()
        };
        AllureClient::new(base, options).unwrap()
    }

    #[test]
    fn test_report_url() {
        let c = client("https://allure.example.com/api/", Credentials::Anonymous);
        assert_eq!(
            c.report_url("abc-123").unwrap().as_str(),
            "https://allure.example.com/api/report/abc-123/test-cases/aggregate"
        );

        let c = client("https://allure.example.com/api", Credentials::Anonymous);
        assert_eq!(
            c.report_url("abc").unwrap().as_str(),
            "https://allure.example.com/api/report/abc/test-cases/aggregate"
        );
    }

    #[test]
    fn test_report_url_encodes_uuid() {
        let c = client("https://allure.example.com", Credentials::Anonymous);
        assert_eq!(
            c.report_url("../x y").unwrap().as_str(),
            "https://allure.example.com/report/..%2Fx%20y/test-cases/aggregate"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = AllureClient::new("not a url", AllureClientOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ReportLensError::Config(_)));
    }

    #[tokio::test]
    async fn test_fetch_report_returns_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/report/r1/test-cases/aggregate")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"[{"name": "a"}]"#)
            .create_async()
            .await;

        let c = client(&server.url(), Credentials::Bearer(Token::from("secret")));
        let body = c.fetch_report("r1").await.unwrap();

        assert_eq!(body, r#"[{"name": "a"}]"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_report_returns_body_even_when_not_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/report/r2/test-cases/aggregate")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let c = client(&server.url(), Credentials::Anonymous);

        assert_eq!(c.fetch_report("r2").await.unwrap(), "<html>maintenance</html>");
    }

    #[tokio::test]
    async fn test_fetch_report_non_success_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/report/r3/test-cases/aggregate")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let c = client(&server.url(), Credentials::Anonymous);
        let err = c.fetch_report("r3").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("busy"));
    }

    #[tokio::test]
    async fn test_fetch_report_uses_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        // "alice:pw" base64-encoded
        let mock = server
            .mock("GET", "/report/r4/test-cases/aggregate")
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let c = client(&server.url(), Credentials::resolve(None, Some("alice"), Some("pw")));
        c.fetch_report("r4").await.unwrap();

        mock.assert_async().await;
    }
}
