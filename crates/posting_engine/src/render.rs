use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("render timed out")]
    Timeout,
    #[error("render service returned status {0}")]
    Status(u16),
    #[error("render failed: {0}")]
    Failed(String),
}

/// Produces post-script markup for pages that ship an empty shell.
///
/// Invoked at most once per run, only when the orchestrator reaches the
/// render strategy.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<String, RenderError>;
}

/// Client for a prerender-style HTTP service: `GET {endpoint}?url=<page>`
/// answers with the rendered document.
#[derive(Debug, Clone)]
pub struct RenderServiceClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl RenderServiceClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RenderError::Failed(err.to_string()))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait::async_trait]
impl Renderer for RenderServiceClient {
    async fn render(&self, url: &Url) -> Result<String, RenderError> {
        let mut request_url = self.endpoint.clone();
        request_url.query_pairs_mut().append_pair("url", url.as_str());

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    RenderError::Timeout
                } else {
                    RenderError::Failed(err.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(RenderError::Status(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|err| RenderError::Failed(err.to_string()))
    }
}
