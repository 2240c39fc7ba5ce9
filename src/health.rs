use crate::protocol::HealthInfo;
use reqwest::StatusCode;
use std::time::Duration;

pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Advisory probe of the gateway's own `/health` endpoint.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    url: String,
    client: Option<reqwest::Client>,
}

impl HealthProbe {
    pub fn new(port: u16) -> Self {
        Self::with_url(format!("http://localhost:{port}/health"))
    }

    pub fn with_url(url: String) -> Self {
        let client = match reqwest::Client::builder()
            .timeout(HEALTH_CHECK_TIMEOUT)
            .build()
        {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build health check client");
                None
            }
        };
        Self { url, client }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `None` whenever the gateway cannot say how it is doing: connection
    /// errors, timeouts, any status but 200 and unexpected bodies alike.
    pub async fn check(&self) -> Option<HealthInfo> {
        let client = self.client.as_ref()?;
        let resp = match client.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "health check failed");
                return None;
            }
        };
        if resp.status() != StatusCode::OK {
            tracing::debug!(url = %self.url, status = %resp.status(), "health check unhealthy");
            return None;
        }
        let body = resp.bytes().await.ok()?;
        serde_json::from_slice(&body).ok()
    }
}
