#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::Duration;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Session;
use crate::domain::models::SessionTransport;
use crate::domain::models::TransportName;

/// Reads sessions from the workspace API.
pub struct HttpTransport {
    url: String,
    token: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn from_config() -> Result<HttpTransport> {
        let url = Config::get(ConfigKey::ApiUrl);
        if url.is_empty() {
            bail!("The http transport requires an API URL, set one with --api-url");
        }

        return Ok(HttpTransport {
            url: url.trim_end_matches('/').to_string(),
            token: Config::get(ConfigKey::ApiToken),
            timeout: Config::duration(ConfigKey::RequestTimeout)?,
        });
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = reqwest::Client::new().get(url).timeout(self.timeout);
        if self.token.is_empty() {
            return req;
        }

        return req.header("Authorization", format!("Bearer {}", self.token));
    }
}

#[async_trait]
impl SessionTransport for HttpTransport {
    fn name(&self) -> TransportName {
        return TransportName::Http;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = match self.get(&self.url).send().await {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, url = %self.url, "Session API is not reachable");
                bail!(format!("Session API is not reachable at {}", self.url));
            }
        };

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Session API health check failed");
            bail!("Session API health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        let res = self
            .get(&format!("{url}/api/sessions", url = self.url))
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::error!(status = status.as_u16(), "Session API rejected the request");
            bail!("Session API rejected the API token");
        }

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Failed to list sessions");
            bail!(format!(
                "Failed to list sessions, the API responded with status {}",
                status.as_u16()
            ));
        }

        let sessions = res.json::<Vec<Session>>().await?;
        tracing::trace!(count = sessions.len(), "Fetched sessions");

        return Ok(sessions);
    }
}
