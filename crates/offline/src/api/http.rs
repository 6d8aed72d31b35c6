use std::time::Duration;

use serde::{Deserialize, Serialize};

use staffsync_applications::ApplicationSnapshot;

use super::{ApplyRequest, MarketplaceApi, WithdrawRequest};
use crate::config::SyncConfig;
use crate::error::ApiError;

/// Upper bound on TCP/TLS connection setup, independent of the request budget.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Structured rejection body returned by the backend on 4xx.
#[derive(Debug, Deserialize)]
struct RejectionBody {
    code: String,
    message: String,
}

/// reqwest client for the marketplace mutation endpoints.
#[derive(Debug, Clone)]
pub struct HttpMarketplaceClient {
    client: reqwest::Client,
    base_url: reqwest::Url,
    token: Option<String>,
}

impl HttpMarketplaceClient {
    pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = reqwest::Url::parse(api_url)
            .map_err(|e| ApiError::Setup(format!("invalid api url '{api_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Setup(format!("api url '{api_url}' cannot be a base")));
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(CONNECT_TIMEOUT))
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Build a client from `api_url`, `request_timeout` and `auth_token`.
    pub fn from_config(config: &SyncConfig) -> Result<Self, ApiError> {
        let client = Self::new(&config.api_url, config.request_timeout)?;
        Ok(match &config.auth_token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        })
    }

    /// Send `Authorization: Bearer {token}` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post<B>(&self, url: reqwest::Url, body: &B) -> Result<ApplicationSnapshot, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut req = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        // A body cut short is a network failure, not a bad answer.
        let body = resp.bytes().await.map_err(|e| {
            tracing::debug!(%status, error = %e, "response body read failed");
            ApiError::Transport(e.to_string())
        })?;

        if status.is_success() {
            return serde_json::from_slice::<ApplicationSnapshot>(&body)
                .map_err(|e| ApiError::Decode(e.to_string()));
        }

        let text = String::from_utf8_lossy(&body).into_owned();
        if status.is_server_error() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: text,
            });
        }

        Err(match serde_json::from_str::<RejectionBody>(&text) {
            Ok(body) => ApiError::Rejected {
                status: status.as_u16(),
                code: body.code,
                message: body.message,
            },
            Err(_) => ApiError::Rejected {
                status: status.as_u16(),
                code: status.as_str().to_string(),
                message: text,
            },
        })
    }
}

#[async_trait::async_trait]
impl MarketplaceApi for HttpMarketplaceClient {
    async fn apply(&self, request: &ApplyRequest) -> Result<ApplicationSnapshot, ApiError> {
        let url = self.endpoint(&["applications"]);
        self.post(url, request).await
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> Result<ApplicationSnapshot, ApiError> {
        let url = self.endpoint(&[
            "applications",
            request.application_id.as_str(),
            "withdraw",
        ]);
        self.post(url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_the_base_path() {
        let client =
            HttpMarketplaceClient::new("https://api.example.test/v2/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.endpoint(&["applications", "A 1", "withdraw"]).as_str(),
            "https://api.example.test/v2/applications/A%201/withdraw"
        );
    }

    #[test]
    fn malformed_base_url_is_a_setup_error() {
        let err = HttpMarketplaceClient::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ApiError::Setup(_)));
        assert!(!err.is_connectivity());
    }
}
