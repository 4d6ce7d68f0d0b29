use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Path of the image analysis endpoint on the relay
pub const ANALYZE_PATH: &str = "/api/analyze-image";

/// Body of `POST /api/analyze-image`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image_data_url: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Something that turns a still image and a prompt into a description
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, image_data_url: &str, query: &str) -> Result<String, AnalysisError>;
}

/// Client for the relay's analysis endpoint
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Request {
                details: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), ANALYZE_PATH),
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::new(
            &config.relay_url,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisClient for RelayClient {
    async fn analyze(&self, image_data_url: &str, query: &str) -> Result<String, AnalysisError> {
        let body = AnalyzeRequest {
            image_data_url: image_data_url.to_string(),
            query: query.to_string(),
        };

        debug!(
            "Posting {} byte image to {}",
            image_data_url.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Request {
                details: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AnalysisError::Request {
            details: e.to_string(),
        })?;
        trace!("Relay answered {}: {}", status, text);

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(AnalysisError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<AnalyzeResponse>(&text)
            .map(|r| r.result)
            .map_err(|e| AnalysisError::Request {
                details: format!("malformed relay response: {}", e),
            })
    }
}
