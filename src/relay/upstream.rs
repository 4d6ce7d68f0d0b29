use crate::config::RelayConfig;
use crate::error::RelayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Vision model every relay request is answered by
pub const MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

pub(crate) const NO_ANALYSIS: &str = "No analysis available";

/// A remote model that can describe an image in answer to a prompt
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(&self, image_data_url: &str, query: &str) -> Result<String, RelayError>;

    fn model_name(&self) -> &str {
        MODEL
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: &'static str,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
    pub stream: bool,
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

/// Build the single-message chat completion carrying the prompt and the image
pub(crate) fn chat_request(image_data_url: &str, query: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: query.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_url.to_string(),
                    },
                },
            ],
        }],
        model: MODEL,
        temperature: 1.0,
        max_completion_tokens: 1024,
        top_p: 1.0,
        stream: false,
        stop: None,
    }
}

/// First choice's message content, or a placeholder when the model sent none
pub(crate) fn first_content(response: ChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_else(|| NO_ANALYSIS.to_string())
}

/// OpenAI-compatible chat completions client (Groq)
pub struct GroqChatClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl GroqChatClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::StartupFailed {
                details: format!("Failed to build upstream client: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
            api_key_env: "GROQ_API".to_string(),
        })
    }

    /// Build from config, reading the API key from the configured variable.
    /// A missing key is reported on each request rather than at startup.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!(
                "Environment variable {} is not set; analysis requests will fail",
                config.api_key_env
            );
        }

        let mut client = Self::new(
            config.upstream_url.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_seconds),
        )?;
        client.api_key_env = config.api_key_env.clone();
        Ok(client)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl VisionModel for GroqChatClient {
    async fn describe(&self, image_data_url: &str, query: &str) -> Result<String, RelayError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| RelayError::MissingApiKey {
            variable: self.api_key_env.clone(),
        })?;

        debug!("Forwarding {} byte image to {}", image_data_url.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&chat_request(image_data_url, query))
            .send()
            .await
            .map_err(|e| RelayError::Upstream {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<UpstreamErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("{} {}", status.as_u16(), text));
            return Err(RelayError::Upstream { details });
        }

        let completion = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| RelayError::Upstream {
                details: e.to_string(),
            })?;

        Ok(first_content(completion))
    }
}
