//! HTTP chat-completions gateway.
//!
//! Talks to any endpoint speaking the OpenAI-compatible
//! `POST {base_url}/chat/completions` protocol. Authentication is a bearer
//! token read from an environment variable when the gateway is built.

use async_trait::async_trait;
use cohort_application::ports::model_gateway::{
    CompletionOptions, GatewayError, ModelCompletion, ModelGateway,
};
use cohort_domain::Message;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpGatewaySettings {
    pub base_url: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HttpGatewaySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4141/v1".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ModelGateway`] over an OpenAI-compatible HTTP endpoint.
pub struct HttpChatGateway {
    client: reqwest::Client,
    settings: HttpGatewaySettings,
}

impl HttpChatGateway {
    pub fn new(settings: HttpGatewaySettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

fn parse_completion(body: ChatResponse) -> Result<ModelCompletion, GatewayError> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GatewayError::InvalidResponse("response has no message content".into()))?;
    Ok(ModelCompletion { content })
}

fn classify_status(status: reqwest::StatusCode, model: &str, body: &str) -> GatewayError {
    let snippet: String = body.chars().take(300).collect();
    match status.as_u16() {
        404 => GatewayError::ModelNotAvailable(model.to_string()),
        408 | 504 => GatewayError::Timeout,
        _ => GatewayError::RequestFailed(format!("HTTP {}: {}", status, snippet)),
    }
}

#[async_trait]
impl ModelGateway for HttpChatGateway {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ModelCompletion, GatewayError> {
        let request = ChatRequest {
            model: options.model.as_str(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::ConnectionError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, options.model.as_str(), &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let completion = parse_completion(body)?;
        debug!(
            model = %options.model,
            chars = completion.content.chars().count(),
            "Model completion received"
        );
        Ok(completion)
    }
}
