use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{ChatTurn, Role};

/// Failures from the remote generative-text service, surfaced as explicit
/// results so the web layer can pattern-match instead of catching blindly.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request to model API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Model API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Model API returned no candidate text")]
    EmptyResponse,
}

impl LlmError {
    /// Stable machine-readable kind for the JSON error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Transport(_) => "transport",
            LlmError::Api { .. } => "api",
            LlmError::EmptyResponse => "empty_response",
        }
    }
}

// Structures matching the generateContent endpoint.
#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Content,
}

// The remote API names the assistant role "model".
fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Client for the remote generative-text service. One instance is created
/// when the credential is supplied and reused for every call after that.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// `timeout` of `None` leaves the outbound calls unbounded; a slow remote
    /// service then stalls the chat until it answers or errors.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Stateful call shape: persona instruction plus the full transcript so
    /// far, replayed on every turn.
    pub async fn generate_with_history(
        &self,
        system_instruction: &str,
        history: &[ChatTurn],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: history
                .iter()
                .map(|turn| Content {
                    role: Some(wire_role(turn.role).to_string()),
                    parts: vec![Part { text: turn.text.clone() }],
                })
                .collect(),
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part { text: system_instruction.to_string() }],
            }),
            generation_config: Some(GenerationConfig { temperature }),
        };
        self.generate(&request).await
    }

    /// Stateless call shape: a single prompt with no history and no persona.
    pub async fn generate_single(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            system_instruction: None,
            generation_config: None,
        };
        self.generate(&request).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %message, "Model API request failed");
            return Err(LlmError::Api { status, message });
        }

        let body: GenerateResponse = response.json().await?;
        debug!(?body, "Received model API response");

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
