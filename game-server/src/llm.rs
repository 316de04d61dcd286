use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use game_core::{ChatRole, ChatTurn};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("request to language model failed: {0}")]
    Request(String),
    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid language model response: {0}")]
    Decode(String),
    #[error("language model returned no text")]
    EmptyReply,
}

/// A conversational language model. Every call carries the whole conversation,
/// so implementations keep no per-player state.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn send(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        input: &str,
    ) -> Result<String, ChatError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            generation_config: GenerationConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    pub fn build_request(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        input: &str,
    ) -> GenerateContentRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                };
                Content::text(Some(role), &turn.text)
            })
            .collect();
        contents.push(Content::text(Some("user"), input));

        GenerateContentRequest {
            system_instruction: Content::text(None, system_prompt),
            contents,
            generation_config: self.generation_config.clone(),
        }
    }
}

/// Concatenated text of the first candidate.
pub fn extract_reply(response: GenerateContentResponse) -> Result<String, ChatError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ChatError::EmptyReply);
    }
    Ok(text)
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn send(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        input: &str,
    ) -> Result<String, ChatError> {
        let request = self.build_request(system_prompt, history, input);
        tracing::debug!(
            "Sending turn {} to {}",
            request.contents.len().div_ceil(2),
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;

        extract_reply(body)
    }
}
