use async_trait::async_trait;
use tracing::{debug, info};

use crate::{error::GenerationError, format::snippet, provider::GenerationConfig};

/// Longest piece of an error body kept in diagnostics
const BODY_SNIPPET_CHARS: usize = 500;

/// A hosted language model, reduced to the one call the selector needs.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_text: &str)
    -> Result<String, GenerationError>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: GenerationConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn request_body(&self, system_prompt: &str, user_text: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": system_prompt,
                },
                {
                    "role": "user",
                    "content": user_text,
                },
            ],
            "temperature": self.config.temperature,
        });

        if self.config.json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, GenerationError> {
        info!(model = %self.config.model, endpoint = %self.config.endpoint, "calling generation service");

        let response = self
            .http
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&self.request_body(system_prompt, user_text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: snippet(&body, BODY_SNIPPET_CHARS),
            });
        }

        let response = response.json::<serde_json::Value>().await?;
        extract_message_content(&response)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions payload
pub fn extract_message_content(response: &serde_json::Value) -> Result<String, GenerationError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            GenerationError::InvalidResponse(snippet(&response.to_string(), BODY_SNIPPET_CHARS))
        })?;

    debug!(chars = content.len(), "generation service answered");
    Ok(content.to_string())
}
