//! Ollama API client (http://127.0.0.1:11434 by default).
//! Non-streaming chat, batch embeddings and model listing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatOptions, LlmBackend, LlmError};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Client for Ollama HTTP API.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        Ok(res)
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    /// POST /api/chat with stream: false.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            options: options.temperature.map(|temperature| RequestOptions { temperature }),
        };
        let res = self.client.post(&url).json(&body).send().await?;
        let data: ChatResponse = Self::check(res).await?.json().await?;
        data.message
            .map(|m| m.content)
            .ok_or_else(|| LlmError::Malformed("chat response without message".to_string()))
    }

    /// POST /api/embed: batch embeddings.
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: model.to_string(),
            input: inputs.to_vec(),
        };
        let res = self.client.post(&url).json(&body).send().await?;
        let data: EmbedResponse = Self::check(res).await?.json().await?;
        if data.embeddings.len() != inputs.len() {
            return Err(LlmError::Malformed(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                data.embeddings.len()
            )));
        }
        Ok(data.embeddings)
    }

    /// GET /api/tags: list available models.
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self.client.get(&url).send().await?;
        let data: TagsResponse = Self::check(res).await?.json().await?;
        Ok(data
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.name)
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<RequestOptions>,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<OllamaModel>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = OllamaClient::new(Some("http://localhost:11434/".to_string()));
        assert_eq!(c.base_url(), "http://localhost:11434");
        assert_eq!(OllamaClient::new(None).base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn chat_request_omits_options_without_temperature() {
        let body = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            stream: false,
            options: None,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("options").is_none());
        assert_eq!(v["messages"][0]["role"], "user");
    }
}
