//! OpenAI-compatible client (LM Studio, OpenAI, and servers speaking the same API).
//!
//! Uses `/chat/completions`, `/embeddings` and `/models` under the configured base URL,
//! which includes the version segment (default `http://127.0.0.1:1234/v1`, LM Studio).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatOptions, LlmBackend, LlmError};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1234/v1";

/// Client for an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
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
impl LlmBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    /// POST /chat/completions: non-streaming.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            temperature: options.temperature,
        };
        let res = self.authorized(self.client.post(&url)).json(&body).send().await?;
        let data: OpenAiChatResponse = Self::check(res).await?.json().await?;
        data.choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .map(|m| m.content.unwrap_or_default())
            .ok_or_else(|| LlmError::Malformed("chat response without choices".to_string()))
    }

    /// POST /embeddings: batch embeddings, reordered by `index`.
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let body = OpenAiEmbeddingRequest {
            model: model.to_string(),
            input: inputs.to_vec(),
        };
        let res = self.authorized(self.client.post(&url)).json(&body).send().await?;
        let mut data: OpenAiEmbeddingResponse = Self::check(res).await?.json().await?;
        if data.data.len() != inputs.len() {
            return Err(LlmError::Malformed(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                data.data.len()
            )));
        }
        data.data.sort_by_key(|d| d.index);
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }

    /// GET /models: list available models.
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let res = self.authorized(self.client.get(&url)).send().await?;
        let data: OpenAiModelsResponse = Self::check(res).await?.json().await?;
        Ok(data
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect())
    }
}

// --- OpenAI wire types ---

#[derive(Debug, Deserialize)]
struct OpenAiModelsResponse {
    data: Option<Vec<OpenAiModelObject>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_is_lm_studio() {
        assert_eq!(OpenAiClient::new(None, None).base_url(), DEFAULT_BASE_URL);
        let c = OpenAiClient::new(Some("https://api.openai.com/v1/".to_string()), None);
        assert_eq!(c.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn chat_response_first_choice_content() {
        let data: OpenAiChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#,
        )
        .unwrap();
        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content);
        assert_eq!(content.as_deref(), Some("hello"));
    }
}
