use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::provider::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// LLM backend, derived from the model identifier's routing prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
    Groq,
    OpenRouter,
    /// Local Ollama through its OpenAI-compatible endpoint.
    Ollama,
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Split `groq/llama-3.3-70b` style identifiers into backend + bare model name.
    ///
    /// Unprefixed `claude-*` models go to Anthropic, any other unprefixed model
    /// to OpenAI. An unknown prefix is rejected.
    pub fn route(model: &str) -> Result<(Self, String)> {
        let model = model.trim();
        if model.is_empty() {
            return Err(Error::config("empty model identifier"));
        }
        match model.split_once('/') {
            Some(("groq", rest)) => Ok((Self::Groq, rest.to_string())),
            Some(("ollama", rest)) => Ok((Self::Ollama, rest.to_string())),
            Some(("openrouter", rest)) => Ok((Self::OpenRouter, rest.to_string())),
            Some(("anthropic", rest)) => Ok((Self::Anthropic, rest.to_string())),
            Some(("openai", rest)) => Ok((Self::OpenAi, rest.to_string())),
            Some((prefix, _)) => Err(Error::config(format!(
                "unknown provider prefix '{prefix}' in model '{model}'"
            ))),
            None if model.starts_with("claude-") => Ok((Self::Anthropic, model.to_string())),
            None => Ok((Self::OpenAi, model.to_string())),
        }
    }
}

pub struct LlmClient {
    provider: Provider,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    base_url: String,
    http: HttpClient,
}

// -- Anthropic format --

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

// -- OpenAI-compatible format --

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

impl LlmClient {
    /// Build a client for a provider descriptor. Fails on an empty or
    /// unroutable model identifier; a missing key is not checked here.
    pub fn for_provider(
        config: &ProviderConfig,
        api_key: Option<&str>,
        max_tokens: u32,
    ) -> Result<Self> {
        let (provider, model) = Provider::route(&config.model)?;
        let http = HttpClient::new(
            concat!("topic-scout/", env!("CARGO_PKG_VERSION")),
            Duration::from_secs(180),
        )?;
        Ok(Self {
            provider,
            api_key: api_key.unwrap_or_default().to_string(),
            model,
            max_tokens,
            temperature: config.temperature,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().into()),
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub async fn complete(&self, system: &str, user_message: &str) -> Result<String> {
        debug!(provider = ?self.provider, model = %self.model, "sending LLM request");

        match self.provider {
            Provider::Anthropic => self.complete_anthropic(system, user_message).await,
            _ => self.complete_openai(system, user_message).await,
        }
    }

    /// Send a prompt and parse the response as JSON, stripping markdown fences if present.
    pub async fn complete_json<T: serde::de::DeserializeOwned>(
        &self,
        system: &str,
        user_message: &str,
    ) -> Result<T> {
        let text = self.complete(system, user_message).await?;
        serde_json::from_str(extract_json(&text))
            .map_err(|e| Error::parse(format!("parse LLM JSON: {e}\nraw: {text}")))
    }

    async fn complete_anthropic(&self, system: &str, user_message: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: vec![Msg {
                role: "user",
                content: user_message,
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| Error::parse(format!("serialize request: {e}")))?;

        let url = format!("{}/messages", self.base_url);
        let response_text = self
            .http
            .post_json_raw(
                &url,
                &body,
                &[
                    ("x-api-key", self.api_key.as_str()),
                    ("anthropic-version", "2023-06-01"),
                ],
            )
            .await
            .inspect_err(|e| warn!("Anthropic API error: {e}"))?;

        let resp: AnthropicResponse = serde_json::from_str(&response_text)
            .map_err(|e| Error::parse(format!("parse Anthropic response: {e}")))?;

        Ok(resp
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn complete_openai(&self, system: &str, user_message: &str) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user_message,
                },
            ],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| Error::parse(format!("serialize request: {e}")))?;

        let url = format!("{}/chat/completions", self.base_url);
        let auth = format!("Bearer {}", self.api_key);
        let mut headers = Vec::new();
        if !self.api_key.is_empty() {
            headers.push(("Authorization", auth.as_str()));
        }
        let response_text = self
            .http
            .post_json_raw(&url, &body, &headers)
            .await
            .inspect_err(|e| warn!(provider = ?self.provider, "LLM API error: {e}"))?;

        let resp: OpenAiResponse = serde_json::from_str(&response_text)
            .map_err(|e| Error::parse(format!("parse LLM response: {e}")))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::parse("empty response from LLM"))
    }
}

/// Extract JSON from a response that might be wrapped in markdown code fences.
pub fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let content = &text[start + 7..];
        if let Some(end) = content.find("```") {
            return content[..end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let content = &text[start + 3..];
        if let Some(end) = content.find("```") {
            let inner = content[..end].trim();
            if inner.starts_with('{') {
                return inner;
            }
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}
