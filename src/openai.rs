//! Remote backend for OpenAI-compatible chat completion APIs.

use crate::{
    backend::{Backend, BackendKind, Outcome},
    config::Config,
    error::{Error, Result},
    prompt::{EnhancementRequest, strip_code_fence},
};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Credential file layout.
#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    openai_api_key: Option<String>,
}

/// Request body for the chat completions endpoint.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Reads `openai_api_key` from a JSON credential file.
///
/// # Errors
///
/// Returns a credential error if the file is missing or unreadable, is not
/// valid JSON, or lacks a non-empty `openai_api_key` field.
pub fn load_api_key(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).map_err(|e| Error::credential(path, e.to_string()))?;

    let credentials: Credentials = serde_json::from_str(&text)
        .map_err(|e| Error::credential(path, format!("invalid JSON: {e}")))?;

    credentials
        .openai_api_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::credential(path, "field 'openai_api_key' is missing or empty"))
}

/// Sends each prompt as a single user message to `{base_url}/chat/completions`.
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    /// Creates the backend, loading the API key from `config.api_key_path`.
    ///
    /// # Errors
    ///
    /// Returns a credential error if the key cannot be loaded, or a
    /// configuration error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = load_api_key(&config.api_key_path)?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/chat/completions",
                config.api_base_url.trim_end_matches('/')
            ),
            model: config.openai_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

impl Backend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Api
    }

    fn enhance(&mut self, request: &EnhancementRequest) -> Result<Outcome> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "POST {} ({} prompt bytes) for {}",
            self.endpoint,
            request.prompt.len(),
            request.relative_path.display()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::dispatch(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::dispatch(format!("cannot read response body: {e}")))?;

        if !status.is_success() {
            return Err(Error::dispatch(format!(
                "API returned {status}: {}",
                api_error_message(&text)
            )));
        }

        parse_completion(&text).map(|reply| Outcome::Enhanced(strip_code_fence(&reply).to_string()))
    }
}

/// Extracts the human-readable message from an API error body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Returns the first choice's text from a completion response body.
fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| Error::dispatch(format!("unexpected response: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::dispatch("API returned no completion text"))
}
