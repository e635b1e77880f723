//! OpenAI-compatible chat-completions client.
//!
//! Runs on worker threads, so it uses reqwest's blocking client. A fresh
//! client is built per call so that no blocking runtime is ever created or
//! dropped on an async executor thread.

use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ChatCompletion;
use crate::error::AnalysisError;
use crate::sanitize::truncate_for_log;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    temperature: Option<f32>,
    request_timeout: Duration,
}

impl OpenAiClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    /// Without an API key no `Authorization` header is sent, which suits
    /// local OpenAI-compatible servers.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            temperature: None,
            request_timeout,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn http_client(&self) -> Result<Client, AnalysisError> {
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AnalysisError::Request(format!("Failed to create HTTP client: {}", e)))
    }
}

impl ChatCompletion for OpenAiClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, AnalysisError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let mut request = self.http_client()?.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Request(format!(
                    "request timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            } else {
                AnalysisError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                body: truncate_for_log(&message),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AnalysisError::ResponseParse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AnalysisError::EmptyOutput)
    }
}
