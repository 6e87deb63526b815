//! Completion and transcription client
//!
//! One synchronous request per exchange: the full message log goes out, one
//! assistant reply comes back. No streaming, no retry; every failure is
//! classified and handed straight back to the caller.

use std::error::Error as StdError;
use std::fmt;

use reqwest::multipart;
use reqwest::StatusCode;

use crate::api::{ChatRequest, ChatResponse, ExtraHeaders};
use crate::core::constants::{TRANSCRIPTION_LANGUAGE, TRANSCRIPTION_MODEL};
use crate::core::message::{Message, MessageContent};
use crate::core::settings::Settings;
use crate::utils::url::construct_api_url;

#[derive(Debug)]
pub enum ApiError {
    /// The remote rejected the credential.
    Unauthorized,

    /// Any other non-success HTTP status; the response body is kept for
    /// display.
    Http { status: u16, body: String },

    /// Transport-level failure before a status was received.
    Network(reqwest::Error),

    /// The response parsed as something other than the expected shape
    /// (no completion choices, or not JSON at all).
    MalformedResponse,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => {
                write!(f, "authentication rejected by the API; check your credential")
            }
            ApiError::Http { status, body } => {
                write!(f, "API request failed with status {status}: {body}")
            }
            ApiError::Network(source) => write!(f, "network error: {source}"),
            ApiError::MalformedResponse => {
                write!(f, "malformed API response: no completion choices")
            }
        }
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ApiError::Network(source) => Some(source),
            _ => None,
        }
    }
}

/// Classify a non-success status. 401 and 403 both read as credential
/// problems; everything else keeps its status and body.
fn classify_status(status: StatusCode, body: String) -> ApiError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Unauthorized
    } else {
        ApiError::Http {
            status: status.as_u16(),
            body,
        }
    }
}

/// Pull the assistant reply out of a completion response body.
fn extract_reply(body: &str) -> Result<MessageContent, ApiError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|_| ApiError::MalformedResponse)?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(ApiError::MalformedResponse)
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the full message log and return the first choice's content.
    pub async fn complete(
        &self,
        messages: &[Message],
        settings: &Settings,
    ) -> Result<MessageContent, ApiError> {
        let url = construct_api_url(&self.base_url, "chat/completions");
        let request = ChatRequest {
            model: &settings.model,
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            extra_headers: ExtraHeaders::default(),
        };

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        extract_reply(&body)
    }

    /// Post recorded audio to the transcription endpoint and return the raw
    /// transcribed text.
    pub async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ApiError> {
        let url = construct_api_url(&self.base_url, "audio/transcriptions");
        let file = multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("audio/mp3")
            .map_err(ApiError::Network)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "text")
            .text("language", TRANSCRIPTION_LANGUAGE);

        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        Ok(body)
    }
}
