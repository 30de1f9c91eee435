//! Minimal client for Gemini's `generateContent` endpoint.

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use thiserror::Error;

use crate::config::GeminiConfig;
use crate::prompt::format_prompt;

/// MIME type used when the filename gives no better hint.
pub const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

/// Marker that starts every error text rendered into the document.
pub const ERROR_MARKER: &str = "[錯誤]";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Why a generation attempt produced no text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {raw}")]
    Parse { raw: String },
}

impl GenerationError {
    /// Text shown to the user in place of the generated sections.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(detail) => format!("{} 連線至 Gemini 失敗：{}", ERROR_MARKER, detail),
            Self::Status { status, body } => {
                format!("{} Gemini 回應狀態碼 {}：{}", ERROR_MARKER, status, body)
            }
            Self::Parse { raw } => format!("{} Gemini 回傳內容解析失敗：\n{}", ERROR_MARKER, raw),
        }
    }
}

/// Collapses a generation result into the text that goes into the document.
pub fn render_generation(result: Result<String, GenerationError>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => err.user_message(),
    }
}

/// The single image sent along with the prompt.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    /// Content type sent by the browser, used when the filename says nothing.
    pub content_type: Option<String>,
}

impl ImageInput {
    pub fn mime_type(&self) -> String {
        self.filename
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|mime| mime.essence_str().to_string())
            .or_else(|| {
                self.content_type
                    .as_deref()
                    .map(str::trim)
                    .filter(|ct| ct.starts_with("image/"))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn build_request(image: Option<&ImageInput>, user_input: &str) -> GenerateRequest {
    let mut parts = Vec::with_capacity(2);

    if let Some(image) = image {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type(),
                data: general_purpose::STANDARD.encode(&image.bytes),
            },
        });
    }

    parts.push(Part::Text {
        text: format_prompt(user_input),
    });

    GenerateRequest {
        contents: vec![Content { parts }],
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let result: serde_json::Value = serde_json::from_str(body).map_err(|_| GenerationError::Parse {
        raw: body.to_string(),
    })?;

    result["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Parse {
            raw: result.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Asks Gemini for the seven reflective sections.
    ///
    /// Makes exactly one request. Every failure comes back as a
    /// [`GenerationError`]; nothing panics or escapes otherwise.
    pub async fn generate(
        &self,
        image: Option<&ImageInput>,
        user_input: &str,
    ) -> Result<String, GenerationError> {
        let payload = build_request(image, user_input);

        tracing::info!(
            model = %self.config.model,
            with_image = image.is_some(),
            "Sending request to Gemini"
        );

        let response = self
            .http
            .post(self.config.endpoint())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Gemini request failed");
                GenerationError::Transport(e.without_url().to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;

        if status != reqwest::StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Gemini returned non-200");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = extract_text(&body)?;
        tracing::debug!(chars = text.chars().count(), "Gemini response parsed");
        Ok(text)
    }
}
