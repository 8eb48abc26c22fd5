//! Alt-text generation: describe the cover image with a vision model.
//!
//! The contract is simple: [`CaptionGenerator::generate`] always returns a
//! [`Caption`]. A missing API key, an undecodable image, a network error, a
//! non-2xx status or an unexpected response body all degrade to
//! [`FALLBACK_CAPTION`]; the reason is logged at `warn` and never propagated,
//! so the cover is produced even when the model is down.
//!
//! ## Backends
//!
//! A pre-built `edgequake-llm` provider in [`CaptionConfig::provider`] wins.
//! Without one, a built-in client posts to the configured OpenAI-compatible
//! endpoint with the explicit API key, which lets the endpoint be any URL
//! (including a local stub) and keeps the key out of the environment.
//!
//! ## Request shape
//!
//! One user message with two content parts, OpenAI chat-completions style:
//!
//! ```text
//! {model, max_tokens, messages: [{role: "user", content: [
//!     {type: "text", text: <prompt>},
//!     {type: "image_url", image_url: {url: "data:image/png;base64,…", detail: "low"}}
//! ]}]}
//! ```

use super::encode;
use super::locate::ExtractedImage;
use crate::config::CaptionConfig;
use crate::error::{CaptionError, CoverError};
use crate::prompts::{alt_text_prompt, FALLBACK_CAPTION};
use edgequake_llm::{ChatMessage as LlmMessage, CompletionOptions, ImageData, LLMProvider};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a caption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionSource {
    /// Text returned by the vision model.
    Model,
    /// The fixed fallback string.
    Fallback,
}

/// Alternate description for the cover image. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub text: String,
    pub source: CaptionSource,
}

impl Caption {
    /// The fixed fallback caption.
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_CAPTION.to_string(),
            source: CaptionSource::Fallback,
        }
    }

    fn from_model(text: String) -> Self {
        Self {
            text,
            source: CaptionSource::Model,
        }
    }
}

/// Generates captions for extracted cover images.
///
/// Cheap to share: hold one per process (e.g. inside the server state) and
/// call [`generate`](Self::generate) concurrently; `reqwest::Client` pools
/// connections internally.
#[derive(Debug, Clone)]
pub struct CaptionGenerator {
    config: CaptionConfig,
    /// Built-in OpenAI client. `None` without a credential, or when a
    /// provider is configured.
    client: Option<reqwest::Client>,
}

impl CaptionGenerator {
    /// Create a generator. The HTTP client is only built when an API key is
    /// set and no provider is configured.
    pub fn new(config: CaptionConfig) -> Result<Self, CoverError> {
        let client = if config.provider.is_none() && config.has_credential() {
            Some(
                reqwest::Client::builder()
                    .build()
                    .map_err(|e| CoverError::Internal(format!("HTTP client: {e}")))?,
            )
        } else {
            None
        };
        Ok(Self { config, client })
    }

    /// A generator that always returns the fallback caption.
    pub fn disabled() -> Self {
        Self {
            config: CaptionConfig::default(),
            client: None,
        }
    }

    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    /// `true` when captions will be requested from a model.
    pub fn is_enabled(&self) -> bool {
        self.config.provider.is_some() || self.client.is_some()
    }

    /// Describe `image`, falling back to the fixed caption on any failure.
    pub async fn generate(&self, image: &ExtractedImage, title: &str) -> Caption {
        match self.try_generate(image, title).await {
            Ok(text) => Caption::from_model(text),
            Err(CaptionError::MissingCredential) => {
                debug!("No API key configured, using fallback alt text");
                Caption::fallback()
            }
            Err(e) => {
                warn!("Failed to generate alt text, using fallback: {}", e);
                Caption::fallback()
            }
        }
    }

    async fn try_generate(&self, image: &ExtractedImage, title: &str) -> Result<String, CaptionError> {
        if !self.is_enabled() {
            return Err(CaptionError::MissingCredential);
        }

        // PNG encoding is CPU-bound; keep it off the async workers.
        let owned = image.clone();
        let png_b64 = tokio::task::spawn_blocking(move || encode::to_png_base64(&owned))
            .await
            .map_err(|e| CaptionError::Encode(format!("encode task panicked: {e}")))?
            .map_err(|e| CaptionError::Encode(e.to_string()))?;

        let start = Instant::now();
        let call = async {
            match &self.config.provider {
                Some(provider) => self.ask_provider(provider.as_ref(), png_b64, title).await,
                None => self.ask_openai(&png_b64, title).await,
            }
        };
        let text = match self.config.api_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
                .await
                .map_err(|_| CaptionError::Timeout(secs))??,
            None => call.await?,
        };

        info!(
            "Generated alt text ({} chars) in {}ms",
            text.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }

    /// Built-in path: one chat-completions POST with a bearer key.
    async fn ask_openai(&self, png_b64: &str, title: &str) -> Result<String, CaptionError> {
        let (client, key) = match (&self.client, self.config.credential()) {
            (Some(client), Some(key)) => (client, key),
            _ => return Err(CaptionError::MissingCredential),
        };

        let data_url = encode::png_data_url(png_b64);
        let request = self.build_request(&data_url, title);

        let response = client
            .post(&self.config.endpoint)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&body)
    }

    /// Provider path: the same prompt and image through `edgequake-llm`.
    async fn ask_provider(
        &self,
        provider: &dyn LLMProvider,
        png_b64: String,
        title: &str,
    ) -> Result<String, CaptionError> {
        let (messages, options) = self.provider_request(png_b64, title);
        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CaptionError::Provider(e.to_string()))?;
        non_empty_content(response.content)
    }

    /// Build the chat-completions request body.
    pub fn build_request<'a>(&'a self, data_url: &'a str, title: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: alt_text_prompt(title),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url,
                            detail: &self.config.detail,
                        },
                    },
                ],
            }],
        }
    }

    /// Build the `edgequake-llm` messages and options for a provider call.
    pub fn provider_request(
        &self,
        png_b64: String,
        title: &str,
    ) -> (Vec<LlmMessage>, CompletionOptions) {
        let image = ImageData::new(png_b64, "image/png").with_detail(self.config.detail.as_str());
        let prompt = alt_text_prompt(title);
        let messages = vec![LlmMessage::user_with_images(&prompt, vec![image])];
        let options = CompletionOptions {
            max_tokens: Some(self.config.max_tokens as usize),
            ..Default::default()
        };
        (messages, options)
    }
}

/// Extract the trimmed text of the first choice.
///
/// Missing choices, a missing message or blank content are all malformed:
/// an empty caption must never reach the document.
pub fn parse_response(body: &str) -> Result<String, CaptionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| CaptionError::MalformedResponse(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CaptionError::MalformedResponse("no choices".into()))?
        .message
        .ok_or_else(|| CaptionError::MalformedResponse("choice has no message".into()))?
        .content
        .ok_or_else(|| CaptionError::MalformedResponse("message has no content".into()))?;

    non_empty_content(content)
}

/// Trim model output; blank text is malformed.
fn non_empty_content(content: String) -> Result<String, CaptionError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CaptionError::MalformedResponse("empty content".into()));
    }
    Ok(trimmed.to_string())
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Chat-completions request body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl<'a> {
    pub url: &'a str,
    pub detail: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
