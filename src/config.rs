//! Configuration types for cover generation and the HTTP service.
//!
//! Caption behaviour is controlled through [`CaptionConfig`], built via its
//! [`CaptionConfigBuilder`]. The API key is an ordinary field: the library
//! never reads the process environment itself, only the binary does, so two
//! generators with different credentials can live side by side (and tests can
//! run without touching global state).
//!
//! [`ServerConfig`] holds the listener settings for [`crate::server`].

use crate::error::CoverError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OpenAI-compatible chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default HTTP port when `PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 8080;

/// Default upload limit for the HTTP service (50 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50_000_000;

/// Configuration for alt-text generation.
///
/// # Example
/// ```rust
/// use edgequake_pdfcover::CaptionConfig;
///
/// let config = CaptionConfig::builder()
///     .api_key("sk-test")
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert!(config.has_credential());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Bearer token for the inference endpoint. `None` (or blank) disables
    /// the model entirely and every caption is the fixed fallback.
    pub api_key: Option<String>,

    /// Model identifier sent in the request body. Default: `gpt-4o`.
    pub model: String,

    /// Full URL of the chat-completions endpoint.
    ///
    /// Any OpenAI-compatible server works (vLLM, Ollama, LiteLLM, …).
    pub endpoint: String,

    /// Maximum tokens the model may generate. Default: 300.
    ///
    /// The prompt asks for under ~150 characters; 300 tokens leaves room for
    /// models that ignore the limit without letting them run away.
    pub max_tokens: u32,

    /// Image detail hint. Default: `"low"`.
    ///
    /// A single 512 px overview tile is plenty to describe a cover, and costs
    /// a fixed 85 input tokens with OpenAI models.
    pub detail: String,

    /// Per-call timeout in seconds. Default: `None` (no timeout).
    pub api_timeout_secs: Option<u64>,

    /// Pre-constructed vision provider. Takes precedence over the built-in
    /// client, and `api_key`/`endpoint` are then ignored: the provider
    /// carries its own credentials.
    #[serde(skip)]
    pub provider: Option<Arc<dyn LLMProvider>>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_tokens: 300,
            detail: "low".to_string(),
            api_timeout_secs: None,
            provider: None,
        }
    }
}

impl fmt::Debug for CaptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .field("detail", &self.detail)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .finish()
    }
}

impl CaptionConfig {
    /// Create a new builder for `CaptionConfig`.
    pub fn builder() -> CaptionConfigBuilder {
        CaptionConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` when a non-blank API key is configured.
    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// `true` when captions can be requested at all: either a provider is
    /// set or the built-in client has a key.
    pub fn can_caption(&self) -> bool {
        self.provider.is_some() || self.has_credential()
    }

    /// The API key, if present and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Builder for [`CaptionConfig`].
#[derive(Debug)]
pub struct CaptionConfigBuilder {
    config: CaptionConfig,
}

impl CaptionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the key from an optional value (e.g. an env var lookup).
    pub fn maybe_api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.config.detail = detail.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptionConfig, CoverError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(CoverError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(CoverError::InvalidConfig(format!(
                "endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        if !matches!(c.detail.as_str(), "low" | "high" | "auto") {
            return Err(CoverError::InvalidConfig(format!(
                "detail must be low, high or auto, got '{}'",
                c.detail
            )));
        }
        Ok(self.config)
    }
}

/// Listener settings for the HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: String,
    /// Bind port. Default: 8080.
    pub port: u16,
    /// Maximum accepted request body in bytes. Default: 50 MB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a `PORT`-style value, falling back to [`DEFAULT_PORT`].
///
/// Returns the port and whether the fallback was taken because the value was
/// present but unparsable (the caller decides how loudly to complain).
pub fn parse_port(raw: Option<&str>) -> (u16, bool) {
    match raw {
        None => (DEFAULT_PORT, false),
        Some(s) => match s.trim().parse::<u16>() {
            Ok(p) => (p, false),
            Err(_) => (DEFAULT_PORT, true),
        },
    }
}
