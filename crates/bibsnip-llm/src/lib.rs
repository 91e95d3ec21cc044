//! Provider gateway: a single opaque prompt in, sanitized reply text out.
//!
//! The gateway performs no retries and owns no policy beyond provider
//! dispatch; rate-limit conditions surface as [`LlmError::RateLimited`] so
//! callers can convert them to user-facing output.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod sanitize;

pub use sanitize::strip_code_fences;

/// Wall-clock limit for [`Session::validate_connection`] unless the caller
/// imposes its own.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error-body text is capped to this many characters before it is embedded
/// in an error for display.
pub const ERROR_BODY_CAP: usize = 600;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("no API key provided")]
    NotConfigured,
    #[error("prompt must not be empty")]
    EmptyPrompt,
    /// HTTP 429 or a quota/rate-limit message from the provider.
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} reply had no text content: {detail}")]
    MalformedReply {
        provider: &'static str,
        detail: String,
    },
}

impl LlmError {
    /// Whether this error represents a rate-limit/quota condition.
    ///
    /// Besides the typed variant, transport errors whose text carries the
    /// usual status indicators (429, "rate limit", "quota") also count, so
    /// callers matching on the rendered message agree with this predicate.
    pub fn is_rate_limited(&self) -> bool {
        if matches!(self, LlmError::RateLimited(_)) {
            return true;
        }
        let msg = self.to_string().to_lowercase();
        msg.contains("429") || msg.contains("rate limit") || msg.contains("quota")
    }
}

/// Map a non-success HTTP response to an error, special-casing rate limits
/// before generic status failures.
pub(crate) fn classify_api_error(provider: &'static str, status: u16, body: String) -> LlmError {
    let lower = body.to_lowercase();
    if status == 429 || lower.contains("rate limit") || lower.contains("quota") {
        LlmError::RateLimited(format!("{provider} HTTP {status}: {body}"))
    } else {
        LlmError::Api {
            provider,
            status,
            body,
        }
    }
}

/// Read a response body for error display, capped to [`ERROR_BODY_CAP`].
pub(crate) async fn read_capped_body(resp: reqwest::Response) -> String {
    let text = resp.text().await.unwrap_or_else(|e| format!("<unreadable body: {e}>"));
    if text.chars().count() > ERROR_BODY_CAP {
        let capped: String = text.chars().take(ERROR_BODY_CAP).collect();
        format!("{capped}...")
    } else {
        text
    }
}

/// The external model backend a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    /// Auto-detect the provider from the key shape: keys beginning `sk-`
    /// select the OpenAI-compatible provider, all others Gemini.
    pub fn detect(api_key: &str) -> Self {
        if api_key.starts_with("sk-") {
            Provider::OpenAi
        } else {
            Provider::Gemini
        }
    }

    /// Parse an explicit provider tag (`openai` | `gemini`).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "gemini" => Some(Provider::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }

    /// Models offered in the model-switch UI.
    pub fn available_models(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &["gpt-4o", "gpt-5.2", "gpt-4-turbo"],
            Provider::Gemini => &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single resolution request forwarded to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub prompt: String,
    pub json_mode: bool,
    pub temperature: f32,
}

/// A provider backend that can answer one prompt and probe the key.
pub trait ProviderBackend: Send + Sync {
    /// Display name of this provider (e.g., "OpenAI", "Gemini").
    fn name(&self) -> &'static str;

    /// Send one prompt and return the raw reply text.
    fn query<'a>(
        &'a self,
        client: &'a reqwest::Client,
        api_key: &'a str,
        model: &'a str,
        request: &'a QueryRequest,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

    /// Minimal, low-cost call confirming the key/provider combination is
    /// usable (lists available models).
    fn list_models<'a>(
        &'a self,
        client: &'a reqwest::Client,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LlmError>> + Send + 'a>>;
}

/// A live provider session: one API key, one provider, one model.
///
/// Exactly one session is active at a time in the application; replacing the
/// key replaces the session wholesale. Only the model name is mutable.
pub struct Session {
    provider: Provider,
    model: String,
    api_key: String,
    client: reqwest::Client,
    backend: Box<dyn ProviderBackend>,
    /// Per-request timeout. `None` imposes no limit: only key verification
    /// runs under a deadline.
    request_timeout: Option<Duration>,
}

impl Session {
    /// Create a session, auto-detecting the provider from the key shape.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        let provider = Provider::detect(&api_key);
        Self::with_provider(api_key, provider)
    }

    /// Create a session for an explicitly chosen provider.
    pub fn with_provider(api_key: impl Into<String>, provider: Provider) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured);
        }
        let backend: Box<dyn ProviderBackend> = match provider {
            Provider::OpenAi => Box::new(openai::OpenAiBackend),
            Provider::Gemini => Box::new(gemini::GeminiBackend),
        };
        Ok(Self {
            provider,
            model: provider.default_model().to_string(),
            api_key,
            client: reqwest::Client::builder().build()?,
            backend,
            request_timeout: None,
        })
    }

    /// Build a session over an arbitrary backend. Test seam.
    pub fn with_backend(
        backend: Box<dyn ProviderBackend>,
        provider: Provider,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            backend,
            request_timeout: None,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Switch the active model. The connection and key are untouched.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn set_request_timeout(&mut self, timeout: Option<Duration>) {
        self.request_timeout = timeout;
    }

    /// Send one prompt to the configured provider and return the sanitized
    /// reply text.
    ///
    /// `json_mode` requests structured output where the provider supports
    /// it; callers keep their own parse fallbacks either way. No retries:
    /// every failure surfaces once, to this call's caller.
    pub async fn query(
        &self,
        prompt: &str,
        json_mode: bool,
        temperature: f32,
    ) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::EmptyPrompt);
        }
        let request = QueryRequest {
            prompt: prompt.to_string(),
            json_mode,
            temperature,
        };
        let raw = self
            .backend
            .query(
                &self.client,
                &self.api_key,
                &self.model,
                &request,
                self.request_timeout,
            )
            .await?;
        Ok(strip_code_fences(&raw))
    }

    /// Probe the key with a list-models call under a hard wall-clock
    /// timeout. On expiry the in-flight request is abandoned and the
    /// verification counts as failed.
    pub async fn validate_connection(&self, timeout: Duration) -> (bool, String) {
        let probe = self.backend.list_models(&self.client, &self.api_key);
        match tokio::time::timeout(timeout, probe).await {
            Err(_) => {
                tracing::warn!(
                    provider = self.backend.name(),
                    timeout_secs = timeout.as_secs(),
                    "connection validation timed out, abandoning probe"
                );
                (
                    false,
                    format!("Timeout ({}s). Check network.", timeout.as_secs()),
                )
            }
            Ok(Err(e)) => (false, format!("Connection failed: {e}")),
            Ok(Ok(_)) => (true, format!("Success: {} API connected.", self.backend.name())),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"***")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
