//! Mock provider backend for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{LlmError, ProviderBackend, QueryRequest};

/// A configurable mock reply for [`MockProvider`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return this text verbatim.
    Text(String),
    /// Simulate a 429/quota failure.
    RateLimited,
    /// Simulate a generic provider failure.
    Error(String),
}

/// A hand-rolled mock implementing [`ProviderBackend`] for tests.
///
/// Supports:
/// - A fixed reply (used for every call), **or**
/// - A sequence of replies (one per call, repeating the last if exhausted).
/// - Optional per-call latency.
/// - Call counting and prompt capture for assertions.
pub struct MockProvider {
    /// If non-empty, each call pops the next reply (last is repeated).
    replies: Mutex<Vec<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<QueryRequest>>,
}

impl MockProvider {
    /// Create a mock that always returns `reply`.
    pub fn new(reply: MockReply) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback: reply,
            delay: None,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns replies in order, repeating the last one.
    pub fn with_sequence(mut replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "sequence must have at least one reply");
        // Reverse so we can pop() from the front cheaply.
        replies.reverse();
        let fallback = replies.first().cloned().unwrap();
        Self {
            replies: Mutex::new(replies),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set simulated network latency per call (queries and probes alike).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `query()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        let mut seq = self.replies.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

fn reply_to_result(reply: MockReply) -> Result<String, LlmError> {
    match reply {
        MockReply::Text(text) => Ok(text),
        MockReply::RateLimited => Err(LlmError::RateLimited(
            "Mock HTTP 429: quota exceeded".into(),
        )),
        MockReply::Error(msg) => Err(LlmError::Api {
            provider: "Mock",
            status: 500,
            body: msg,
        }),
    }
}

impl ProviderBackend for MockProvider {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn query<'a>(
        &'a self,
        _client: &'a reqwest::Client,
        _api_key: &'a str,
        _model: &'a str,
        request: &'a QueryRequest,
        _timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.next_reply();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            reply_to_result(reply)
        })
    }

    fn list_models<'a>(
        &'a self,
        _client: &'a reqwest::Client,
        _api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LlmError>> + Send + 'a>> {
        let reply = self.next_reply();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            reply_to_result(reply).map(|_| vec!["mock-model".to_string()])
        })
    }
}

/// Sessions take ownership of their backend; tests that need to inspect
/// call counts or captured prompts afterwards hand the session an
/// `Arc<MockProvider>` and keep a clone.
impl ProviderBackend for std::sync::Arc<MockProvider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn query<'a>(
        &'a self,
        client: &'a reqwest::Client,
        api_key: &'a str,
        model: &'a str,
        request: &'a QueryRequest,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        (**self).query(client, api_key, model, request, timeout)
    }

    fn list_models<'a>(
        &'a self,
        client: &'a reqwest::Client,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LlmError>> + Send + 'a>> {
        (**self).list_models(client, api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> QueryRequest {
        QueryRequest {
            prompt: prompt.into(),
            json_mode: false,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn sequence_pops_in_order_then_repeats_last() {
        let mock = MockProvider::with_sequence(vec![
            MockReply::Text("first".into()),
            MockReply::Text("second".into()),
        ]);
        let client = reqwest::Client::new();
        let req = request("p");

        for expected in ["first", "second", "second"] {
            let got = mock.query(&client, "k", "m", &req, None).await.unwrap();
            assert_eq!(got, expected);
        }
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn captures_requests_for_assertions() {
        let mock = MockProvider::new(MockReply::Text("ok".into()));
        let client = reqwest::Client::new();
        let _ = mock.query(&client, "k", "m", &request("hello"), None).await;
        let seen = mock.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "hello");
    }

    #[tokio::test]
    async fn rate_limited_reply_is_distinguishable() {
        let mock = MockProvider::new(MockReply::RateLimited);
        let client = reqwest::Client::new();
        let err = mock
            .query(&client, "k", "m", &request("p"), None)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }
}
