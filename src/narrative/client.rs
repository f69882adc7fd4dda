//! Narrative client: text-completion abstraction + OpenAI-compatible provider + mock.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::report::MAX_NARRATIVE_RETRIES;
use crate::config::NarrativeConfig;
use crate::error::ReportError;
use crate::narrative::{NarrativeRequest, NarrativeResponse};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

pub type NarrativeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<NarrativeResponse, ReportError>> + Send + 'a>>;

/// Trait object used by the pipeline (and tests).
pub trait NarrativeClient: Send + Sync {
    /// One completion for the rendered prompt.
    fn complete<'a>(&'a self, request: &'a NarrativeRequest) -> NarrativeFuture<'a>;
    /// Model identifier reported back to API consumers.
    fn model(&self) -> &str;
}

pub type DynNarrativeClient = Arc<dyn NarrativeClient>;

/// Factory: build a client according to config.
///
/// * `provider = "mock"` returns a deterministic mock with a canned report.
/// * `provider = "openai"` builds the chat-completions client.
pub fn build_narrative_client(cfg: &NarrativeConfig) -> anyhow::Result<DynNarrativeClient> {
    match cfg.provider.as_str() {
        "mock" => Ok(Arc::new(MockNarrativeClient::replying(CANNED_REPORT))),
        "openai" => Ok(Arc::new(OpenAiNarrativeClient::new(cfg)?)),
        other => anyhow::bail!("Unsupported narrative provider in config: {other}"),
    }
}

// ------------------------------------------------------------
// OpenAI-compatible provider
// ------------------------------------------------------------

/// Chat Completions client. Requires an API key (config or `OPENAI_API_KEY` via "ENV").
pub struct OpenAiNarrativeClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u8,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

/// One failed attempt; `retryable` marks transport errors, 429 and 5xx.
struct AttemptError {
    message: String,
    retryable: bool,
}

impl OpenAiNarrativeClient {
    pub fn new(cfg: &NarrativeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("market-report-engine/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            max_retries: cfg.max_retries.min(MAX_NARRATIVE_RETRIES),
        })
    }

    async fn attempt(&self, api_key: &str, prompt: &str) -> Result<String, AttemptError> {
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| AttemptError {
                message: format!("transport error: {e}"),
                retryable: true,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AttemptError {
                message: format!("HTTP {status}: {}", crate::error::excerpt(&body)),
                retryable: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let body: Resp = resp.json().await.map_err(|e| AttemptError {
            message: format!("invalid completion body: {e}"),
            retryable: false,
        })?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AttemptError {
                message: "completion has no content".to_string(),
                retryable: false,
            })
    }

    async fn complete_impl(&self, request: &NarrativeRequest) -> Result<NarrativeResponse, ReportError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ReportError::NarrativeService("missing API key (OPENAI_API_KEY)".to_string()))?;

        let max_attempts = u32::from(self.max_retries) + 1;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt(api_key, request.as_str()).await {
                Ok(content) => {
                    return Ok(NarrativeResponse {
                        content,
                        model: self.model.clone(),
                    })
                }
                Err(e) if e.retryable && attempt < max_attempts => {
                    tracing::warn!(attempt, error = %e.message, "narrative call failed; retrying");
                    tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                }
                Err(e) => return Err(ReportError::NarrativeService(e.message)),
            }
        }
    }
}

impl NarrativeClient for OpenAiNarrativeClient {
    fn complete<'a>(&'a self, request: &'a NarrativeRequest) -> NarrativeFuture<'a> {
        Box::pin(self.complete_impl(request))
    }
    fn model(&self) -> &str {
        &self.model
    }
}

// ------------------------------------------------------------
// Mock
// ------------------------------------------------------------

const CANNED_REPORT: &str = r#"{"marketMood":"neutral","moodScore":50,"summary":"Mock narrative: markets are mixed.","sectorOutlook":[],"riskFactors":[],"opportunities":[],"strategyNotes":[]}"#;

/// Deterministic client for tests/local runs. Records the last prompt it saw.
pub struct MockNarrativeClient {
    reply: Result<String, String>,
    last_prompt: Mutex<Option<String>>,
}

impl MockNarrativeClient {
    pub fn replying(content: &str) -> Self {
        Self {
            reply: Ok(content.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|g| g.clone())
    }
}

impl NarrativeClient for MockNarrativeClient {
    fn complete<'a>(&'a self, request: &'a NarrativeRequest) -> NarrativeFuture<'a> {
        if let Ok(mut g) = self.last_prompt.lock() {
            *g = Some(request.as_str().to_string());
        }
        let out = match &self.reply {
            Ok(content) => Ok(NarrativeResponse {
                content: content.clone(),
                model: "mock".to_string(),
            }),
            Err(msg) => Err(ReportError::NarrativeService(msg.clone())),
        };
        Box::pin(async move { out })
    }
    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_is_service_error() {
        let cfg = NarrativeConfig {
            api_key: None,
            ..NarrativeConfig::default()
        };
        let client = OpenAiNarrativeClient::new(&cfg).unwrap();
        let err = client
            .complete(&NarrativeRequest::new("hi".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NarrativeService(ref m) if m.contains("API key")));
    }

    #[tokio::test]
    async fn transport_error_is_service_error_without_retry_by_default() {
        let cfg = NarrativeConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout_secs: 2,
            ..NarrativeConfig::default()
        };
        let client = OpenAiNarrativeClient::new(&cfg).unwrap();
        let err = client
            .complete(&NarrativeRequest::new("hi".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NarrativeService(ref m) if m.contains("transport")));
    }

    #[tokio::test]
    async fn mock_records_prompt_and_factory_selects_mock() {
        let cfg = NarrativeConfig {
            provider: "mock".to_string(),
            ..NarrativeConfig::default()
        };
        let client = build_narrative_client(&cfg).unwrap();
        assert_eq!(client.model(), "mock");
        let out = client
            .complete(&NarrativeRequest::new("prompt".into()))
            .await
            .unwrap();
        assert!(out.content.contains("marketMood"));

        let failing = MockNarrativeClient::failing("boom");
        let err = failing
            .complete(&NarrativeRequest::new("p".into()))
            .await
            .unwrap_err();
        assert_eq!(err, ReportError::NarrativeService("boom".into()));
        assert_eq!(failing.last_prompt().as_deref(), Some("p"));
    }

    // ---- chat-completions contract against a local axum stub ----

    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    #[derive(Clone)]
    struct Stub {
        hits: Arc<AtomicUsize>,
        last_body: Arc<Mutex<Option<Value>>>,
        last_auth: Arc<Mutex<Option<String>>>,
        /// Served in order; the last entry repeats.
        replies: Arc<Vec<(StatusCode, Value)>>,
    }

    impl Stub {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    async fn chat(
        State(stub): State<Stub>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let n = stub.hits.fetch_add(1, Ordering::SeqCst);
        *stub.last_body.lock().unwrap() = Some(body);
        *stub.last_auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let (status, reply) = stub.replies[n.min(stub.replies.len() - 1)].clone();
        (status, Json(reply))
    }

    async fn spawn_stub(replies: Vec<(StatusCode, Value)>) -> (String, Stub) {
        let stub = Stub {
            hits: Arc::new(AtomicUsize::new(0)),
            last_body: Arc::new(Mutex::new(None)),
            last_auth: Arc::new(Mutex::new(None)),
            replies: Arc::new(replies),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(chat))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), stub)
    }

    fn client_for(base_url: &str, max_retries: u8) -> OpenAiNarrativeClient {
        let cfg = NarrativeConfig {
            base_url: base_url.to_string(),
            api_key: Some("sk-test".to_string()),
            timeout_secs: 5,
            max_retries,
            ..NarrativeConfig::default()
        };
        OpenAiNarrativeClient::new(&cfg).unwrap()
    }

    fn completion(content: &str) -> Value {
        json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})
    }

    #[tokio::test]
    async fn posts_chat_body_and_reads_first_choice() {
        let (base, stub) = spawn_stub(vec![(StatusCode::OK, completion(r#"{"a":1}"#))]).await;
        let client = client_for(&base, 0);

        let out = client
            .complete(&NarrativeRequest::new("render this".into()))
            .await
            .unwrap();
        assert_eq!(out.content, r#"{"a":1}"#);
        assert_eq!(out.model, "gpt-4o-mini");
        assert_eq!(stub.hits(), 1);

        let body = stub.last_body.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"], json!([{"role": "user", "content": "render this"}]));
        assert_eq!(body["max_tokens"], 2000);
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 1e-6);
        assert_eq!(
            stub.last_auth.lock().unwrap().as_deref(),
            Some("Bearer sk-test")
        );
    }

    #[tokio::test]
    async fn empty_or_missing_choices_is_service_error() {
        for reply in [json!({"choices": []}), json!({}), completion("   ")] {
            let (base, stub) = spawn_stub(vec![(StatusCode::OK, reply)]).await;
            let err = client_for(&base, 2)
                .complete(&NarrativeRequest::new("p".into()))
                .await
                .unwrap_err();
            assert!(matches!(err, ReportError::NarrativeService(ref m) if m.contains("no content")));
            assert_eq!(stub.hits(), 1, "content errors are not retried");
        }
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let (base, stub) =
            spawn_stub(vec![(StatusCode::BAD_REQUEST, json!({"error": "bad model"}))]).await;
        let err = client_for(&base, 3)
            .complete(&NarrativeRequest::new("p".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NarrativeService(ref m) if m.contains("HTTP 400")));
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn server_error_is_retried_when_enabled() {
        let (base, stub) = spawn_stub(vec![
            (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "overloaded"})),
            (StatusCode::OK, completion(r#"{"a":1}"#)),
        ])
        .await;
        let out = client_for(&base, 1)
            .complete(&NarrativeRequest::new("p".into()))
            .await
            .unwrap();
        assert_eq!(out.content, r#"{"a":1}"#);
        assert_eq!(stub.hits(), 2);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_when_enabled() {
        let (base, stub) = spawn_stub(vec![
            (StatusCode::TOO_MANY_REQUESTS, json!({"error": "slow down"})),
            (StatusCode::OK, completion("done")),
        ])
        .await;
        let out = client_for(&base, 1)
            .complete(&NarrativeRequest::new("p".into()))
            .await
            .unwrap();
        assert_eq!(out.content, "done");
        assert_eq!(stub.hits(), 2);
    }

    #[tokio::test]
    async fn server_error_is_single_attempt_by_default() {
        let (base, stub) =
            spawn_stub(vec![(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "down"}))]).await;
        let err = client_for(&base, NarrativeConfig::default().max_retries)
            .complete(&NarrativeRequest::new("p".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NarrativeService(ref m) if m.contains("HTTP 500")));
        assert_eq!(stub.hits(), 1);
    }

    #[test]
    fn retry_budget_is_clamped() {
        let client = client_for("http://127.0.0.1:9/v1", u8::MAX);
        assert_eq!(client.max_retries, MAX_NARRATIVE_RETRIES);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let cfg = NarrativeConfig {
            provider: "claude".to_string(),
            ..NarrativeConfig::default()
        };
        assert!(build_narrative_client(&cfg).is_err());
    }
}
