use std::time::Duration;

use async_trait::async_trait;

use crate::asset::UploadedAsset;
use crate::config::{GeminiConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::request::{self, AnalysisRequest};
use crate::response::{self, AnalysisOutcome};
use crate::validate;

const TOO_MANY_REQUESTS: u16 = 429;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_rate_limited(&self) -> bool {
        self.status == TOO_MANY_REQUESTS
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One network exchange. `Err(Error::Delivery)` means no response arrived at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &AnalysisRequest) -> Result<RawResponse>;
}

pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn with_config(config: &GeminiConfig) -> Self {
        HttpTransport {
            url: config.generate_url(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &AnalysisRequest) -> Result<RawResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Delivery(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = read_body(status, response.text().await.map_err(|e| e.without_url()))?;

        Ok(RawResponse { status, body })
    }
}

/// A body that cannot be read after a 2xx is a response-processing failure.
/// Other statuses are judged on the status alone, so their body may be lost.
fn read_body<E: std::fmt::Display>(status: u16, body: std::result::Result<String, E>) -> Result<String> {
    match body {
        Ok(body) => Ok(body),
        Err(e) if (200..300).contains(&status) => Err(Error::MalformedResponse(format!(
            "Error processing response: {}",
            e
        ))),
        Err(e) => {
            tracing::debug!(status, error = %e, "discarding unreadable error body");
            Ok(String::new())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Wait after a rate-limited attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Send `request`, backing off on 429.
///
/// When every attempt is rate limited the last 429 response is returned
/// as-is rather than turned into an error.
pub async fn deliver<T: Transport + ?Sized>(
    transport: &T,
    policy: RetryPolicy,
    request: &AnalysisRequest,
) -> Result<RawResponse> {
    let mut attempt = 0;
    loop {
        tracing::debug!(attempt, "sending analysis request");
        let response = transport.send(request).await.map_err(|e| {
            tracing::warn!(attempt, error = %e, "request failed without a response");
            e
        })?;

        if response.is_rate_limited() {
            let delay = policy.backoff(attempt);
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
            if attempt >= policy.max_attempts {
                tracing::warn!(attempts = attempt, "retry ceiling reached while rate limited");
                return Ok(response);
            }
            continue;
        }

        if !response.is_success() {
            tracing::warn!(status = response.status, "request rejected");
            return Err(Error::Delivery(format!("HTTP error! status: {}", response.status)));
        }

        return Ok(response);
    }
}

/// Submission pipeline: validate, build, deliver, interpret.
pub struct FactChecker<T = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl FactChecker<HttpTransport> {
    pub fn with_config(gemini: &GeminiConfig, retry: &RetryConfig) -> Self {
        FactChecker::new(HttpTransport::with_config(gemini), RetryPolicy::from(retry))
    }
}

impl<T: Transport> FactChecker<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        FactChecker { transport, policy }
    }

    pub async fn check(&self, claim: &str, asset: &UploadedAsset) -> Result<AnalysisOutcome> {
        validate::validate(claim, asset)?;

        let request = request::build(claim, asset);
        tracing::debug!(
            parts = request.parts().len(),
            with_image = asset.is_present(),
            retrieval = request.retrieval_enabled(),
            "built analysis request"
        );

        let raw = deliver(&self.transport, self.policy, &request).await?;
        let outcome = response::interpret(&raw.body)?;
        tracing::debug!(sources = outcome.sources.len(), "interpreted response");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted responses and records when each call happened.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<RawResponse>>) -> Self {
            ScriptedTransport {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &AnalysisRequest) -> Result<RawResponse> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more often than scripted")
        }
    }

    fn status(code: u16, body: &str) -> Result<RawResponse> {
        Ok(RawResponse {
            status: code,
            body: body.to_string(),
        })
    }

    fn ok_body() -> String {
        serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "VERIFIED" }] },
                "groundingMetadata": {
                    "groundingAttributions": [{ "web": { "uri": "https://a", "title": "A" } }]
                }
            }]
        })
        .to_string()
    }

    fn text_request() -> AnalysisRequest {
        request::build("The earth orbits the sun", &UploadedAsset::absent())
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|n| policy.backoff(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_rate_limits_stop_after_fifth_attempt() {
        let transport = ScriptedTransport::new(vec![
            status(429, "r0"),
            status(429, "r1"),
            status(429, "r2"),
            status(429, "r3"),
            status(429, "r4"),
        ]);

        let start = Instant::now();
        let response = deliver(&transport, RetryPolicy::default(), &text_request())
            .await
            .unwrap();

        assert_eq!(transport.call_count(), 5);
        assert_eq!(
            transport.gaps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        // The final 16s wait still runs before the loop gives up.
        assert_eq!(start.elapsed(), Duration::from_secs(31));
        assert_eq!(response, RawResponse { status: 429, body: "r4".to_string() });
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let transport = ScriptedTransport::new(vec![
            status(429, ""),
            status(429, ""),
            status(200, "done"),
        ]);

        let response = deliver(&transport, RetryPolicy::default(), &text_request())
            .await
            .unwrap();
        assert_eq!(response.body, "done");
        assert_eq!(
            transport.gaps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![status(500, "boom"), status(200, "unused")]);

        let start = Instant::now();
        let err = deliver(&transport, RetryPolicy::default(), &text_request())
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        match err {
            Error::Delivery(msg) => assert_eq!(msg, "HTTP error! status: 500"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_after_rate_limit_aborts() {
        let transport = ScriptedTransport::new(vec![
            status(429, ""),
            Err(Error::Delivery("connection refused".to_string())),
        ]);

        let err = deliver(&transport, RetryPolicy::default(), &text_request())
            .await
            .unwrap_err();
        assert_eq!(transport.call_count(), 2);
        assert!(matches!(err, Error::Delivery(msg) if msg == "connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_end_to_end() {
        let transport = ScriptedTransport::new(vec![status(429, ""), status(200, &ok_body())]);
        let checker = FactChecker::new(transport, RetryPolicy::default());

        let outcome = checker
            .check("The earth orbits the sun", &UploadedAsset::absent())
            .await
            .unwrap();
        assert_eq!(outcome.verdict_text, "VERIFIED");
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].label(), "A (https://a)");
    }

    #[tokio::test]
    async fn test_check_rejects_before_sending() {
        let checker = FactChecker::new(ScriptedTransport::new(vec![]), RetryPolicy::default());

        let err = checker.check("too short", &UploadedAsset::absent()).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailed));
        assert_eq!(checker.transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_rate_limit_surfaces_as_malformed() {
        let limited = r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        let transport = ScriptedTransport::new((0..5).map(|_| status(429, limited)).collect());
        let checker = FactChecker::new(transport, RetryPolicy::default());

        let err = checker
            .check("The earth orbits the sun", &UploadedAsset::absent())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert_eq!(checker.transport.call_count(), 5);
    }

    #[test]
    fn test_unreadable_success_body_is_malformed() {
        let err = read_body(200, Err::<String, _>("connection reset")).unwrap_err();
        match err {
            Error::MalformedResponse(msg) => {
                assert_eq!(msg, "Error processing response: connection reset")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_error_body_keeps_status() {
        assert_eq!(read_body(429, Err::<String, _>("reset")).unwrap(), "");
        assert_eq!(read_body(500, Err::<String, _>("reset")).unwrap(), "");
        assert_eq!(read_body(200, Ok::<_, String>("{}".to_string())).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_unreadable_500_body_is_still_a_delivery_error() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse {
            status: 500,
            body: read_body(500, Err::<String, _>("reset")).unwrap(),
        })]);
        let err = deliver(&transport, RetryPolicy::default(), &text_request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delivery(msg) if msg == "HTTP error! status: 500"));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            max_attempts: 0,
            base_delay_ms: 250,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
    }
}
