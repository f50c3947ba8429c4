//! Sentiment classification boundary.
//!
//! The classifier is an external capability: the builder only sees the
//! `HeadlineClassifier` trait. `HttpClassifier` talks to a JSON service:
//!
//! ```text
//! POST {base_url}/classify   {"headlines": [{"title": ..., "url": ..., "publisher": ...}]}
//! 200                        {"results": [{"label": "positive", "score": 0.82}, ...]}
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

use rpack_core::domain::{Classification, Headline};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier timed out")]
    Timeout,

    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("classifier request failed: {0}")]
    Request(String),
}

impl ClassifierError {
    /// Timeouts and service-side failures are worth another attempt; a
    /// response we cannot use will not improve.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifierError::Timeout | ClassifierError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Timeout
        } else if e.is_connect() {
            ClassifierError::Unavailable(e.to_string())
        } else if e.is_decode() {
            ClassifierError::InvalidResponse(e.to_string())
        } else {
            ClassifierError::Request(e.to_string())
        }
    }
}

/// Labels a batch of headlines. Output is one `Classification` per input, in
/// input order; anything else is an error for the whole batch.
pub trait HeadlineClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, headlines: &[Headline]) -> Result<Vec<Classification>, ClassifierError>;
}

// ─── HTTP adapter ───────────────────────────────────────────────────

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    headlines: &'a [Headline],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    results: Vec<Classification>,
}

pub struct HttpClassifier {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Request(format!("client setup: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/classify", self.base_url)
    }
}

impl HeadlineClassifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    fn classify(&self, headlines: &[Headline]) -> Result<Vec<Classification>, ClassifierError> {
        if headlines.is_empty() {
            return Ok(Vec::new());
        }

        let resp = self
            .client
            .post(self.endpoint())
            .json(&ClassifyRequest { headlines })
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body: ClassifyResponse = resp.json()?;
        check_batch(headlines.len(), body.results)
    }
}

fn status_error(status: reqwest::StatusCode) -> ClassifierError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ClassifierError::Unavailable(format!("HTTP {status}"))
    } else {
        ClassifierError::InvalidResponse(format!("HTTP {status}"))
    }
}

/// A batch result must line up one-to-one with its input.
pub fn check_batch(
    expected: usize,
    results: Vec<Classification>,
) -> Result<Vec<Classification>, ClassifierError> {
    if results.len() != expected {
        return Err(ClassifierError::InvalidResponse(format!(
            "{} results for {} headlines",
            results.len(),
            expected
        )));
    }
    Ok(results)
}

// ─── Retry ──────────────────────────────────────────────────────────

/// Bounded retry with exponential backoff: attempt `n` (1-based retry)
/// waits `base_delay * 2^(n-1)` plus up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1));
        let jitter_ms = (exp.as_millis() as u64 / 10).max(1);
        exp + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }
}

/// Run `classifier` with retries, never sleeping past `deadline`.
pub fn classify_with_retry(
    classifier: &dyn HeadlineClassifier,
    headlines: &[Headline],
    policy: RetryPolicy,
    deadline: Instant,
) -> Result<Vec<Classification>, ClassifierError> {
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            if Instant::now() + delay >= deadline {
                break;
            }
            std::thread::sleep(delay);
        }

        match classifier.classify(headlines) {
            Ok(results) => return check_batch(headlines.len(), results),
            Err(e) if e.is_retryable() => {
                tracing::debug!(
                    classifier = classifier.name(),
                    attempt,
                    error = %e,
                    "classification attempt failed"
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(ClassifierError::Timeout))
}
