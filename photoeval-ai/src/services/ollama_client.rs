//! Vision model client (Ollama-compatible)
//!
//! Sends one image plus a fixed evaluation prompt to the model endpoint and
//! turns the answer into an [`Evaluation`].
//!
//! # Response handling
//! The endpoint answers with line-delimited JSON fragments terminated by a
//! fragment carrying `"done": true` (a non-streamed answer is the same thing
//! with a single line). A reader task splits the body into lines and sends
//! them over a channel; the consumer concatenates fragment text until the
//! terminal fragment. Malformed lines are logged and skipped.
//!
//! # Failure policy
//! [`ImageEvaluator::evaluate_image`] never fails. Image errors, timeouts,
//! connection failures and non-success statuses all degrade to
//! `{score: 0, comment: "Error during evaluation: ..."}`.
//!
//! # API Reference
//! - `POST {base}/api/chat`: `{model, messages: [{role, content, images}], stream}`
//! - `POST {base}/api/generate`: `{model, prompt, images, stream}`

use futures::{Stream, StreamExt};
use photoeval_common::config::{ModelApi, OllamaConfig};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::Evaluation;
use crate::services::image_encoder::{encode_image_for_upload, ImageEncodeError};
use crate::services::response_parser::evaluation_from_text;
use crate::types::ImageEvaluator;

/// Evaluation prompt: four criteria, 0-10 score, two-field JSON answer
pub const EVALUATION_PROMPT: &str = r#"Evaluate this photo on the following criteria and give a score from 0 to 10 together with the reasoning behind it:
1. Composition
2. Use of light
3. Appeal of the subject
4. Overall impression

Answer only with JSON in exactly this format:
{
    "score": <number>,
    "comment": "<evaluation comment>"
}"#;

/// Lines buffered between the body reader and the accumulator
const FRAGMENT_CHANNEL_CAPACITY: usize = 64;

/// Timeout for the startup reachability check, independent of the evaluation timeout
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest fragment echoed into a warning
const LOG_FRAGMENT_MAX: usize = 200;

/// Model client errors
///
/// Internal to the client; converted into degraded evaluations at the
/// [`ImageEvaluator`] boundary.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Image could not be prepared
    #[error(transparent)]
    Image(#[from] ImageEncodeError),

    /// Request did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the model endpoint
    #[error("Model API error {0}: {1}")]
    Api(u16, String),

    /// Error reported inside the response stream
    #[error("Model error: {0}")]
    Model(String),

    /// HTTP client could not be built or reader task failed
    #[error("Client error: {0}")]
    Client(String),
}

/// One line of the model's response stream
#[derive(Debug, Deserialize)]
struct StreamFragment {
    /// Chat form text
    #[serde(default)]
    message: Option<FragmentMessage>,
    /// Generate form text
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FragmentMessage {
    #[serde(default)]
    content: String,
}

impl StreamFragment {
    fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .or(self.response.as_deref())
    }
}

/// Accumulated stream text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOutcome {
    /// Concatenated fragment text
    pub text: String,
    /// Terminal fragment was seen
    pub done: bool,
    /// Error message carried by a fragment, if any
    pub error: Option<String>,
}

/// Ollama-compatible vision model client
pub struct OllamaClient {
    http_client: Client,
    base_url: String,
    model: String,
    api: ModelApi,
    timeout: Duration,
    max_image_dim: u32,
}

impl OllamaClient {
    /// Create client from model endpoint settings
    pub fn new(config: &OllamaConfig) -> Result<Self, EvaluationError> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EvaluationError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api: config.api,
            timeout: config.timeout(),
            max_image_dim: config.max_image_dim,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        match self.api {
            ModelApi::Chat => format!("{}/api/chat", self.base_url),
            ModelApi::Generate => format!("{}/api/generate", self.base_url),
        }
    }

    fn request_body(&self, image_b64: String) -> Value {
        match self.api {
            ModelApi::Chat => json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": EVALUATION_PROMPT,
                    "images": [image_b64],
                }],
                "stream": true,
            }),
            ModelApi::Generate => json!({
                "model": self.model,
                "prompt": EVALUATION_PROMPT,
                "images": [image_b64],
                "stream": true,
            }),
        }
    }

    /// Evaluate one image, surfacing failures as errors
    pub async fn try_evaluate(&self, path: &Path) -> Result<Evaluation, EvaluationError> {
        let image_b64 = encode_image_for_upload(path, self.max_image_dim).await?;

        debug!(
            file = %path.display(),
            endpoint = %self.endpoint(),
            payload_bytes = image_b64.len(),
            "Sending image to model"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .json(&self.request_body(image_b64))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvaluationError::Api(status.as_u16(), body));
        }

        let text = self.read_response_text(response).await?;
        Ok(evaluation_from_text(&text))
    }

    /// Drain the response through the fragment channel
    async fn read_response_text(&self, response: reqwest::Response) -> Result<String, EvaluationError> {
        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let producer = tokio::spawn(produce_lines(response.bytes_stream(), tx));

        let outcome = accumulate_fragments(rx).await;

        if let Some(message) = outcome.error {
            producer.abort();
            return Err(EvaluationError::Model(message));
        }

        if outcome.done {
            // Anything after the terminal fragment is ignored
            producer.abort();
            return Ok(outcome.text);
        }

        match producer.await {
            Ok(Ok(())) => Ok(outcome.text),
            Ok(Err(e)) => Err(self.transport_error(e)),
            Err(e) => Err(EvaluationError::Client(format!("Stream reader failed: {}", e))),
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> EvaluationError {
        if error.is_timeout() {
            EvaluationError::Timeout(self.timeout)
        } else {
            EvaluationError::Network(error.to_string())
        }
    }

    /// Check that the model server answers `GET /api/tags`
    ///
    /// Called once at startup; a failure is only logged.
    pub async fn is_reachable(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.http_client.get(&url).timeout(REACHABILITY_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Model server reachability check failed");
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl ImageEvaluator for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn evaluate_image(&self, path: &Path) -> Evaluation {
        match self.try_evaluate(path).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Evaluation degraded");
                Evaluation::degraded(e)
            }
        }
    }
}

/// Split a byte stream into trimmed, non-empty lines and send them on `tx`
///
/// A trailing line without a newline is still delivered. Stops quietly when
/// the receiver is gone.
pub async fn produce_lines<S, B, E>(stream: S, tx: mpsc::Sender<String>) -> Result<(), E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(chunk?.as_ref());

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if !send_line(&tx, &line[..line.len() - 1]).await {
                return Ok(());
            }
        }
    }

    if !buffer.is_empty() {
        send_line(&tx, &buffer).await;
    }
    Ok(())
}

/// Returns false once the receiver has been dropped
async fn send_line(tx: &mpsc::Sender<String>, raw: &[u8]) -> bool {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    tx.send(line.to_string()).await.is_ok()
}

/// Concatenate fragment text until the terminal fragment or channel close
pub async fn accumulate_fragments(mut rx: mpsc::Receiver<String>) -> StreamOutcome {
    let mut outcome = StreamOutcome::default();

    while let Some(line) = rx.recv().await {
        let fragment: StreamFragment = match serde_json::from_str(&line) {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(
                    error = %e,
                    fragment = %truncate(&line, LOG_FRAGMENT_MAX),
                    "Skipping malformed stream fragment"
                );
                continue;
            }
        };

        if let Some(message) = fragment.error {
            outcome.error = Some(message);
            break;
        }
        if let Some(text) = fragment.text() {
            outcome.text.push_str(text);
        }
        if fragment.done {
            outcome.done = true;
            break;
        }
    }

    outcome
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn accumulate(lines: &[&str]) -> StreamOutcome {
        let (tx, rx) = mpsc::channel(16);
        for line in lines {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);
        accumulate_fragments(rx).await
    }

    #[tokio::test]
    async fn test_chat_fragments_concatenate_until_done() {
        let outcome = accumulate(&[
            r#"{"message":{"role":"assistant","content":"{\"score\": "},"done":false}"#,
            r#"{"message":{"role":"assistant","content":"8, \"comment\": \"nice\"}"},"done":false}"#,
            r#"{"message":{"role":"assistant","content":""},"done":true}"#,
            r#"{"message":{"role":"assistant","content":"ignored"},"done":false}"#,
        ])
        .await;

        assert!(outcome.done);
        assert_eq!(outcome.text, r#"{"score": 8, "comment": "nice"}"#);
    }

    #[tokio::test]
    async fn test_generate_fragments_use_response_field() {
        let outcome = accumulate(&[
            r#"{"response":"hello ","done":false}"#,
            r#"{"response":"world","done":true}"#,
        ])
        .await;

        assert_eq!(outcome.text, "hello world");
        assert!(outcome.done);
    }

    #[tokio::test]
    async fn test_malformed_fragment_is_skipped() {
        let outcome = accumulate(&[
            r#"{"response":"a","done":false}"#,
            r#"{"response": broken"#,
            r#"{"response":"b","done":true}"#,
        ])
        .await;

        assert_eq!(outcome.text, "ab");
        assert!(outcome.done);
    }

    #[tokio::test]
    async fn test_channel_close_without_done() {
        let outcome = accumulate(&[r#"{"response":"partial","done":false}"#]).await;
        assert_eq!(outcome.text, "partial");
        assert!(!outcome.done);
    }

    #[tokio::test]
    async fn test_error_fragment_stops_accumulation() {
        let outcome = accumulate(&[r#"{"error":"model 'x' not found"}"#]).await;
        assert_eq!(outcome.error.as_deref(), Some("model 'x' not found"));
    }

    #[tokio::test]
    async fn test_produce_lines_splits_across_chunks() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"{\"response\":\"a\"}\n{\"resp".to_vec()),
            Ok(b"onse\":\"b\"}\n\n".to_vec()),
            Ok(b"{\"response\":\"c\",\"done\":true}".to_vec()),
        ];
        let (tx, mut rx) = mpsc::channel(16);

        produce_lines(futures::stream::iter(chunks), tx).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                r#"{"response":"a"}"#,
                r#"{"response":"b"}"#,
                r#"{"response":"c","done":true}"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_produce_lines_propagates_stream_error() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"{\"response\":\"a\"}\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "stalled")),
        ];
        let (tx, _rx) = mpsc::channel(16);

        let result = produce_lines(futures::stream::iter(chunks), tx).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_request_body_shapes() {
        let mut config = OllamaConfig::default();
        config.base_url = "http://localhost:11434/".to_string();
        let chat = OllamaClient::new(&config).unwrap();
        assert_eq!(chat.endpoint(), "http://localhost:11434/api/chat");
        let body = chat.request_body("AAAA".to_string());
        assert_eq!(body["messages"][0]["images"][0], "AAAA");
        assert_eq!(body["messages"][0]["role"], "user");

        config.api = ModelApi::Generate;
        let generate = OllamaClient::new(&config).unwrap();
        assert_eq!(generate.endpoint(), "http://localhost:11434/api/generate");
        let body = generate.request_body("AAAA".to_string());
        assert_eq!(body["prompt"], EVALUATION_PROMPT);
        assert_eq!(body["images"][0], "AAAA");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
