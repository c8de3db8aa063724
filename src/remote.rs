//! Chat-completions transport for the remote classifier.

use crate::config::ClassifierConfig;
use crate::gateway::{ClassificationRequest, GatewayError, RemoteClassifier};
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;

/// Environment variable consulted when `classifier.api_key` is empty.
pub const API_KEY_ENV: &str = "PPLX_API_KEY";

// Keeps consecutive live calls under the provider's rate limit.
const PAUSE_AFTER_CALL: Duration = Duration::from_millis(200);

const SYSTEM_PROMPT: &str = "Return ONLY valid JSON. No markdown. No extra text.";

/// Calls a Perplexity-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PerplexityClient {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let api_key = Some(config.api_key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty());

        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    fn payload(&self, request: &ClassificationRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(request)},
            ],
            "temperature": 0.1,
        })
    }
}

impl RemoteClassifier for PerplexityClient {
    fn complete(&self, request: &ClassificationRequest) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::MissingCredentials)?;

        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let body = self.payload(request).to_string();

        let response = agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Content-Type", "application/json")
            .send_string(&body);

        let text = match response {
            Ok(response) => response
                .into_string()
                .map_err(|e| GatewayError::Transport(format!("response decode failed: {e}")))?,
            Err(ureq::Error::Status(status, response)) => {
                let detail = response.into_string().unwrap_or_default();
                let detail: String = detail.trim().chars().take(240).collect();
                return Err(GatewayError::Transport(if detail.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    format!("HTTP status {status} ({detail})")
                }));
            }
            Err(ureq::Error::Transport(e)) => {
                return Err(GatewayError::Transport(format!("transport error: {e}")));
            }
        };

        thread::sleep(PAUSE_AFTER_CALL);
        extract_message_content(&text)
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions envelope.
pub fn extract_message_content(envelope: &str) -> Result<String, GatewayError> {
    let value: Value = serde_json::from_str(envelope)
        .map_err(|e| GatewayError::MalformedResponse(format!("envelope is not JSON: {e}")))?;
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            GatewayError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

/// The user prompt: target layout, output contract and the file to classify.
pub fn build_prompt(request: &ClassificationRequest) -> String {
    format!(
        r#"Classify this anime media file for a media-server library.

Library layout:
- Episodes: Series/Season 01/Series - S01E01.ext
- OVAs: Series/OVA/Series - OVA01.ext
- Movies: Movies/Title (Year)/Title (Year).ext
- Extras (NCOP/NCED/OP/ED/PV/TRAILER): Series/extras/<bucket>/...

Rules:
- Reply with a single JSON object and nothing else.
- "series" is the canonical title only: no resolution, release group, codec, source or bracket tags.
- kind "episode" needs series, season (int) and episode (int).
- kind "ova" needs series and episode (int, the OVA number); season is null.
- kind "movie" needs title (string) and year (int); if the year is unknown use kind "unknown".
- kind "extra" needs extra_bucket, one of: trailers, other, extras.
- If unsure, use kind "unknown". Do not guess.

Keys: kind, series, season, episode, title, year, extra_bucket

folder="{}"
filename="{}"
full_path="{}""#,
        request.folder, request.filename, request.full_path
    )
}
