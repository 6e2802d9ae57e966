use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::attach::Attachment;
use crate::config::RelayConfig;

/// Sent in place of the prompt when the user attaches a file without typing
/// anything.
pub const PLACEHOLDER_PROMPT: &str = "Analyze the image.";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned HTTP {0}")]
    Status(StatusCode),
    #[error("malformed relay response: {0}")]
    Malformed(String),
    #[error("relay error: {0}")]
    Relay(String),
}

/// One outbound request: prompt text, serialized history, optional file.
/// Built fresh per send, never reused.
#[derive(Debug, Clone)]
pub struct RequestBundle {
    prompt: String,
    history_json: String,
    attachment: Option<Attachment>,
}

impl RequestBundle {
    /// Returns `None` when there is nothing to send: an empty prompt with no
    /// attachment never becomes a request. An attachment with no prompt gets
    /// the fixed placeholder.
    pub fn compose(
        prompt: &str,
        history_json: &str,
        attachment: Option<Attachment>,
    ) -> Option<RequestBundle> {
        let prompt = prompt.trim();
        if prompt.is_empty() && attachment.is_none() {
            return None;
        }
        let prompt = if prompt.is_empty() {
            PLACEHOLDER_PROMPT.to_string()
        } else {
            prompt.to_string()
        };
        Some(RequestBundle {
            prompt,
            history_json: history_json.to_string(),
            attachment,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Lifecycle of one request cycle. A cycle is created on submit and discarded
/// once it reaches Succeeded or Failed; there is no cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending { attempt: u32 },
    WaitingToRetry { next_attempt: u32 },
    Succeeded,
    Failed,
}

impl Phase {
    pub fn submit(self) -> Phase {
        match self {
            Phase::Idle => Phase::Sending { attempt: 1 },
            other => other,
        }
    }

    /// Applies the outcome of one transport attempt.
    pub fn attempt_finished(self, ok: bool, max_attempts: u32) -> Phase {
        match (self, ok) {
            (Phase::Sending { .. }, true) => Phase::Succeeded,
            (Phase::Sending { attempt }, false) if attempt < max_attempts => {
                Phase::WaitingToRetry { next_attempt: attempt + 1 }
            }
            (Phase::Sending { .. }, false) => Phase::Failed,
            (other, _) => other,
        }
    }

    pub fn delay_elapsed(self) -> Phase {
        match self {
            Phase::WaitingToRetry { next_attempt } => Phase::Sending { attempt: next_attempt },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

pub struct RelayClient {
    endpoint: String,
    max_attempts: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(config: &RelayConfig) -> Self {
        RelayClient {
            endpoint: config.endpoint.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            client: reqwest::Client::new(),
        }
    }

    /// Sends the bundle, retrying failed attempts after a fixed delay until
    /// the attempt cap is reached. `on_status` receives a human-readable line
    /// before each wait and on terminal failure; the wait itself is a tokio
    /// timer, nothing blocks.
    pub async fn ask<F>(&self, bundle: &RequestBundle, mut on_status: F) -> Result<String, RelayError>
    where
        F: FnMut(String),
    {
        let mut phase = Phase::Idle.submit();
        let mut attempt = 1;

        loop {
            debug_assert_eq!(phase, Phase::Sending { attempt });
            log::debug!("Sending attempt {}/{} to {}", attempt, self.max_attempts, self.endpoint);

            match self.send_once(bundle).await {
                Ok(text) => {
                    phase = phase.attempt_finished(true, self.max_attempts);
                    debug_assert!(phase.is_terminal());
                    return Ok(text);
                }
                Err(err) => {
                    log::warn!("Attempt {}/{} failed: {}", attempt, self.max_attempts, err);
                    phase = phase.attempt_finished(false, self.max_attempts);
                    if let Phase::WaitingToRetry { next_attempt } = phase {
                        on_status(format!(
                            "Attempt {} of {} failed ({}). Retrying in {}s...",
                            attempt,
                            self.max_attempts,
                            err,
                            self.retry_delay.as_secs_f32()
                        ));
                        tokio::time::sleep(self.retry_delay).await;
                        phase = phase.delay_elapsed();
                        attempt = next_attempt;
                    } else {
                        on_status(format!(
                            "Giving up after {} attempts ({}).",
                            self.max_attempts, err
                        ));
                        return Err(err);
                    }
                }
            }
        }
    }

    /// One transport attempt: multipart POST, then classify the reply. Any
    /// non-2xx status, undecodable body, missing `text` field, or relay-side
    /// `error` payload counts as a failure and takes the same retry path.
    async fn send_once(&self, bundle: &RequestBundle) -> Result<String, RelayError> {
        let mut form = reqwest::multipart::Form::new()
            .text("prompt", bundle.prompt.clone())
            .text("history", bundle.history_json.clone());
        if let Some(att) = &bundle.attachment {
            let part = reqwest::multipart::Part::bytes(att.bytes.clone())
                .file_name(att.file_name.clone());
            form = form.part("file", part);
        }

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RelayError::Malformed(e.to_string()))?;

        if let Some(message) = body.get("error").and_then(|v| v.as_str()) {
            return Err(RelayError::Relay(message.to_string()));
        }

        match body.get("text").and_then(|v| v.as_str()) {
            Some(text) => Ok(text.to_string()),
            None => Err(RelayError::Malformed("response has no `text` field".into())),
        }
    }
}
