//! Completion bridge: wraps an OpenAI-compatible chat-completions endpoint.
//!
//! One provider call per persona per request; no retry, no backoff, no
//! circuit breaking. The result is a single internal type, `Generation`,
//! that is either a complete reply or a finite sequence of text fragments;
//! the HTTP layer chooses which representation to expose.

use crate::error::CoreError;
use crate::thread_store::Turn;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.2;

/// What one persona's call needs: instruction, prior turns, the new message.
pub struct CompletionRequest<'a> {
    pub instruction: &'a str,
    pub history: &'a [Turn],
    pub message: &'a str,
    pub stream: bool,
}

/// Either a complete reply or a finite fragment sequence. A fragment stream
/// is restartable from scratch, never resumable; the channel closing is the
/// end-of-stream signal.
pub enum Generation {
    Complete(String),
    Fragments(mpsc::Receiver<Result<String, CoreError>>),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate(&self, req: CompletionRequest<'_>) -> Result<Generation, CoreError>;
}

// OpenAI-compatible wire format
#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, PartialEq, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessageBody,
}

#[derive(Deserialize)]
struct WireMessageBody {
    content: String,
}

fn build_wire_messages(instruction: &str, history: &[Turn], message: &str) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(WireMessage {
        role: "system".to_string(),
        content: instruction.to_string(),
    });
    for turn in history {
        messages.push(WireMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        });
    }
    messages.push(WireMessage {
        role: "user".to_string(),
        content: message.to_string(),
    });
    messages
}

enum SseEvent {
    Delta(String),
    Done,
}

/// Parse one SSE line from the provider. Non-`data:` lines and deltas
/// without content yield `None`.
fn sse_event_from_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix("data: ")?.trim();
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let json: serde_json::Value = serde_json::from_str(payload).ok()?;
    let delta = json["choices"][0]["delta"]["content"].as_str()?;
    if delta.is_empty() {
        return None;
    }
    Some(SseEvent::Delta(delta.to_string()))
}

/// reqwest-based client for an OpenAI-compatible completion provider.
pub struct OpenAiBridge {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiBridge {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        }
    }

    async fn send(&self, req: &CompletionRequest<'_>, stream: bool) -> Result<reqwest::Response, CoreError> {
        let body = WireRequest {
            model: self.model.clone(),
            messages: build_wire_messages(req.instruction, req.history, req.message),
            temperature: TEMPERATURE,
            stream,
        };
        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Provider { status, body });
        }
        Ok(res)
    }
}

#[async_trait]
impl CompletionClient for OpenAiBridge {
    async fn generate(&self, req: CompletionRequest<'_>) -> Result<Generation, CoreError> {
        if !req.stream {
            let parsed: WireResponse = self.send(&req, false).await?.json().await?;
            let text = parsed
                .choices
                .first()
                .map(|c| c.message.content.trim().to_string())
                .unwrap_or_default();
            return Ok(Generation::Complete(text));
        }

        let res = self.send(&req, true).await?;
        let (tx, rx) = mpsc::channel::<Result<String, CoreError>>(32);
        tokio::spawn(async move {
            let mut stream = res.bytes_stream();
            // Lines can split across chunk boundaries; carry the remainder over.
            let mut buffer = String::new();
            'outer: while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(CoreError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim_end_matches('\r').to_string();
                    buffer.drain(..=pos);
                    match sse_event_from_line(&line) {
                        Some(SseEvent::Done) => break 'outer,
                        Some(SseEvent::Delta(delta)) => {
                            if tx.send(Ok(delta)).await.is_err() {
                                return; // receiver dropped: client aborted
                            }
                        }
                        None => {}
                    }
                }
            }
        });
        Ok(Generation::Fragments(rx))
    }
}
