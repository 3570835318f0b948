//! Minimal chat-completion client for the assistant tab, plus the chat log it feeds.
//!
//! Calls are instrumented and log model names, latencies and token usage (not contents).
//! The API key is never logged.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::{AssistantConfig, ClientConfig};
use crate::error::ClientError;

pub const FALLBACK_REPLY: &str = "Sorry, something went wrong.";

#[derive(Clone)]
pub struct Assistant {
  client: reqwest::Client,
  cfg: AssistantConfig,
}

impl Assistant {
  pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
    let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
    Ok(Self { client, cfg: cfg.assistant.clone() })
  }

  pub fn enabled(&self) -> bool {
    self.cfg.api_key.is_some()
  }

  pub fn model(&self) -> &str {
    &self.cfg.model
  }

  /// Single-turn completion: the system prompt plus the user's text.
  #[instrument(level = "info", skip(self, text), fields(model = %self.cfg.model, text_len = text.len()))]
  pub async fn reply(&self, text: &str) -> Result<String, ClientError> {
    let api_key = self
      .cfg
      .api_key
      .as_deref()
      .ok_or_else(|| ClientError::Validation("assistant is not configured (OPENAI_API_KEY)".into()))?;

    let url = format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.cfg.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: self.cfg.system_prompt.clone() },
        ChatMessageReq { role: "user".into(), content: text.into() },
      ],
      temperature: self.cfg.temperature,
      max_tokens: Some(self.cfg.max_tokens),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "luungs-client/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ClientError::Rejected { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .ok_or_else(|| ClientError::Malformed("completion had no content".into()))?;
    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "Assistant replied");
    Ok(text)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
  User,
  Assistant,
  Error,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
  pub id: String,
  pub role: Role,
  pub text: String,
}

impl ChatMessage {
  fn new(role: Role, text: impl Into<String>) -> Self {
    Self { id: Uuid::new_v4().to_string(), role, text: text.into() }
  }
}

/// Conversation shown on the assistant tab.
#[derive(Default)]
pub struct ChatLog {
  messages: Vec<ChatMessage>,
}

impl ChatLog {
  pub fn messages(&self) -> &[ChatMessage] {
    &self.messages
  }

  /// Append the user's input and the assistant's answer (or an error line).
  /// Blank input is ignored and returns None.
  pub async fn send(&mut self, assistant: &Assistant, input: &str) -> Option<&ChatMessage> {
    if input.trim().is_empty() {
      return None;
    }
    self.messages.push(ChatMessage::new(Role::User, input));
    let reply = match assistant.reply(input).await {
      Ok(text) => ChatMessage::new(Role::Assistant, text),
      Err(e) => {
        error!(target: "luungs", error = %e, "Error fetching assistant response");
        ChatMessage::new(Role::Error, FALLBACK_REPLY)
      }
    };
    self.messages.push(reply);
    self.messages.last()
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use axum::http::{HeaderMap, StatusCode};
  use axum::routing::post;
  use axum::{Json, Router};
  use serde_json::{json, Value};

  async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
      return (StatusCode::UNAUTHORIZED, Json(json!({ "error": { "message": "bad key" } })));
    }
    let user = body["messages"][1]["content"].as_str().unwrap_or_default().to_string();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["max_tokens"], 256);
    (
      StatusCode::OK,
      Json(json!({
        "choices": [ { "message": { "role": "assistant", "content": format!("  echo: {user} ") } } ],
        "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 }
      })),
    )
  }

  async fn assistant_with_key(key: Option<&str>) -> Assistant {
    let app = Router::new().route("/v1/chat/completions", post(completions));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    let mut cfg = ClientConfig { timeout: Duration::from_secs(5), ..ClientConfig::default() };
    cfg.assistant.base_url = format!("http://{addr}/v1");
    cfg.assistant.api_key = key.map(str::to_string);
    Assistant::new(&cfg).unwrap()
  }

  #[tokio::test]
  async fn chat_log_appends_user_and_assistant_messages() {
    let assistant = assistant_with_key(Some("sk-test")).await;
    let mut log = ChatLog::default();

    assert!(log.send(&assistant, "   ").await.is_none());
    let reply = log.send(&assistant, "hello").await.unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.text, "echo: hello");

    let roles: Vec<Role> = log.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
  }

  #[tokio::test]
  async fn failures_become_an_error_message() {
    let assistant = assistant_with_key(Some("sk-wrong")).await;
    match assistant.reply("hi").await {
      Err(ClientError::Rejected { message, .. }) => assert_eq!(message, "bad key"),
      other => panic!("unexpected: {other:?}"),
    }

    let mut log = ChatLog::default();
    let reply = log.send(&assistant, "hi").await.unwrap();
    assert_eq!((reply.role, reply.text.as_str()), (Role::Error, FALLBACK_REPLY));
  }

  #[tokio::test]
  async fn disabled_assistant_never_calls_out() {
    let assistant = assistant_with_key(None).await;
    assert!(!assistant.enabled());
    assert!(matches!(assistant.reply("hi").await, Err(ClientError::Validation(_))));
  }
}
