//! HTTP client for the Luungs backend.
//!
//! Every call is instrumented; bodies are never logged (they carry passwords
//! and personal data), only ids, sizes and statuses.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::domain::{Assignment, AssignmentSummary, ProfileForm, UserProfile};
use crate::error::ClientError;
use crate::protocol::{
  AssignmentWire, LoginIn, LoginOut, MessageOut, RegisterIn, SubmissionIn, Verdict,
};
use crate::tracker::AnswerSubmitter;

const UA: &str = "luungs-client/0.1";

#[derive(Clone)]
pub struct LuungsApi {
  client: reqwest::Client,
  base_url: String,
  submit_path: String,
}

impl LuungsApi {
  pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
    let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
    Ok(Self {
      client,
      base_url: cfg.api_url.trim_end_matches('/').to_string(),
      submit_path: cfg.submit_path.trim_matches('/').to_string(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path)
  }

  async fn send(&self, req: RequestBuilder) -> Result<Response, ClientError> {
    let res = req
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .send()
      .await?;
    Ok(res)
  }

  /// Check the status, then decode the body as `T`.
  async fn read_json<T: DeserializeOwned>(res: Response, fallback: &str) -> Result<T, ClientError> {
    let res = Self::ensure_success(res, fallback).await?;
    let body = res.text().await?;
    debug!(target: "luungs", body_len = body.len(), "Response body received");
    serde_json::from_str::<T>(&body).map_err(|e| ClientError::Malformed(e.to_string()))
  }

  async fn ensure_success(res: Response, fallback: &str) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
      return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageOut>(&body)
      .map(|m| m.message)
      .unwrap_or_else(|_| fallback.to_string());
    warn!(target: "luungs", %status, %message, "Backend rejected request");
    Err(ClientError::Rejected { status, message })
  }

  /// Authenticate and return the backend's user id.
  #[instrument(level = "info", skip(self, password), fields(%email))]
  pub async fn login(&self, email: &str, password: &str) -> Result<u64, ClientError> {
    let req = self.client.post(self.url("login")).json(&LoginIn { email, password });
    let out: LoginOut = Self::read_json(self.send(req).await?, "Invalid credentials").await?;
    let id = out
      .resolved_id()
      .ok_or_else(|| ClientError::Malformed("login response carried no user id".into()))?;
    info!(target: "luungs", user_id = id, "Login successful");
    Ok(id)
  }

  #[instrument(level = "info", skip(self, password), fields(%email, %name))]
  pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ClientError> {
    let req = self
      .client
      .post(self.url("register"))
      .json(&RegisterIn { email, password, name });
    Self::ensure_success(self.send(req).await?, "An error occurred").await?;
    info!(target: "luungs", "Registration accepted");
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  pub async fn list_assignments(&self) -> Result<Vec<AssignmentSummary>, ClientError> {
    let req = self.client.get(self.url("asignments/"));
    let items: Vec<AssignmentSummary> =
      Self::read_json(self.send(req).await?, "Failed to fetch assignments").await?;
    info!(target: "luungs", count = items.len(), "Assignments fetched");
    Ok(items)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn get_assignment(&self, id: u64) -> Result<Assignment, ClientError> {
    let req = self.client.get(self.url(&format!("asignments/{id}")));
    let wire: AssignmentWire =
      Self::read_json(self.send(req).await?, "Assignment not found").await?;
    let assignment = Assignment::try_from(wire)?;
    info!(
      target: "luungs",
      id,
      questions = assignment.questions.len(),
      prior_answers = assignment.prior_answers.len(),
      "Assignment fetched"
    );
    Ok(assignment)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn list_users(&self) -> Result<Vec<UserProfile>, ClientError> {
    let req = self.client.get(self.url("users"));
    Self::read_json(self.send(req).await?, "Failed to fetch students").await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn get_user(&self, id: u64) -> Result<UserProfile, ClientError> {
    let req = self.client.get(self.url(&format!("users/{id}")));
    Self::read_json(self.send(req).await?, "Failed to fetch user data").await
  }

  #[instrument(level = "info", skip(self, form))]
  pub async fn update_user(&self, id: u64, form: &ProfileForm) -> Result<(), ClientError> {
    let req = self.client.put(self.url(&format!("users/{id}"))).json(form);
    Self::ensure_success(self.send(req).await?, "Failed to update user").await?;
    info!(target: "luungs", id, "Profile updated");
    Ok(())
  }
}

#[async_trait]
impl AnswerSubmitter for LuungsApi {
  #[instrument(
    level = "info",
    skip(self, submission),
    fields(test_id = ?submission.test_id, task_id = ?submission.task_id, answer_len = submission.answer.len())
  )]
  async fn submit(&self, submission: &SubmissionIn) -> Result<Verdict, ClientError> {
    let req = self.client.post(self.url(&self.submit_path)).json(submission);
    let start = std::time::Instant::now();
    let verdict: Verdict = Self::read_json(self.send(req).await?, "Failed to submit answer").await?;
    info!(target: "answers", elapsed = ?start.elapsed(), is_correct = verdict.is_correct, "Submission graded");
    Ok(verdict)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  use axum::extract::{Path, State};
  use axum::http::StatusCode;
  use axum::routing::{get, post};
  use axum::{Json, Router};
  use serde_json::{json, Value};

  type Seen = Arc<Mutex<Vec<Value>>>;

  async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "secret" {
      (StatusCode::OK, Json(json!({ "user": { "id": 7 }, "token": "t" })))
    } else {
      (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Wrong password" })))
    }
  }

  async fn assignment(Path(id): Path<u64>) -> (StatusCode, Json<Value>) {
    if id != 3 {
      return (StatusCode::NOT_FOUND, Json(json!({})));
    }
    (
      StatusCode::OK,
      Json(json!({
        "id": 3, "title": "Essay", "description": "Short answers", "type": "task",
        "task": [ { "id": 501, "question": "6 * 7?", "user_answers": [ { "answer": "42", "is_correct": true } ] },
                  { "id": 502, "question": "Name a prime" } ]
      })),
    )
  }

  async fn answers(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    let correct = body["answer"] == "Paris";
    seen.lock().unwrap().push(body);
    Json(json!({ "is_correct": correct, "points": 1 }))
  }

  async fn spawn_backend() -> (LuungsApi, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
      .route("/api/login", post(login))
      .route("/api/asignments/", get(|| async { Json(json!([{ "id": 3, "title": "Essay", "rating": 4.0 }])) }))
      .route("/api/asignments/:id", get(assignment))
      .route("/api/answers", post(answers))
      .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });

    let cfg = ClientConfig {
      api_url: format!("http://{addr}/api"),
      timeout: Duration::from_secs(5),
      ..ClientConfig::default()
    };
    (LuungsApi::new(&cfg).unwrap(), seen)
  }

  #[tokio::test]
  async fn login_reads_nested_id_and_server_message() {
    let (api, _) = spawn_backend().await;
    assert_eq!(api.login("a@b.c", "secret").await.unwrap(), 7);

    match api.login("a@b.c", "wrong").await {
      Err(ClientError::Rejected { status, message }) => {
        assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Wrong password");
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[tokio::test]
  async fn assignment_detail_converts_to_questions_and_priors() {
    let (api, _) = spawn_backend().await;
    let list = api.list_assignments().await.unwrap();
    assert_eq!(list[0].rating, Some(4.0));

    let a = api.get_assignment(3).await.unwrap();
    assert_eq!(a.questions.len(), 2);
    assert_eq!(a.questions[1].id, 502);
    assert_eq!(a.prior_answers.len(), 1);

    let missing = api.get_assignment(4).await.unwrap_err();
    assert_eq!(missing.kind(), crate::error::FailureKind::ServerRejection);
  }

  #[tokio::test]
  async fn submission_posts_the_expected_payload() {
    let (api, seen) = spawn_backend().await;
    let submission = SubmissionIn { user_id: 7, test_id: Some(77), task_id: None, answer: "Paris".into() };
    let verdict = api.submit(&submission).await.unwrap();

    assert!(verdict.is_correct);
    assert_eq!(seen.lock().unwrap().as_slice(), &[json!({ "user_id": 7, "test_id": 77, "answer": "Paris" })]);
  }

  #[tokio::test]
  async fn slow_grading_times_out_as_a_network_failure() {
    use crate::domain::{ChoiceOption, ChoiceSet, OptionKey, Question, QuestionKind};
    use crate::session::Session;
    use crate::tracker::{AnswerTracker, TrackerError};

    let app = Router::new().route(
      "/answers",
      post(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Json(json!({ "is_correct": true }))
      }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    let cfg = ClientConfig {
      api_url: format!("http://{addr}"),
      timeout: Duration::from_millis(200),
      ..ClientConfig::default()
    };

    let tracker = AnswerTracker::new(Session { user_id: 7 }, LuungsApi::new(&cfg).unwrap());
    let options = vec![ChoiceOption { key: OptionKey::A, text: "Paris".into(), value: "Paris".into() }];
    let question = Question { index: 0, id: 77, prompt: "Capital of France?".into(), kind: QuestionKind::Choice(ChoiceSet::new(options)) };
    tracker.hydrate(vec![question], []).await;

    match tracker.select_option(0, OptionKey::A, "Paris", 77).await {
      Err(TrackerError::Submit(e)) => assert_eq!(e.kind(), crate::error::FailureKind::Network),
      other => panic!("unexpected: {other:?}"),
    }
    let entry = tracker.entry(0).await.unwrap();
    assert_eq!(entry.last_failure, Some(crate::error::FailureKind::Network));
    assert_eq!(entry.correctness, None);
  }

  #[tokio::test]
  async fn unreachable_backend_is_a_network_failure() {
    let cfg = ClientConfig {
      api_url: "http://127.0.0.1:9".into(),
      timeout: Duration::from_secs(2),
      ..ClientConfig::default()
    };
    let api = LuungsApi::new(&cfg).unwrap();
    let err = api.list_users().await.unwrap_err();
    assert_eq!(err.kind(), crate::error::FailureKind::Network);
  }
}
