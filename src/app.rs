//! Application wiring: config, backend client, session store and assistant,
//! plus one handler per command. Handlers return the text to print.

use tracing::{info, instrument, warn};

use crate::api::LuungsApi;
use crate::assistant::{Assistant, ChatLog};
use crate::cli::{CliError, Command, USAGE};
use crate::config::ClientConfig;
use crate::domain::{filter_assignments, Assignment, OptionKey, ProfileForm, QuestionKind};
use crate::error::ClientError;
use crate::render;
use crate::session::{FileSessionStore, SessionStore};
use crate::tracker::{AnswerTracker, SubmitOutcome};

pub struct App<St> {
    pub config: ClientConfig,
    pub api: LuungsApi,
    pub assistant: Assistant,
    pub sessions: St,
}

impl App<FileSessionStore> {
    /// Build from env: load config, set up HTTP clients, point the session store at its file.
    pub fn from_env() -> Result<Self, ClientError> {
        let config = ClientConfig::from_env();
        let sessions = FileSessionStore::new(&config.session_path);
        Self::new(config, sessions)
    }
}

impl<St: SessionStore> App<St> {
    pub fn new(config: ClientConfig, sessions: St) -> Result<Self, ClientError> {
        let api = LuungsApi::new(&config)?;
        let assistant = Assistant::new(&config)?;
        if assistant.enabled() {
            info!(target: "luungs", model = %assistant.model(), "Assistant enabled.");
        } else {
            info!(target: "luungs", "Assistant disabled (no OPENAI_API_KEY).");
        }
        Ok(Self { config, api, assistant, sessions })
    }

    #[instrument(level = "info", skip_all)]
    pub async fn run(&self, cmd: Command) -> Result<String, CliError> {
        match cmd {
            Command::Help => Ok(USAGE.to_string()),
            Command::Login { email, password } => self.login(&email, &password).await,
            Command::Register { name, email, password, confirm } => {
                self.register(&name, &email, &password, &confirm).await
            }
            Command::Logout => {
                self.sessions.remove().await?;
                info!(target: "luungs", "Logged out successfully");
                Ok("Logged out.".into())
            }
            Command::Profile => {
                let session = self.sessions.session().await?;
                let user = self.api.get_user(session.user_id).await?;
                Ok(render::profile(&user))
            }
            Command::ProfileUpdate { fields } => self.update_profile(&fields).await,
            Command::Students => Ok(render::student_list(&self.api.list_users().await?)),
            Command::Student { id } => Ok(render::student(&self.api.get_user(id).await?)),
            Command::Assignments { query } => {
                let items = self.api.list_assignments().await?;
                let shown = filter_assignments(&items, query.as_deref().unwrap_or_default());
                Ok(render::assignment_list(&shown))
            }
            Command::Assignment { id } => self.show_assignment(id).await,
            Command::Answer { assignment_id, question, input } => {
                self.answer(assignment_id, question, &input).await
            }
            Command::Chat { text } => {
                let mut log = ChatLog::default();
                log.send(&self.assistant, &text).await;
                Ok(render::chat(log.messages()))
            }
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<String, CliError> {
        let user_id = self.api.login(email, password).await?;
        self.sessions.set(&user_id.to_string()).await?;
        Ok(format!("Logged in (user {user_id})."))
    }

    async fn register(&self, name: &str, email: &str, password: &str, confirm: &str) -> Result<String, CliError> {
        if password != confirm {
            return Err(ClientError::Validation("Passwords don't match".into()).into());
        }
        self.api.register(name, email, password).await?;
        Ok("Registered. You can log in now.".into())
    }

    async fn update_profile(&self, fields: &[(String, String)]) -> Result<String, CliError> {
        let session = self.sessions.session().await?;
        let current = self.api.get_user(session.user_id).await?;
        let mut form = ProfileForm::from_profile(&current);
        for (field, value) in fields {
            form.set(field, value).map_err(CliError::Usage)?;
        }
        self.api.update_user(session.user_id, &form).await?;
        Ok("Profile updated.".into())
    }

    /// Fetch an assignment and hydrate a tracker with the user's prior answers.
    async fn open_assignment(
        &self,
        id: u64,
    ) -> Result<(Assignment, AnswerTracker<LuungsApi>), CliError> {
        let session = self.sessions.session().await?;
        let assignment = self.api.get_assignment(id).await?;
        let tracker = AnswerTracker::new(session, self.api.clone());
        tracker
            .hydrate(assignment.questions.clone(), assignment.prior_answers.clone())
            .await;
        Ok((assignment, tracker))
    }

    async fn render_assignment(
        &self,
        assignment: &Assignment,
        tracker: &AnswerTracker<LuungsApi>,
    ) -> String {
        let mut entries = Vec::new();
        for q in tracker.questions().await {
            entries.push(tracker.entry(q.index).await);
        }
        render::assignment(assignment, &entries, tracker.progress().await)
    }

    async fn show_assignment(&self, id: u64) -> Result<String, CliError> {
        let (assignment, tracker) = self.open_assignment(id).await?;
        Ok(self.render_assignment(&assignment, &tracker).await)
    }

    #[instrument(level = "info", skip(self, input), fields(input_len = input.len()))]
    async fn answer(&self, assignment_id: u64, question_no: usize, input: &str) -> Result<String, CliError> {
        let (assignment, tracker) = self.open_assignment(assignment_id).await?;
        let index = question_no - 1;
        let question = assignment
            .questions
            .get(index)
            .ok_or_else(|| CliError::Usage(format!("assignment {assignment_id} has no question {question_no}")))?;

        let outcome = match &question.kind {
            QuestionKind::Choice(set) => {
                let key = input.parse::<OptionKey>().map_err(CliError::Usage)?;
                let option = set
                    .get(key)
                    .ok_or_else(|| CliError::Usage(format!("question {question_no} has no option '{key}'")))?;
                tracker.select_option(index, key, &option.value, question.id).await
            }
            QuestionKind::FreeText => {
                tracker.set_free_text(index, input).await?;
                tracker.submit_free_text(index, question.id).await
            }
        };

        let headline = match outcome {
            Ok(SubmitOutcome::Recorded { correct: true }) => "Correct!".to_string(),
            Ok(SubmitOutcome::Recorded { correct: false }) => "Not quite. You can try again.".to_string(),
            Ok(SubmitOutcome::Locked) => "Already answered correctly; answer not sent.".to_string(),
            Ok(SubmitOutcome::Superseded) => "A newer answer replaced this one.".to_string(),
            Err(e) => {
                warn!(target: "answers", error = %e, "Answer not recorded");
                format!("Answer not recorded: {e}")
            }
        };
        let entry = tracker.entry(index).await;
        Ok(format!("{headline}\n{}", render::question(question, entry.as_ref())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::session::MemorySessionStore;

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn assignment(Path(id): Path<u64>) -> Json<Value> {
        Json(json!({
            "id": id, "title": "Capitals", "description": "Pick one", "type": "test",
            "test": [
                { "id": 76, "question": "Capital of Peru?", "a": "Lima", "b": "Quito",
                  "user_answers": [ { "answer": "Lima", "is_correct": true } ] },
                { "id": 77, "question": "Capital of France?", "a": "Paris", "b": "Rome" }
            ]
        }))
    }

    async fn answers(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        let correct = body["answer"] == "Paris";
        seen.lock().unwrap().push(body);
        Json(json!({ "is_correct": correct }))
    }

    async fn app() -> (App<MemorySessionStore>, Seen) {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/login", post(|| async { Json(json!({ "id": 12 })) }))
            .route("/asignments/:id", get(assignment))
            .route("/answers", post(answers))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let config = ClientConfig {
            api_url: format!("http://{addr}"),
            timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        };
        (App::new(config, MemorySessionStore::default()).unwrap(), seen)
    }

    #[tokio::test]
    async fn answering_requires_login_and_respects_prior_answers() {
        let (app, seen) = app().await;
        let cmd = Command::Answer { assignment_id: 3, question: 2, input: "a".into() };
        assert!(matches!(app.run(cmd.clone()).await, Err(CliError::Client(ClientError::NotLoggedIn))));

        app.run(Command::Login { email: "a@b.c".into(), password: "pw".into() }).await.unwrap();
        assert_eq!(app.sessions.get().await.unwrap().as_deref(), Some("12"));

        let out = app.run(cmd).await.unwrap();
        assert!(out.starts_with("Correct!"), "{out}");
        assert_eq!(seen.lock().unwrap().as_slice(), &[json!({ "user_id": 12, "test_id": 77, "answer": "Paris" })]);

        // Question 1 was already answered correctly on the server.
        let out = app
            .run(Command::Answer { assignment_id: 3, question: 1, input: "b".into() })
            .await
            .unwrap();
        assert!(out.starts_with("Already answered correctly"), "{out}");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_checks_password_confirmation_locally() {
        let (app, _) = app().await;
        let cmd = Command::Register {
            name: "Ann".into(),
            email: "ann@x.y".into(),
            password: "one".into(),
            confirm: "two".into(),
        };
        match app.run(cmd).await {
            Err(CliError::Client(ClientError::Validation(msg))) => assert_eq!(msg, "Passwords don't match"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
