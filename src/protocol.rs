//! Wire DTOs for the Luungs backend (serde ready) and their conversion into domain types.
//! Field names follow the backend's JSON exactly.

use serde::{Deserialize, Serialize};

use crate::domain::{
    null_as_default, Assignment, AssignmentKind, ChoiceOption, ChoiceSet, OptionKey, PriorAnswer,
    Question, QuestionKind,
};
use crate::error::ClientError;

#[derive(Serialize)]
pub struct LoginIn<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login reply. The backend has shipped both a flat `id` and a nested `user`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginOut {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
pub struct UserRef {
    pub id: u64,
}

impl LoginOut {
    pub fn resolved_id(&self) -> Option<u64> {
        self.id
            .or(self.user_id)
            .or_else(|| self.user.as_ref().map(|u| u.id))
    }
}

#[derive(Serialize)]
pub struct RegisterIn<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
}

/// Error body used by the backend for rejected requests.
#[derive(Debug, Deserialize)]
pub struct MessageOut {
    pub message: String,
}

/// Answer submission. Exactly one of `test_id` / `task_id` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionIn {
    pub user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u64>,
    pub answer: String,
}

/// Grading verdict. Extra fields are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    pub is_correct: bool,
}

//
// Assignment detail
//

#[derive(Debug, Deserialize)]
pub struct AssignmentWire {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: AssignmentKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub test: Vec<TestItemWire>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task: Vec<TaskItemWire>,
}

#[derive(Debug, Deserialize)]
pub struct TestItemWire {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default)]
    pub a: Option<String>,
    #[serde(default)]
    pub b: Option<String>,
    #[serde(default)]
    pub c: Option<String>,
    #[serde(default)]
    pub d: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_answers: Vec<PriorAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct TaskItemWire {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_answers: Vec<PriorAnswer>,
}

impl TestItemWire {
    fn choice_set(&self) -> ChoiceSet {
        let texts = [&self.a, &self.b, &self.c, &self.d];
        let options = OptionKey::ALL
            .iter()
            .zip(texts)
            .filter_map(|(key, text)| {
                text.as_ref().map(|t| ChoiceOption {
                    key: *key,
                    text: t.clone(),
                    value: t.clone(),
                })
            })
            .collect();
        ChoiceSet::new(options)
    }
}

impl TryFrom<AssignmentWire> for Assignment {
    type Error = ClientError;

    fn try_from(w: AssignmentWire) -> Result<Self, Self::Error> {
        let mut questions = Vec::new();
        let mut prior_answers = Vec::new();
        match w.kind {
            AssignmentKind::Test => {
                for (index, item) in w.test.iter().enumerate() {
                    if let Some(prior) = item.user_answers.first() {
                        prior_answers.push((index, prior.clone()));
                    }
                    questions.push(Question {
                        index,
                        id: item.id,
                        prompt: item.question.clone(),
                        kind: QuestionKind::Choice(item.choice_set()),
                    });
                }
            }
            AssignmentKind::Task => {
                for (index, item) in w.task.into_iter().enumerate() {
                    if let Some(prior) = item.user_answers.into_iter().next() {
                        prior_answers.push((index, prior));
                    }
                    questions.push(Question {
                        index,
                        id: item.id,
                        prompt: item.question,
                        kind: QuestionKind::FreeText,
                    });
                }
            }
        }
        if questions.is_empty() {
            return Err(ClientError::Malformed(format!(
                "assignment {} has no questions",
                w.id
            )));
        }
        Ok(Assignment {
            id: w.id,
            title: w.title,
            description: w.description,
            kind: w.kind,
            questions,
            prior_answers,
        })
    }
}
