//! Per-question answer tracking for one assignment-viewing session.
//!
//! The tracker owns the selection/text/correctness of every question, submits
//! answers through an `AnswerSubmitter`, and records verdicts.
//!
//! Rules:
//!   - an entry marked correct is locked: further edits and submissions are no-ops
//!   - an incorrect entry may be retried
//!   - every submission gets a sequence number; a verdict is recorded only if it
//!     answers the most recent submission for that index, so the visible result
//!     is that of the last *issued* request, not the last to complete
//!   - a failed request leaves correctness at its pre-submission value
//!
//! Submissions for different indices run independently; the lock is never held
//! across a network call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::{OptionKey, PriorAnswer, Question, QuestionKind};
use crate::error::{ClientError, FailureKind};
use crate::protocol::{SubmissionIn, Verdict};
use crate::session::Session;

/// Transport used to grade answers.
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
  async fn submit(&self, submission: &SubmissionIn) -> Result<Verdict, ClientError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
  Unanswered,
  Pending,
  Correct,
  Incorrect,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnswerEntry {
  /// Highlighted option of a choice question.
  pub selection: Option<OptionKey>,
  /// Current input of a free-text question.
  pub free_text: String,
  /// Text accepted as correct; shown read-only once locked.
  pub submitted_text: Option<String>,
  /// None until a verdict has been recorded.
  pub correctness: Option<bool>,
  /// Why the latest submission failed, if it did.
  pub last_failure: Option<FailureKind>,
  awaiting: Option<u64>,
}

impl AnswerEntry {
  pub fn is_locked(&self) -> bool {
    self.correctness == Some(true)
  }

  pub fn state(&self) -> EntryState {
    match (self.correctness, self.awaiting) {
      (Some(true), _) => EntryState::Correct,
      (_, Some(_)) => EntryState::Pending,
      (Some(false), None) => EntryState::Incorrect,
      (None, None) => EntryState::Unanswered,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
  /// The verdict was recorded on the entry.
  Recorded { correct: bool },
  /// The entry is already correct; nothing was sent.
  Locked,
  /// A newer submission for the same question was issued; this response was dropped.
  Superseded,
}

#[derive(Debug, Error)]
pub enum TrackerError {
  #[error("question {0} is not loaded")]
  UnknownQuestion(usize),
  #[error("question {0} is not a choice question")]
  NotAChoice(usize),
  #[error("question {0} is not a free-text question")]
  NotFreeText(usize),
  #[error("answer for question {0} is empty")]
  EmptyAnswer(usize),
  #[error(transparent)]
  Submit(#[from] ClientError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
  pub total: usize,
  pub answered: usize,
  pub correct: usize,
}

#[derive(Default)]
struct Inner {
  questions: Vec<Question>,
  entries: HashMap<usize, AnswerEntry>,
}

pub struct AnswerTracker<S> {
  session: Session,
  submitter: S,
  inner: RwLock<Inner>,
  // Shared across indices and hydrates so a stale response can never match.
  next_seq: AtomicU64,
}

impl<S: AnswerSubmitter> AnswerTracker<S> {
  pub fn new(session: Session, submitter: S) -> Self {
    Self {
      session,
      submitter,
      inner: RwLock::new(Inner::default()),
      next_seq: AtomicU64::new(0),
    }
  }

  pub fn submitter(&self) -> &S {
    &self.submitter
  }

  fn issue_seq(&self) -> u64 {
    self.next_seq.fetch_add(1, Ordering::Relaxed) + 1
  }

  /// Load an assignment's questions and any answers the backend already recorded.
  ///
  /// Replaces all existing entries and sends nothing. Choice answers are mapped
  /// back to their option key through the question's value index.
  #[instrument(level = "info", skip_all, fields(questions = questions.len()))]
  pub async fn hydrate(&self, questions: Vec<Question>, prior_answers: impl IntoIterator<Item = (usize, PriorAnswer)>) {
    let mut entries = HashMap::new();
    for (index, prior) in prior_answers {
      let Some(question) = questions.get(index) else {
        warn!(target: "answers", index, "Prior answer for unknown question ignored");
        continue;
      };
      let mut entry = AnswerEntry { correctness: Some(prior.is_correct), ..AnswerEntry::default() };
      match &question.kind {
        QuestionKind::Choice(set) => {
          entry.selection = set.key_for_value(&prior.answer);
          if entry.selection.is_none() {
            warn!(target: "answers", index, "Prior answer matches no option");
          }
        }
        QuestionKind::FreeText => {
          if prior.is_correct {
            entry.submitted_text = Some(prior.answer.clone());
          }
          entry.free_text = prior.answer;
        }
      }
      entries.insert(index, entry);
    }
    info!(target: "answers", restored = entries.len(), "Tracker hydrated");
    *self.inner.write().await = Inner { questions, entries };
  }

  /// Pick an option and submit its value for grading.
  #[instrument(level = "info", skip(self, value), fields(user_id = self.session.user_id))]
  pub async fn select_option(
    &self,
    index: usize,
    key: OptionKey,
    value: &str,
    question_id: u64,
  ) -> Result<SubmitOutcome, TrackerError> {
    let seq = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      let question = inner.questions.get(index).ok_or(TrackerError::UnknownQuestion(index))?;
      if !question.is_choice() {
        return Err(TrackerError::NotAChoice(index));
      }
      let entry = inner.entries.entry(index).or_default();
      if entry.is_locked() {
        debug!(target: "answers", index, "Entry locked; selection ignored");
        return Ok(SubmitOutcome::Locked);
      }
      entry.selection = Some(key);
      let seq = self.issue_seq();
      entry.awaiting = Some(seq);
      seq
    };

    let submission = SubmissionIn {
      user_id: self.session.user_id,
      test_id: Some(question_id),
      task_id: None,
      answer: value.to_string(),
    };
    let result = self.submitter.submit(&submission).await;
    self.settle(index, seq, result, None).await
  }

  /// Update the text of a free-text question. Returns false when the entry is locked.
  pub async fn set_free_text(&self, index: usize, text: &str) -> Result<bool, TrackerError> {
    let mut guard = self.inner.write().await;
    let inner = &mut *guard;
    let question = inner.questions.get(index).ok_or(TrackerError::UnknownQuestion(index))?;
    if question.is_choice() {
      return Err(TrackerError::NotFreeText(index));
    }
    let entry = inner.entries.entry(index).or_default();
    if entry.is_locked() {
      return Ok(false);
    }
    entry.free_text = text.to_string();
    Ok(true)
  }

  /// Submit the stored text of a free-text question.
  #[instrument(level = "info", skip(self), fields(user_id = self.session.user_id))]
  pub async fn submit_free_text(&self, index: usize, task_id: u64) -> Result<SubmitOutcome, TrackerError> {
    let (seq, text) = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      let question = inner.questions.get(index).ok_or(TrackerError::UnknownQuestion(index))?;
      if question.is_choice() {
        return Err(TrackerError::NotFreeText(index));
      }
      let entry = inner.entries.entry(index).or_default();
      if entry.is_locked() {
        debug!(target: "answers", index, "Entry locked; submission ignored");
        return Ok(SubmitOutcome::Locked);
      }
      if entry.free_text.trim().is_empty() {
        return Err(TrackerError::EmptyAnswer(index));
      }
      let seq = self.issue_seq();
      entry.awaiting = Some(seq);
      (seq, entry.free_text.clone())
    };

    let submission = SubmissionIn {
      user_id: self.session.user_id,
      test_id: None,
      task_id: Some(task_id),
      answer: text.clone(),
    };
    let result = self.submitter.submit(&submission).await;
    self.settle(index, seq, result, Some(text)).await
  }

  async fn settle(
    &self,
    index: usize,
    seq: u64,
    result: Result<Verdict, ClientError>,
    submitted_text: Option<String>,
  ) -> Result<SubmitOutcome, TrackerError> {
    let mut inner = self.inner.write().await;
    let Some(entry) = inner.entries.get_mut(&index).filter(|e| e.awaiting == Some(seq)) else {
      debug!(target: "answers", index, seq, ok = result.is_ok(), "Stale response dropped");
      return Ok(SubmitOutcome::Superseded);
    };
    entry.awaiting = None;

    match result {
      Ok(verdict) => {
        entry.correctness = Some(verdict.is_correct);
        entry.last_failure = None;
        if verdict.is_correct {
          entry.submitted_text = submitted_text;
        }
        info!(target: "answers", index, seq, correct = verdict.is_correct, "Verdict recorded");
        Ok(SubmitOutcome::Recorded { correct: verdict.is_correct })
      }
      Err(e) => {
        let kind = e.kind();
        entry.last_failure = Some(kind);
        warn!(target: "answers", index, seq, failure = kind.as_str(), error = %e, "Submission failed");
        Err(TrackerError::Submit(e))
      }
    }
  }

  pub async fn entry(&self, index: usize) -> Option<AnswerEntry> {
    self.inner.read().await.entries.get(&index).cloned()
  }

  pub async fn state(&self, index: usize) -> EntryState {
    self.entry(index).await.map(|e| e.state()).unwrap_or(EntryState::Unanswered)
  }

  pub async fn is_locked(&self, index: usize) -> bool {
    self.entry(index).await.is_some_and(|e| e.is_locked())
  }

  pub async fn questions(&self) -> Vec<Question> {
    self.inner.read().await.questions.clone()
  }

  pub async fn progress(&self) -> Progress {
    let inner = self.inner.read().await;
    let graded = inner.entries.values().filter_map(|e| e.correctness);
    let (answered, correct) = graded.fold((0, 0), |(n, c), ok| (n + 1, c + usize::from(ok)));
    Progress { total: inner.questions.len(), answered, correct }
  }
}
