//! Plain-text rendering of lists, profiles and assignment state for the terminal.

use crate::assistant::{ChatMessage, Role};
use crate::domain::{Assignment, AssignmentSummary, Question, QuestionKind, UserProfile};
use crate::error::FailureKind;
use crate::tracker::{AnswerEntry, EntryState, Progress};

const NOT_SPECIFIED: &str = "not specified";

fn or_unspecified(v: &Option<String>) -> &str {
  v.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(NOT_SPECIFIED)
}

/// Avatar placeholder: the upper-cased first letter of the name.
pub fn avatar_initial(name: &str) -> String {
  name.trim().chars().next().map(|c| c.to_uppercase().collect()).unwrap_or_else(|| "?".into())
}

pub fn assignment_list(items: &[&AssignmentSummary]) -> String {
  if items.is_empty() {
    return "No assignments.".into();
  }
  items
    .iter()
    .map(|a| {
      let rating = a.rating.map(|r| r.to_string()).unwrap_or_else(|| NOT_SPECIFIED.into());
      format!("#{} {}\n    {}\n    rating: {}", a.id, a.title, a.description, rating)
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn state_badge(entry: Option<&AnswerEntry>) -> &'static str {
  match entry.map(AnswerEntry::state).unwrap_or(EntryState::Unanswered) {
    EntryState::Unanswered => "[ ]",
    EntryState::Pending => "[…]",
    EntryState::Correct => "[✓]",
    EntryState::Incorrect => "[✗]",
  }
}

pub fn question(q: &Question, entry: Option<&AnswerEntry>) -> String {
  let mut lines = vec![format!("{} {}. {}", state_badge(entry), q.index + 1, q.prompt)];
  match &q.kind {
    QuestionKind::Choice(set) => {
      let selected = entry.and_then(|e| e.selection);
      for opt in set.options() {
        let mark = if selected == Some(opt.key) { '>' } else { ' ' };
        lines.push(format!("   {mark} {}) {}", opt.key, opt.text));
      }
    }
    QuestionKind::FreeText => match entry {
      Some(e) if e.is_locked() => {
        lines.push(format!("    answer accepted: {}", e.submitted_text.as_deref().unwrap_or(&e.free_text)));
      }
      Some(e) if !e.free_text.is_empty() => lines.push(format!("    your answer: {}", e.free_text)),
      _ => lines.push("    (no answer yet)".into()),
    },
  }
  if let Some(kind) = entry.and_then(|e| e.last_failure) {
    let why = match kind {
      FailureKind::Network => "could not reach the server",
      FailureKind::ServerRejection => "the server rejected the answer",
      FailureKind::Local => "the answer was not sent",
    };
    lines.push(format!("    last attempt failed: {why}; try again"));
  }
  lines.join("\n")
}

pub fn assignment(a: &Assignment, entries: &[Option<AnswerEntry>], progress: Progress) -> String {
  let mut out = vec![a.title.clone()];
  if !a.description.trim().is_empty() {
    out.push(a.description.clone());
  }
  out.push(format!("{}/{} answered, {} correct", progress.answered, progress.total, progress.correct));
  for q in &a.questions {
    out.push(question(q, entries.get(q.index).and_then(Option::as_ref)));
  }
  out.join("\n")
}

pub fn student_list(users: &[UserProfile]) -> String {
  if users.is_empty() {
    return "No students.".into();
  }
  users
    .iter()
    .map(|u| format!("#{} {} ({})", u.id, u.name, or_unspecified(&u.university)))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn student(u: &UserProfile) -> String {
  [
    format!("avatar: {}", u.avatar.clone().unwrap_or_else(|| avatar_initial(&u.name))),
    u.name.clone(),
    format!("City: {}", or_unspecified(&u.city)),
    format!("Email: {}", u.email),
  ]
  .join("\n")
}

pub fn profile(u: &UserProfile) -> String {
  let rating = u.rating.map(|r| r.to_string()).unwrap_or_else(|| NOT_SPECIFIED.into());
  [
    format!("avatar: {}", u.avatar.clone().unwrap_or_else(|| avatar_initial(&u.name))),
    format!("{} ({})", u.name, or_unspecified(&u.university)),
    format!("rating: {rating}"),
    format!("music: {}", or_unspecified(&u.music_taste)),
    format!("movies: {}", or_unspecified(&u.movie_taste)),
  ]
  .join("\n")
}

pub fn chat(messages: &[ChatMessage]) -> String {
  messages
    .iter()
    .map(|m| {
      let who = match m.role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::Error => "error",
      };
      format!("{who}: {}", m.text)
    })
    .collect::<Vec<_>>()
    .join("\n")
}
