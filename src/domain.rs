//! Domain models: questions and their options, assignments, users.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Label of a choice option. The backend always ships four of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
  A,
  B,
  C,
  D,
}

impl OptionKey {
  pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

  pub fn as_str(&self) -> &'static str {
    match self {
      OptionKey::A => "a",
      OptionKey::B => "b",
      OptionKey::C => "c",
      OptionKey::D => "d",
    }
  }
}

impl fmt::Display for OptionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OptionKey {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "a" => Ok(OptionKey::A),
      "b" => Ok(OptionKey::B),
      "c" => Ok(OptionKey::C),
      "d" => Ok(OptionKey::D),
      other => Err(format!("unknown option '{other}' (expected a, b, c or d)")),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceOption {
  pub key: OptionKey,
  pub text: String,
  /// Sent verbatim as the answer when this option is picked.
  pub value: String,
}

/// Ordered options of a choice question with a value -> key index.
///
/// The index is built once here so hydrating prior answers is a lookup.
/// When two options share a value the first one wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceSet {
  options: Vec<ChoiceOption>,
  by_value: HashMap<String, OptionKey>,
}

impl ChoiceSet {
  pub fn new(options: Vec<ChoiceOption>) -> Self {
    let mut by_value = HashMap::with_capacity(options.len());
    for opt in &options {
      by_value.entry(opt.value.clone()).or_insert(opt.key);
    }
    Self { options, by_value }
  }

  pub fn options(&self) -> &[ChoiceOption] {
    &self.options
  }

  pub fn get(&self, key: OptionKey) -> Option<&ChoiceOption> {
    self.options.iter().find(|o| o.key == key)
  }

  pub fn key_for_value(&self, value: &str) -> Option<OptionKey> {
    self.by_value.get(value).copied()
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionKind {
  Choice(ChoiceSet),
  FreeText,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
  /// Position within the assignment (0-based).
  pub index: usize,
  /// External id sent as `test_id` / `task_id`.
  pub id: u64,
  pub prompt: String,
  pub kind: QuestionKind,
}

impl Question {
  pub fn is_choice(&self) -> bool {
    matches!(self.kind, QuestionKind::Choice(_))
  }

  pub fn choices(&self) -> Option<&ChoiceSet> {
    match &self.kind {
      QuestionKind::Choice(set) => Some(set),
      QuestionKind::FreeText => None,
    }
  }
}

/// Treats both a missing key and an explicit `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// An answer the backend already recorded for this user.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PriorAnswer {
  #[serde(default, deserialize_with = "null_as_default")]
  pub answer: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub is_correct: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
  /// Multiple-choice questions.
  Test,
  /// Free-text questions.
  Task,
}

/// Row of the assignment list.
#[derive(Clone, Debug, Deserialize)]
pub struct AssignmentSummary {
  pub id: u64,
  #[serde(default, deserialize_with = "null_as_default")]
  pub title: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub description: String,
  #[serde(default)]
  pub rating: Option<f64>,
}

impl AssignmentSummary {
  /// Case-insensitive substring match on title or description. Blank queries match everything.
  pub fn matches(&self, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty() || self.title.to_lowercase().contains(&q) || self.description.to_lowercase().contains(&q)
  }
}

/// Keep the assignments whose title or description contains `query`.
pub fn filter_assignments<'a>(items: &'a [AssignmentSummary], query: &str) -> Vec<&'a AssignmentSummary> {
  items.iter().filter(|a| a.matches(query)).collect()
}

#[derive(Clone, Debug)]
pub struct Assignment {
  pub id: u64,
  pub title: String,
  pub description: String,
  pub kind: AssignmentKind,
  pub questions: Vec<Question>,
  /// Prior answers keyed by question index.
  pub prior_answers: Vec<(usize, PriorAnswer)>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserProfile {
  pub id: u64,
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub email: String,
  #[serde(default)]
  pub avatar: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub university: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub music_taste: Option<String>,
  #[serde(default)]
  pub movie_taste: Option<String>,
  #[serde(default)]
  pub grade: Option<String>,
  #[serde(default)]
  pub rating: Option<f64>,
}

/// Editable profile fields, sent whole on update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileForm {
  pub name: String,
  pub email: String,
  pub description: String,
  pub music_taste: String,
  pub movie_taste: String,
  pub university: String,
  pub grade: String,
}

impl ProfileForm {
  pub fn from_profile(p: &UserProfile) -> Self {
    let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();
    Self {
      name: p.name.clone(),
      email: p.email.clone(),
      description: or_empty(&p.description),
      music_taste: or_empty(&p.music_taste),
      movie_taste: or_empty(&p.movie_taste),
      university: or_empty(&p.university),
      grade: or_empty(&p.grade),
    }
  }

  /// Set one field by its wire name.
  pub fn set(&mut self, field: &str, value: &str) -> Result<(), String> {
    let slot = match field {
      "name" => &mut self.name,
      "email" => &mut self.email,
      "description" => &mut self.description,
      "music_taste" => &mut self.music_taste,
      "movie_taste" => &mut self.movie_taste,
      "university" => &mut self.university,
      "grade" => &mut self.grade,
      other => return Err(format!("unknown profile field '{other}'")),
    };
    *slot = value.to_string();
    Ok(())
  }
}
