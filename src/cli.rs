//! Command-line parsing. Small enough to do by hand.

use thiserror::Error;

use crate::error::ClientError;
use crate::tracker::TrackerError;

pub const USAGE: &str = "\
usage: luungs <command> [args]

commands:
  login <email> <password>
  register <name> <email> <password> <confirm-password>
  logout
  profile
  profile-update <field=value>...   (name, email, description, music_taste,
                                     movie_taste, university, grade)
  students
  student <id>
  assignments [search]
  assignment <id>
  answer <assignment-id> <question-no> <option|text...>
  chat <text...>
";

#[derive(Debug, Error)]
pub enum CliError {
  #[error("{0}\n\n{usage}", usage = USAGE)]
  Usage(String),
  #[error(transparent)]
  Client(#[from] ClientError),
  #[error(transparent)]
  Tracker(#[from] TrackerError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
  Help,
  Login { email: String, password: String },
  Register { name: String, email: String, password: String, confirm: String },
  Logout,
  Profile,
  ProfileUpdate { fields: Vec<(String, String)> },
  Students,
  Student { id: u64 },
  Assignments { query: Option<String> },
  Assignment { id: u64 },
  /// `question` is 1-based, as displayed.
  Answer { assignment_id: u64, question: usize, input: String },
  Chat { text: String },
}

fn usage(msg: impl Into<String>) -> CliError {
  CliError::Usage(msg.into())
}

fn parse_id(raw: &str, what: &str) -> Result<u64, CliError> {
  raw.parse::<u64>().map_err(|_| usage(format!("invalid {what}: '{raw}'")))
}

impl Command {
  pub fn parse<I, S>(args: I) -> Result<Self, CliError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let Some((name, rest)) = args.split_first() else {
      return Ok(Command::Help);
    };
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    let cmd = match (name.as_str(), rest.as_slice()) {
      ("help" | "-h" | "--help", _) => Command::Help,
      ("login", [email, password]) => Command::Login { email: email.to_string(), password: password.to_string() },
      ("register", [name, email, password, confirm]) => Command::Register {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        confirm: confirm.to_string(),
      },
      ("logout", []) => Command::Logout,
      ("profile", []) => Command::Profile,
      ("profile-update", pairs) if !pairs.is_empty() => {
        let fields = pairs
          .iter()
          .map(|p| {
            p.split_once('=')
              .map(|(k, v)| (k.trim().to_string(), v.to_string()))
              .ok_or_else(|| usage(format!("expected field=value, got '{p}'")))
          })
          .collect::<Result<Vec<_>, _>>()?;
        Command::ProfileUpdate { fields }
      }
      ("students", []) => Command::Students,
      ("student", [id]) => Command::Student { id: parse_id(id, "student id")? },
      ("assignments", []) => Command::Assignments { query: None },
      ("assignments", words) => Command::Assignments { query: Some(words.join(" ")) },
      ("assignment", [id]) => Command::Assignment { id: parse_id(id, "assignment id")? },
      ("answer", [id, no, input @ ..]) if !input.is_empty() => {
        let question = no
          .parse::<usize>()
          .ok()
          .filter(|n| *n > 0)
          .ok_or_else(|| usage(format!("invalid question number: '{no}'")))?;
        Command::Answer { assignment_id: parse_id(id, "assignment id")?, question, input: input.join(" ") }
      }
      ("chat", words) if !words.is_empty() => Command::Chat { text: words.join(" ") },
      (other, _) => return Err(usage(format!("unknown command or wrong arguments: '{other}'"))),
    };
    Ok(cmd)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_answer_with_multi_word_text() {
    let cmd = Command::parse(["answer", "3", "2", "forty", "two"]).unwrap();
    assert_eq!(cmd, Command::Answer { assignment_id: 3, question: 2, input: "forty two".into() });
  }

  #[test]
  fn rejects_zero_question_and_bad_pairs() {
    assert!(matches!(Command::parse(["answer", "3", "0", "a"]), Err(CliError::Usage(_))));
    assert!(matches!(Command::parse(["profile-update", "grade"]), Err(CliError::Usage(_))));
    assert!(matches!(Command::parse(["login", "only-email"]), Err(CliError::Usage(_))));
  }

  #[test]
  fn empty_args_mean_help() {
    assert_eq!(Command::parse(Vec::<String>::new()).unwrap(), Command::Help);
    assert_eq!(
      Command::parse(["profile-update", "grade=3", "music_taste=a=b"]).unwrap(),
      Command::ProfileUpdate { fields: vec![("grade".into(), "3".into()), ("music_taste".into(), "a=b".into())] }
    );
  }
}
