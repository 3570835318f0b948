//! Error taxonomy shared by the API client, the session store and the tracker.

use thiserror::Error;

/// Coarse failure class used in telemetry fields and for the retry affordance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
  /// The request never produced a usable HTTP response (connect, timeout, body read).
  Network,
  /// The backend answered, but with a non-2xx status or a payload we could not read.
  ServerRejection,
  /// Rejected locally before any request was made.
  Local,
}

impl FailureKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      FailureKind::Network => "network",
      FailureKind::ServerRejection => "server_rejection",
      FailureKind::Local => "local",
    }
  }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
  #[error("request failed: {0}")]
  Network(#[from] reqwest::Error),
  #[error("server rejected request ({status}): {message}")]
  Rejected { status: reqwest::StatusCode, message: String },
  #[error("malformed response: {0}")]
  Malformed(String),
  #[error("not logged in")]
  NotLoggedIn,
  #[error("session storage failed: {0}")]
  Session(#[from] std::io::Error),
  #[error("{0}")]
  Validation(String),
}

impl ClientError {
  pub fn kind(&self) -> FailureKind {
    match self {
      // reqwest reports undecodable JSON bodies as decode errors; the server did answer.
      ClientError::Network(e) if e.is_decode() => FailureKind::ServerRejection,
      ClientError::Network(_) => FailureKind::Network,
      ClientError::Rejected { .. } | ClientError::Malformed(_) => FailureKind::ServerRejection,
      ClientError::NotLoggedIn | ClientError::Session(_) | ClientError::Validation(_) => {
        FailureKind::Local
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejections_and_local_errors_are_classified() {
    let rejected = ClientError::Rejected {
      status: reqwest::StatusCode::BAD_REQUEST,
      message: "nope".into(),
    };
    assert_eq!(rejected.kind(), FailureKind::ServerRejection);
    assert_eq!(ClientError::Malformed("x".into()).kind(), FailureKind::ServerRejection);
    assert_eq!(ClientError::NotLoggedIn.kind(), FailureKind::Local);
    assert_eq!(rejected.to_string(), "server rejected request (400 Bad Request): nope");
  }
}
