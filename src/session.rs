//! Identity persistence: a single user id kept on the local device.
//!
//! `SessionStore` is the get/set/remove collaborator; `Session` is the parsed,
//! explicit context that callers thread into the tracker and the API.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::ClientError;

/// The logged-in user, passed explicitly to everything that needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
  pub user_id: u64,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn get(&self) -> Result<Option<String>, ClientError>;
  async fn set(&self, value: &str) -> Result<(), ClientError>;
  async fn remove(&self) -> Result<(), ClientError>;

  /// Current session, or `NotLoggedIn` when nothing usable is stored.
  async fn session(&self) -> Result<Session, ClientError> {
    let raw = self.get().await?.ok_or(ClientError::NotLoggedIn)?;
    let user_id = raw.trim().parse::<u64>().map_err(|_| ClientError::NotLoggedIn)?;
    Ok(Session { user_id })
  }
}

/// Stores the id in one small file. A missing file means logged out.
pub struct FileSessionStore {
  path: PathBuf,
}

impl FileSessionStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

#[async_trait]
impl SessionStore for FileSessionStore {
  #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
  async fn get(&self) -> Result<Option<String>, ClientError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(s) if s.trim().is_empty() => Ok(None),
      Ok(s) => Ok(Some(s.trim().to_string())),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  #[instrument(level = "debug", skip(self, value), fields(path = %self.path.display()))]
  async fn set(&self, value: &str) -> Result<(), ClientError> {
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&self.path, value).await?;
    debug!(target: "luungs", "Session id stored");
    Ok(())
  }

  #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
  async fn remove(&self) -> Result<(), ClientError> {
    match tokio::fs::remove_file(&self.path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

/// In-memory store, handy for tests and throwaway sessions.
#[derive(Default)]
pub struct MemorySessionStore {
  value: RwLock<Option<String>>,
}

impl MemorySessionStore {
  pub fn with_value(value: &str) -> Self {
    Self { value: RwLock::new(Some(value.to_string())) }
  }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
  async fn get(&self) -> Result<Option<String>, ClientError> {
    Ok(self.value.read().await.clone())
  }

  async fn set(&self, value: &str) -> Result<(), ClientError> {
    *self.value.write().await = Some(value.to_string());
    Ok(())
  }

  async fn remove(&self) -> Result<(), ClientError> {
    *self.value.write().await = None;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn file_store_roundtrips_and_removes() {
    let path = std::env::temp_dir()
      .join(format!("luungs-session-{}", uuid::Uuid::new_v4()))
      .join("user_id");
    let store = FileSessionStore::new(&path);

    assert!(matches!(store.session().await, Err(ClientError::NotLoggedIn)));
    store.set("42").await.unwrap();
    assert_eq!(store.session().await.unwrap(), Session { user_id: 42 });

    store.remove().await.unwrap();
    assert_eq!(store.get().await.unwrap(), None);
    // Removing twice is fine.
    store.remove().await.unwrap();
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }

  #[tokio::test]
  async fn non_numeric_id_is_not_a_session() {
    let store = MemorySessionStore::with_value("abc");
    assert!(matches!(store.session().await, Err(ClientError::NotLoggedIn)));
  }
}
