//! Luungs · learning app client
//!
//! - Backend client (login, assignments, students, profiles, answer grading)
//! - Per-question answer tracking with lock-on-correct and last-issued-wins ordering
//! - Optional chat assistant (OpenAI-compatible chat completions)
//! - Plain-text rendering for the `luungs` terminal front end

pub mod api;
pub mod app;
pub mod assistant;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod tracker;

pub use api::LuungsApi;
pub use error::{ClientError, FailureKind};
pub use session::Session;
pub use tracker::{AnswerSubmitter, AnswerTracker, EntryState, SubmitOutcome, TrackerError};
