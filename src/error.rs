// error.rs - Bot Error Types
// Crate-wide error returned by module handlers. The dispatcher logs these and,
// when the interaction is still open, reports them to the user.

use thiserror::Error;

use crate::grade::GradeError;
use crate::selection::SelectionError;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Grade(#[from] GradeError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// A command option resolved to something that is neither a user nor a role.
    #[error("Unsupported mention in option `{0}`")]
    InvalidReference(String),

    #[error("Render service responded with status {0}")]
    RenderStatus(reqwest::StatusCode),
}

pub type BotResult<T = ()> = Result<T, BotError>;
