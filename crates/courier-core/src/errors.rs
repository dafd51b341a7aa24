use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Business error returned by the server for one request item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}: {}", .code.as_deref().unwrap_or("fault"), .message)]
pub struct Fault {
    /// Server error code such as `mail.NO_SUCH_FOLDER`.
    pub code: Option<String>,
    /// Human-readable reason text.
    pub message: String,
    /// Optional extended context (server trace id and similar).
    pub detail: Option<String>,
}

impl Fault {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }
}
