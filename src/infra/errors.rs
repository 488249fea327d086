// src/infra/errors.rs — Error types for docchat

use thiserror::Error;

use crate::chat::log::TurnStatus;

#[derive(Error, Debug)]
pub enum ChatError {
    // Upstream errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Document not found. Please reselect.")]
    NotFound,

    #[error("Failed to get response (HTTP {status})")]
    Http { status: u16 },

    #[error("Malformed UTF-8 in answer stream at byte {offset}")]
    Decode { offset: usize },

    /// User-initiated stop. Informational, never shown as a failure.
    #[error("Generation stopped")]
    Cancelled,

    // Message log errors
    #[error("Message log is empty")]
    EmptyLog,

    #[error("Turn '{id}' already exists")]
    DuplicateTurn { id: String },

    #[error("Turn '{id}' is already streaming")]
    AlreadyStreaming { id: String },

    #[error("Turn '{id}' cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: String,
        from: TurnStatus,
        to: TurnStatus,
    },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }

    /// Text shown in an errored turn.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::NotFound => "Document not found. Please reselect.".into(),
            ChatError::Http { .. } => "Failed to get response".into(),
            ChatError::Transport(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            if status == reqwest::StatusCode::NOT_FOUND {
                return ChatError::NotFound;
            }
            return ChatError::Http {
                status: status.as_u16(),
            };
        }
        ChatError::Transport(e.to_string())
    }
}
