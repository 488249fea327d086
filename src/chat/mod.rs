// src/chat/mod.rs — Conversation data model

pub mod log;

pub use log::{LogCommand, LogView, MessageLog, Role, Turn, TurnId, TurnStatus};

use crate::infra::errors::ChatError;

/// Write access to a log, granted only in the form of patch commands.
pub trait LogWriter: Send + Sync {
    fn apply(&self, cmd: LogCommand) -> Result<(), ChatError>;

    /// Id of the last turn, used to check a `RemoveLast` targets the right turn.
    fn last_id(&self) -> Option<TurnId>;
}

impl LogWriter for std::sync::Mutex<MessageLog> {
    fn apply(&self, cmd: LogCommand) -> Result<(), ChatError> {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .apply(cmd)
    }

    fn last_id(&self) -> Option<TurnId> {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .last()
            .map(|t| t.id.clone())
    }
}
