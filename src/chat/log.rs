// src/chat/log.rs — Ordered conversation log driven by patch commands
//
// All mutation goes through `LogCommand` so that a sequence of commands can be
// replayed deterministically. Turns are kept in insertion order and are only
// ever removed by `RemoveLast`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infra::errors::ChatError;

/// Opaque, immutable turn identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id with a readable prefix, e.g. `assistant-6f1c…`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Pending,
    Streaming,
    Complete,
    Aborted,
    Errored,
}

impl TurnStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnStatus::Complete | TurnStatus::Aborted | TurnStatus::Errored
        )
    }

    /// `pending → streaming → {complete | aborted | errored}`; nothing skips `streaming`.
    pub fn can_transition_to(self, next: TurnStatus) -> bool {
        match (self, next) {
            (TurnStatus::Pending, TurnStatus::Streaming) => true,
            (TurnStatus::Streaming, n) => n.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub status: TurnStatus,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::generate("user"),
            role: Role::User,
            content: content.into(),
            status: TurnStatus::Complete,
            created_at: Utc::now(),
        }
    }

    /// Empty assistant turn waiting for its stream.
    pub fn assistant_pending() -> Self {
        Self {
            id: TurnId::generate("assistant"),
            role: Role::Assistant,
            content: String::new(),
            status: TurnStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Terminal assistant turn that replaces an answer which never started.
    pub fn error(message: &str) -> Self {
        Self {
            id: TurnId::generate("error"),
            role: Role::Assistant,
            content: format!("❌ {message}"),
            status: TurnStatus::Errored,
            created_at: Utc::now(),
        }
    }

    pub fn welcome(text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new("initial"),
            role: Role::Assistant,
            content: text.into(),
            status: TurnStatus::Complete,
            created_at: Utc::now(),
        }
    }
}

/// A single patch against the log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogCommand {
    Append(Turn),
    ReplaceContent { id: TurnId, content: String },
    SetStatus { id: TurnId, status: TurnStatus },
    RemoveLast,
}

/// What a rendering consumer sees after every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogView {
    pub turns: Vec<Turn>,
    /// The turn currently receiving text, for cursor/spinner display.
    pub streaming: Option<TurnId>,
}

impl LogView {
    pub fn turn(&self, id: &TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| &t.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    turns: Vec<Turn>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_welcome(text: &str) -> Self {
        Self {
            turns: vec![Turn::welcome(text)],
        }
    }

    /// Rebuild a log from scratch by applying `commands` in order.
    pub fn replay<'a>(
        commands: impl IntoIterator<Item = &'a LogCommand>,
    ) -> Result<Self, ChatError> {
        let mut log = Self::new();
        for cmd in commands {
            log.apply(cmd.clone())?;
        }
        Ok(log)
    }

    pub fn apply(&mut self, cmd: LogCommand) -> Result<(), ChatError> {
        match cmd {
            LogCommand::Append(turn) => self.append(turn),
            LogCommand::ReplaceContent { id, content } => {
                self.replace_content(&id, content);
                Ok(())
            }
            LogCommand::SetStatus { id, status } => self.set_status(&id, status),
            LogCommand::RemoveLast => self.remove_last().map(|_| ()),
        }
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), ChatError> {
        if self.get(&turn.id).is_some() {
            return Err(ChatError::DuplicateTurn {
                id: turn.id.to_string(),
            });
        }
        if turn.status == TurnStatus::Streaming {
            if let Some(active) = self.streaming_turn() {
                return Err(ChatError::AlreadyStreaming {
                    id: active.id.to_string(),
                });
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Overwrite the content of `id`. Unknown ids and terminal assistant turns are left alone.
    pub fn replace_content(&mut self, id: &TurnId, content: String) {
        let Some(turn) = self.turns.iter_mut().find(|t| &t.id == id) else {
            tracing::trace!(turn = %id, "replace_content: unknown turn");
            return;
        };
        if turn.role == Role::Assistant && turn.status.is_terminal() {
            tracing::trace!(turn = %id, "replace_content: turn already terminal");
            return;
        }
        turn.content = content;
    }

    pub fn set_status(&mut self, id: &TurnId, status: TurnStatus) -> Result<(), ChatError> {
        if status == TurnStatus::Streaming {
            if let Some(active) = self.streaming_turn().filter(|t| &t.id != id) {
                return Err(ChatError::AlreadyStreaming {
                    id: active.id.to_string(),
                });
            }
        }
        let Some(turn) = self.turns.iter_mut().find(|t| &t.id == id) else {
            return Ok(());
        };
        if !turn.status.can_transition_to(status) {
            return Err(ChatError::InvalidTransition {
                id: id.to_string(),
                from: turn.status,
                to: status,
            });
        }
        turn.status = status;
        Ok(())
    }

    pub fn remove_last(&mut self) -> Result<Turn, ChatError> {
        self.turns.pop().ok_or(ChatError::EmptyLog)
    }

    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn view(&self) -> LogView {
        LogView {
            turns: self.turns.clone(),
            streaming: self.streaming_turn().map(|t| t.id.clone()),
        }
    }

    pub fn get(&self, id: &TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| &t.id == id)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn streaming_turn(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .find(|t| t.status == TurnStatus::Streaming)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
