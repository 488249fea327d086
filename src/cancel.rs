// src/cancel.rs — Cancellation controller and terminal-state finalization
//
// One slot holds the token of the active answer stream. `stop()` only signals
// the token; the slot is cleared by the session once the turn is terminal, so a
// new `send()` cannot overlap the one being stopped.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::chat::{LogCommand, LogWriter, Turn, TurnId, TurnStatus};
use crate::infra::errors::ChatError;
use crate::stream::{EndKind, StreamEnd};

#[derive(Debug, Clone, Default)]
pub struct CancelController {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl CancelController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new stream. `None` while another stream is active.
    pub fn begin(&self) -> Option<CancellationToken> {
        let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(token)
    }

    /// Signal the active stream. Returns false when there was nothing to stop.
    pub fn stop(&self) -> bool {
        let slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(token) if !token.is_cancelled() => {
                tracing::info!("stop requested");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Release the slot once the stream's turn is terminal.
    pub fn finish(&self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Terminal state written for one answer.
#[derive(Debug)]
pub struct Finalized {
    /// The terminal assistant turn. Differs from the streamed turn when a
    /// pre-stream failure replaced it with an error turn.
    pub turn: TurnId,
    pub status: TurnStatus,
    pub error: Option<ChatError>,
}

/// Write the terminal state for `target` according to how its stream ended.
///
/// - finished: `complete`
/// - cancelled: emitted text + `cancel_marker`, `aborted`
/// - failed with nothing received: the turn is replaced by a new error turn
/// - failed mid-stream: `errored` in place, partial text kept
pub fn finalize<W: LogWriter + ?Sized>(
    writer: &W,
    target: &TurnId,
    end: StreamEnd,
    cancel_marker: &str,
) -> Result<Finalized, ChatError> {
    let set_status = |status| {
        writer.apply(LogCommand::SetStatus {
            id: target.clone(),
            status,
        })
    };

    let nothing_received = end.is_empty();
    match end.kind {
        EndKind::Finished => {
            set_status(TurnStatus::Complete)?;
            Ok(Finalized {
                turn: target.clone(),
                status: TurnStatus::Complete,
                error: None,
            })
        }
        EndKind::Cancelled => {
            tracing::info!(turn = %target, chars = end.emitted.len(), "Generation stopped");
            writer.apply(LogCommand::ReplaceContent {
                id: target.clone(),
                content: format!("{}{}", end.emitted, cancel_marker),
            })?;
            set_status(TurnStatus::Aborted)?;
            Ok(Finalized {
                turn: target.clone(),
                status: TurnStatus::Aborted,
                error: None,
            })
        }
        EndKind::Failed(error) if nothing_received && writer.last_id().as_ref() == Some(target) => {
            tracing::error!(turn = %target, error = %error, "answer failed before any text arrived");
            writer.apply(LogCommand::RemoveLast)?;
            let replacement = Turn::error(&error.user_message());
            let id = replacement.id.clone();
            writer.apply(LogCommand::Append(replacement))?;
            Ok(Finalized {
                turn: id,
                status: TurnStatus::Errored,
                error: Some(error),
            })
        }
        EndKind::Failed(error) => {
            tracing::error!(turn = %target, error = %error, "answer stream failed");
            set_status(TurnStatus::Errored)?;
            Ok(Finalized {
                turn: target.clone(),
                status: TurnStatus::Errored,
                error: Some(error),
            })
        }
    }
}
