// src/session/mod.rs — Session orchestrator: the `send` / `stop` entry points
//
// `send()` appends the user turn and an assistant turn, opens the answer
// stream under a fresh cancel token, hands it to the assembler, and finalizes
// the turn. At most one send is in flight; the log mutex is never held across
// an `.await`, it only makes the session shareable between tasks.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::cancel::{self, CancelController};
use crate::chat::{LogCommand, LogView, LogWriter, MessageLog, Turn, TurnId, TurnStatus};
use crate::infra::config::Config;
use crate::infra::errors::ChatError;
use crate::stream::{StreamAssembler, StreamEnd};
use crate::upstream::documents::DocumentSelection;
use crate::upstream::{AnswerSource, AskRequest, DocumentInfo};

/// Why a `send()` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyQuestion,
    Busy,
    /// Documents exist but none is selected.
    NoDocument,
}

#[derive(Debug)]
pub enum SendOutcome {
    Completed { turn: TurnId },
    Stopped { turn: TurnId },
    Failed { turn: TurnId, error: ChatError },
    Ignored(IgnoreReason),
}

impl SendOutcome {
    pub fn turn(&self) -> Option<&TurnId> {
        match self {
            SendOutcome::Completed { turn }
            | SendOutcome::Stopped { turn }
            | SendOutcome::Failed { turn, .. } => Some(turn),
            SendOutcome::Ignored(_) => None,
        }
    }
}

pub struct ChatSession {
    source: Arc<dyn AnswerSource>,
    assembler: StreamAssembler,
    cancel: CancelController,
    cancel_marker: String,
    log: Mutex<MessageLog>,
    documents: Mutex<DocumentSelection>,
    view_tx: watch::Sender<LogView>,
}

impl ChatSession {
    pub fn new(source: Arc<dyn AnswerSource>, config: &Config) -> Self {
        let log = if config.session.welcome.is_empty() {
            MessageLog::new()
        } else {
            MessageLog::with_welcome(&config.session.welcome)
        };
        let (view_tx, _) = watch::channel(log.view());
        Self {
            source,
            assembler: StreamAssembler::from_config(&config.stream),
            cancel: CancelController::new(),
            cancel_marker: config.stream.cancel_marker.clone(),
            log: Mutex::new(log),
            documents: Mutex::new(DocumentSelection::new()),
            view_tx,
        }
    }

    pub fn with_assembler(mut self, assembler: StreamAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    // ─── Entry points ───────────────────────────────────────────

    /// Ask `question` about the selected document and stream the answer into the log.
    pub async fn send(&self, question: &str) -> SendOutcome {
        if question.trim().is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyQuestion);
        }
        if self.cancel.is_active() {
            tracing::debug!("send ignored: answer already streaming");
            return SendOutcome::Ignored(IgnoreReason::Busy);
        }
        let document_id = {
            let docs = self.lock_documents();
            match docs.selected() {
                Some(id) => id.to_string(),
                None if docs.has_known() => {
                    return SendOutcome::Ignored(IgnoreReason::NoDocument);
                }
                None => String::new(),
            }
        };
        let Some(token) = self.cancel.begin() else {
            return SendOutcome::Ignored(IgnoreReason::Busy);
        };
        let mut guard = ActiveStream {
            session: self,
            turn: None,
        };

        let answer = Turn::assistant_pending();
        let turn_id = answer.id.clone();
        let opened = self
            .apply(LogCommand::Append(Turn::user(question)))
            .and_then(|_| self.apply(LogCommand::Append(answer)))
            .and_then(|_| {
                self.apply(LogCommand::SetStatus {
                    id: turn_id.clone(),
                    status: TurnStatus::Streaming,
                })
            });
        if let Err(error) = opened {
            tracing::error!(error = %error, "could not start answer turn");
            return SendOutcome::Failed {
                turn: turn_id,
                error,
            };
        }
        guard.turn = Some(turn_id.clone());

        tracing::info!(turn = %turn_id, document = %document_id, "asking question");
        let request = AskRequest {
            question: question.to_string(),
            document_id,
        };

        let end = tokio::select! {
            biased;
            _ = token.cancelled() => StreamEnd::failed_to_open(ChatError::Cancelled),
            opened = self.source.open(&request) => match opened {
                Ok(body) => self.assembler.run(body, &turn_id, &token, self).await,
                Err(error) => StreamEnd::failed_to_open(error),
            },
        };

        let finalized = cancel::finalize(self, &turn_id, end, &self.cancel_marker);
        guard.turn = None;
        drop(guard);

        match finalized {
            Ok(done) => match (done.status, done.error) {
                (TurnStatus::Complete, _) => SendOutcome::Completed { turn: done.turn },
                (TurnStatus::Aborted, _) => SendOutcome::Stopped { turn: done.turn },
                (_, error) => SendOutcome::Failed {
                    turn: done.turn,
                    error: error.unwrap_or_else(|| ChatError::Transport("stream failed".into())),
                },
            },
            Err(error) => {
                tracing::error!(turn = %turn_id, error = %error, "could not finalize answer turn");
                SendOutcome::Failed {
                    turn: turn_id,
                    error,
                }
            }
        }
    }

    /// Stop the in-flight answer, if any. Always safe to call.
    pub fn stop(&self) -> bool {
        self.cancel.stop()
    }

    /// Cloneable handle for stopping from another task (e.g. a Ctrl-C watcher).
    pub fn stop_handle(&self) -> CancelController {
        self.cancel.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.cancel.is_active()
    }

    // ─── Rendering ──────────────────────────────────────────────

    /// Receives a fresh view after every log mutation.
    pub fn subscribe(&self) -> watch::Receiver<LogView> {
        self.view_tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.lock_log().snapshot().to_vec()
    }

    pub fn view(&self) -> LogView {
        self.lock_log().view()
    }

    // ─── Documents ──────────────────────────────────────────────

    pub fn set_documents(&self, documents: Vec<DocumentInfo>) {
        self.lock_documents().set_known(documents);
    }

    pub fn select_document(&self, id: impl Into<String>) {
        self.lock_documents().select(id);
    }

    pub fn clear_document(&self) {
        self.lock_documents().clear_selection();
    }

    pub fn documents(&self) -> DocumentSelection {
        self.lock_documents().clone()
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, MessageLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_documents(&self) -> std::sync::MutexGuard<'_, DocumentSelection> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogWriter for ChatSession {
    fn apply(&self, cmd: LogCommand) -> Result<(), ChatError> {
        let view = {
            let mut log = self.lock_log();
            log.apply(cmd)?;
            log.view()
        };
        self.view_tx.send_replace(view);
        Ok(())
    }

    fn last_id(&self) -> Option<TurnId> {
        self.lock_log().last().map(|t| t.id.clone())
    }
}

/// Releases the cancel slot however `send()` exits. If the send future is
/// dropped mid-stream, the turn is closed as aborted so the log never keeps a
/// dangling `streaming` turn.
struct ActiveStream<'a> {
    session: &'a ChatSession,
    turn: Option<TurnId>,
}

impl Drop for ActiveStream<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.turn.take() {
            let partial = self
                .session
                .lock_log()
                .get(&id)
                .filter(|t| t.status == TurnStatus::Streaming)
                .map(|t| t.content.clone());
            if let Some(partial) = partial {
                tracing::warn!(turn = %id, "send dropped mid-stream; closing turn");
                let end = StreamEnd {
                    kind: crate::stream::EndKind::Cancelled,
                    emitted: partial,
                    bytes_read: 0,
                    flushes: 0,
                };
                if let Err(e) =
                    cancel::finalize(self.session, &id, end, &self.session.cancel_marker)
                {
                    tracing::warn!(turn = %id, error = %e, "could not close dropped turn");
                }
            }
        }
        self.session.cancel.finish();
    }
}
