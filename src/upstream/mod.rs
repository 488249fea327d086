// src/upstream/mod.rs — The question-answering service, seen from the client

pub mod body;
pub mod documents;
pub mod http;
pub mod types;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::infra::errors::ChatError;
pub use types::{AskRequest, DocumentInfo};

/// Raw answer body: byte chunks until end-of-stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatError>> + Send>>;

/// Anything that can open an answer stream for a question.
///
/// Implementations must report a missing document as `ChatError::NotFound`
/// and any other non-success response as `ChatError::Http`, distinct from
/// `ChatError::Transport` when the service cannot be reached at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn open(&self, request: &AskRequest) -> Result<ByteStream, ChatError>;
}
