// src/stream/assembler.rs — Turns a raw answer body into paced log updates
//
// Read loop: decode each chunk, append to the pending buffer, and flush the
// buffer into the target turn whenever the pacing policy allows. Residual text
// is always flushed before returning, so pacing only changes *when* text
// becomes visible, never *what* the final content is.
//
// Cancellation is cooperative: the token is checked between chunks and raced
// against the next read, but a chunk that has already arrived is fully decoded
// and buffered first.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::decoder::{Utf8Mode, Utf8StreamDecoder};
use super::pacing::PacingPolicy;
use crate::chat::{LogCommand, LogWriter, TurnId};
use crate::infra::config::StreamConfig;
use crate::infra::errors::ChatError;

/// How the read loop stopped.
#[derive(Debug)]
pub enum EndKind {
    /// The source reached end-of-stream.
    Finished,
    /// The cancel token fired before end-of-stream.
    Cancelled,
    /// A read or decode error.
    Failed(ChatError),
}

/// Result of one streaming run.
#[derive(Debug)]
pub struct StreamEnd {
    pub kind: EndKind,
    /// Everything written into the turn, in order.
    pub emitted: String,
    pub bytes_read: usize,
    pub flushes: usize,
}

impl StreamEnd {
    /// The stream never opened.
    pub fn failed_to_open(error: ChatError) -> Self {
        let kind = if error.is_cancellation() {
            EndKind::Cancelled
        } else {
            EndKind::Failed(error)
        };
        Self {
            kind,
            emitted: String::new(),
            bytes_read: 0,
            flushes: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_read == 0 && self.emitted.is_empty()
    }
}

/// Transient state for one assistant turn while its stream is live.
struct StreamSession<'a, W: LogWriter + ?Sized> {
    target: &'a TurnId,
    writer: &'a W,
    raw_buffer: String,
    assembled: String,
    last_emit: Instant,
    flushes: usize,
}

impl<W: LogWriter + ?Sized> StreamSession<'_, W> {
    /// Move the buffer into the turn. No-op when nothing is buffered.
    fn flush(&mut self) {
        if self.raw_buffer.is_empty() {
            return;
        }
        self.assembled.push_str(&self.raw_buffer);
        self.raw_buffer.clear();
        self.last_emit = Instant::now();
        self.flushes += 1;
        if let Err(e) = self.writer.apply(LogCommand::ReplaceContent {
            id: self.target.clone(),
            content: self.assembled.clone(),
        }) {
            tracing::warn!(turn = %self.target, error = %e, "flush rejected by log");
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamAssembler {
    policy: PacingPolicy,
    paint_pause: Duration,
    utf8: Utf8Mode,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl StreamAssembler {
    pub fn new(policy: PacingPolicy, paint_pause: Duration, utf8: Utf8Mode) -> Self {
        Self {
            policy,
            paint_pause,
            utf8,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            PacingPolicy::from_config(config),
            Duration::from_millis(config.paint_pause_ms),
            config.utf8,
        )
    }

    /// Stream `source` into `target` until end-of-stream, error, or cancellation.
    ///
    /// `source` is consumed and dropped before this returns, on every path.
    /// Terminal status is left to the caller; this only writes content.
    pub async fn run<S, B, W>(
        &self,
        source: S,
        target: &TurnId,
        cancel: &CancellationToken,
        writer: &W,
    ) -> StreamEnd
    where
        S: Stream<Item = Result<B, ChatError>>,
        B: AsRef<[u8]>,
        W: LogWriter + ?Sized,
    {
        let mut source = Box::pin(source);
        let mut decoder = Utf8StreamDecoder::new(self.utf8);
        let mut bytes_read = 0usize;
        let mut state = StreamSession {
            target,
            writer,
            raw_buffer: String::new(),
            assembled: String::new(),
            last_emit: Instant::now(),
            flushes: 0,
        };

        tracing::debug!(turn = %target, "assembling answer stream");

        let kind = loop {
            if cancel.is_cancelled() {
                break EndKind::Cancelled;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break EndKind::Cancelled,
                next = source.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => break EndKind::Failed(e),
                None => match decoder.finish() {
                    Ok(tail) => {
                        state.raw_buffer.push_str(&tail);
                        break EndKind::Finished;
                    }
                    Err(e) => break EndKind::Failed(e),
                },
            };

            let bytes = chunk.as_ref();
            bytes_read += bytes.len();
            match decoder.decode(bytes) {
                Ok(text) => state.raw_buffer.push_str(&text),
                Err(e) => break EndKind::Failed(e),
            }

            let elapsed = state.last_emit.elapsed();
            if self.policy.should_flush(&state.raw_buffer, elapsed) {
                tracing::trace!(
                    turn = %target,
                    reason = ?self.policy.break_in(&state.raw_buffer),
                    chars = state.raw_buffer.chars().count(),
                    "flush"
                );
                state.flush();
                self.pause().await;
            }
        };

        // Release the body (and its connection) before touching the log again.
        drop(source);

        // Whatever arrived is kept, even when the policy never allowed a flush.
        state.flush();

        match &kind {
            EndKind::Failed(e) => {
                tracing::debug!(turn = %target, bytes_read, error = %e, "answer stream failed")
            }
            other => tracing::debug!(
                turn = %target,
                bytes_read,
                flushes = state.flushes,
                end = ?other,
                "answer stream ended"
            ),
        }

        StreamEnd {
            kind,
            emitted: state.assembled,
            bytes_read,
            flushes: state.flushes,
        }
    }

    /// Give the renderer a chance to paint before reading on.
    async fn pause(&self) {
        if self.paint_pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.paint_pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MessageLog, Turn, TurnStatus};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records every command while applying it to a real log.
    #[derive(Default)]
    struct RecordingWriter {
        log: Mutex<MessageLog>,
        commands: Mutex<Vec<LogCommand>>,
    }

    impl RecordingWriter {
        fn with_streaming_turn() -> (Self, TurnId) {
            let writer = Self::default();
            let turn = Turn::assistant_pending();
            let id = turn.id.clone();
            writer.apply(LogCommand::Append(turn)).unwrap();
            writer
                .apply(LogCommand::SetStatus {
                    id: id.clone(),
                    status: TurnStatus::Streaming,
                })
                .unwrap();
            writer.commands.lock().unwrap().clear();
            (writer, id)
        }

        fn contents(&self) -> Vec<String> {
            self.commands
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    LogCommand::ReplaceContent { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .collect()
        }

        fn content_of(&self, id: &TurnId) -> String {
            self.log.lock().unwrap().get(id).unwrap().content.clone()
        }
    }

    impl LogWriter for RecordingWriter {
        fn apply(&self, cmd: LogCommand) -> Result<(), ChatError> {
            self.commands.lock().unwrap().push(cmd.clone());
            self.log.lock().unwrap().apply(cmd)
        }

        fn last_id(&self) -> Option<TurnId> {
            self.log.lock().unwrap().last().map(|t| t.id.clone())
        }
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, ChatError>> {
        let items: Vec<Result<Vec<u8>, ChatError>> = parts.iter().map(|p| Ok(p.to_vec())).collect();
        futures::stream::iter(items)
    }

    fn immediate(max_buffer_chars: usize) -> StreamAssembler {
        StreamAssembler::new(
            PacingPolicy::immediate(max_buffer_chars),
            Duration::ZERO,
            Utf8Mode::Strict,
        )
    }

    #[tokio::test]
    async fn test_cats_scenario_flushes_before_end() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let source = chunks(&[b"The doc", b"ument is ", b"about cats.\n"]);

        let end = immediate(15)
            .run(source, &id, &CancellationToken::new(), &writer)
            .await;

        assert!(matches!(end.kind, EndKind::Finished));
        assert_eq!(end.emitted, "The document is about cats.\n");
        assert_eq!(writer.content_of(&id), "The document is about cats.\n");
        assert_eq!(
            writer.contents(),
            vec![
                "The document is ".to_string(),
                "The document is about cats.\n".to_string()
            ]
        );
        assert_eq!(end.bytes_read, 28);
    }

    #[tokio::test]
    async fn test_residual_buffer_flushed_at_end() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let end = StreamAssembler::default()
            .run(chunks(&[b"no", b"break"]), &id, &CancellationToken::new(), &writer)
            .await;
        assert!(matches!(end.kind, EndKind::Finished));
        assert_eq!(writer.contents(), vec!["nobreak".to_string()]);
        assert_eq!(end.flushes, 1);
    }

    #[tokio::test]
    async fn test_completeness_across_chunkings() {
        let text = "Cats 🐈 purr. Ünïcödé text\nwith a verylongunbrokenwordthatexceedstheceiling and more.";
        let bytes = text.as_bytes();
        for size in [1usize, 2, 3, 5, 7, 64] {
            let (writer, id) = RecordingWriter::with_streaming_turn();
            let parts: Vec<&[u8]> = bytes.chunks(size).collect();
            let end = immediate(8)
                .run(chunks(&parts), &id, &CancellationToken::new(), &writer)
                .await;
            assert_eq!(end.emitted, text, "chunk size {size}");
            assert_eq!(writer.content_of(&id), text, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn test_updates_grow_monotonically() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let text = "One. Two three four five six seven.\nEight nine ten.";
        let parts: Vec<&[u8]> = text.as_bytes().chunks(3).collect();
        immediate(6)
            .run(chunks(&parts), &id, &CancellationToken::new(), &writer)
            .await;

        let contents = writer.contents();
        assert!(contents.len() > 2);
        for pair in contents.windows(2) {
            assert!(pair[1].len() > pair[0].len());
            assert!(pair[1].starts_with(&pair[0]));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_gate_holds_back_fast_chunks() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let assembler = StreamAssembler::new(
            PacingPolicy {
                min_interval: Duration::from_millis(30),
                max_buffer_chars: 15,
            },
            Duration::ZERO,
            Utf8Mode::Lossy,
        );
        let source = async_stream::stream! {
            // arrives before the interval has passed: held back
            yield Ok::<_, ChatError>(b"Hello ".to_vec());
            tokio::time::sleep(Duration::from_millis(40)).await;
            yield Ok(b"world. ".to_vec());
            yield Ok(b"Bye ".to_vec());
        };

        let end = assembler
            .run(source, &id, &CancellationToken::new(), &writer)
            .await;

        assert_eq!(
            writer.contents(),
            vec!["Hello world. ".to_string(), "Hello world. Bye ".to_string()]
        );
        assert_eq!(end.flushes, 2);
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial_text() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let source = futures::stream::iter(vec![
            Ok(b"Partial answer ".to_vec()),
            Ok(b"tail".to_vec()),
            Err(ChatError::Transport("connection reset".into())),
            Ok(b"never read".to_vec()),
        ]);
        let end = immediate(50)
            .run(source, &id, &CancellationToken::new(), &writer)
            .await;

        assert!(matches!(end.kind, EndKind::Failed(ChatError::Transport(_))));
        assert_eq!(end.emitted, "Partial answer tail");
        assert_eq!(writer.content_of(&id), "Partial answer tail");
    }

    #[tokio::test]
    async fn test_strict_decode_error() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let end = immediate(50)
            .run(chunks(&[b"ok ", b"\xFF"]), &id, &CancellationToken::new(), &writer)
            .await;
        assert!(matches!(end.kind, EndKind::Failed(ChatError::Decode { offset: 3 })));
        assert_eq!(end.emitted, "ok ");
    }

    #[tokio::test]
    async fn test_cancelled_before_first_read() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let token = CancellationToken::new();
        token.cancel();
        let end = immediate(15)
            .run(chunks(&[b"ignored. "]), &id, &token, &writer)
            .await;
        assert!(matches!(end.kind, EndKind::Cancelled));
        assert!(end.is_empty());
        assert!(writer.contents().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_releases_source() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Vec<u8>, ChatError>>();
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let writer = std::sync::Arc::new(writer);
        let token = CancellationToken::new();

        let task = {
            let writer = writer.clone();
            let token = token.clone();
            let id = id.clone();
            tokio::spawn(async move { immediate(5).run(rx, &id, &token, writer.as_ref()).await })
        };

        tx.unbounded_send(Ok(b"The doc".to_vec())).unwrap();
        while writer.contents().is_empty() {
            tokio::task::yield_now().await;
        }
        token.cancel();

        let end = task.await.unwrap();
        assert!(matches!(end.kind, EndKind::Cancelled));
        assert_eq!(end.emitted, "The doc");
        assert!(tx.is_closed(), "source should be dropped on cancel");
    }

    #[tokio::test]
    async fn test_cancel_flushes_residual_buffer() {
        let (writer, id) = RecordingWriter::with_streaming_turn();
        let token = CancellationToken::new();
        // nothing short of end-of-stream or cancel can flush under this policy
        let held = StreamAssembler::new(
            PacingPolicy {
                min_interval: Duration::from_secs(3600),
                max_buffer_chars: 1000,
            },
            Duration::ZERO,
            Utf8Mode::Lossy,
        );
        let stopper = token.clone();
        let source = async_stream::stream! {
            yield Ok::<_, ChatError>(b"The doc".to_vec());
            stopper.cancel();
            futures::future::pending::<()>().await;
        };

        let end = held.run(source, &id, &token, &writer).await;
        assert!(matches!(end.kind, EndKind::Cancelled));
        assert_eq!(end.emitted, "The doc");
        assert_eq!(end.flushes, 1);
        assert_eq!(writer.contents(), vec!["The doc".to_string()]);

        let done = crate::cancel::finalize(&writer, &id, end, "\n\n_Generation stopped_").unwrap();
        assert_eq!(done.status, TurnStatus::Aborted);
        assert_eq!(writer.content_of(&id), "The doc\n\n_Generation stopped_");
    }

    #[test]
    fn test_failed_to_open_maps_cancellation() {
        let end = StreamEnd::failed_to_open(ChatError::Cancelled);
        assert!(matches!(end.kind, EndKind::Cancelled));
        let end = StreamEnd::failed_to_open(ChatError::NotFound);
        assert!(matches!(end.kind, EndKind::Failed(ChatError::NotFound)));
        assert!(end.is_empty());
    }
}
