// src/upstream/body.rs — Response body wrapper that owns the open connection
//
// Dropping a `BodyStream` drops the underlying response body, which releases
// the connection. This happens on every exit path of the assembler because the
// stream is moved into it.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project::{pin_project, pinned_drop};

use crate::infra::errors::ChatError;

#[pin_project(PinnedDrop)]
pub struct BodyStream<S> {
    #[pin]
    inner: S,
    bytes_read: usize,
    finished: bool,
}

impl<S> BodyStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            bytes_read: 0,
            finished: false,
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}

impl<S, B, E> Stream for BodyStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
{
    type Item = Result<Vec<u8>, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match futures::ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                let bytes = chunk.as_ref();
                *this.bytes_read += bytes.len();
                Poll::Ready(Some(Ok(bytes.to_vec())))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e.into()))),
            None => {
                *this.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

#[pinned_drop]
impl<S> PinnedDrop for BodyStream<S> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if *this.finished {
            tracing::debug!(bytes = *this.bytes_read, "answer body released");
        } else {
            tracing::debug!(
                bytes = *this.bytes_read,
                "answer body released before end of stream"
            );
        }
    }
}
