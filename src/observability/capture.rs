//! Bounded body previews for request/response logging.
//!
//! # Responsibilities
//! - Mirror body bytes to the real consumer unchanged
//! - Keep a copy of at most `limit` bytes and flag truncation
//! - Report the preview exactly once when the stream completes
//!
//! # Design Decisions
//! - Request bodies are read fully up front and replayed; gateway requests
//!   are small JSON-RPC payloads. A read that fails part way is replayed
//!   too: the bytes that arrived, then the same error, so the upstream
//!   call fails exactly as it would with previews off.
//! - Response bodies are wrapped live and never buffered beyond `limit`.
//! - Completion is end-of-stream, a stream error, or drop, whichever comes
//!   first. A one-shot guard (`Option::take`) makes later triggers no-ops.
//! - With previews disabled nothing here is constructed.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;

/// Preview capacity per body.
pub const PREVIEW_LIMIT: usize = 16 * 1024;

/// Whether body previews are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    #[default]
    Disabled,
    Enabled { limit: usize },
}

impl PreviewMode {
    /// `Enabled` with the default capacity when `enabled` is true.
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            PreviewMode::Enabled {
                limit: PREVIEW_LIMIT,
            }
        } else {
            PreviewMode::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PreviewMode::Enabled { .. })
    }
}

/// Trimmed preview text plus whether bytes were dropped from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub text: String,
    pub truncated: bool,
}

/// Size-capped byte accumulator.
#[derive(Debug)]
pub struct PreviewBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl PreviewBuffer {
    /// The buffer grows on demand; nothing is allocated until bytes arrive.
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Copy as much of `chunk` as still fits.
    pub fn record(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let remaining = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > remaining {
            self.bytes.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn preview(&self) -> Preview {
        Preview {
            text: String::from_utf8_lossy(&self.bytes).trim().to_string(),
            truncated: self.truncated,
        }
    }
}

/// A request body that has been read for its preview.
pub struct CapturedRequest {
    /// Replacement for the consumed original.
    pub body: Body,
    pub preview: Preview,
    /// Why reading stopped early, if it did.
    pub failure: Option<String>,
}

/// Read a request body to its end and return a replay of it with a preview.
///
/// Reading never fails the request: on a client-side body error the
/// returned body yields the bytes received so far and then that error.
pub async fn capture_request(mut body: Body, limit: usize) -> CapturedRequest {
    let mut received = BytesMut::new();
    let mut buffer = PreviewBuffer::new(limit);

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    buffer.record(data);
                    received.extend_from_slice(data);
                }
            }
            Some(Err(e)) => {
                let failure = e.to_string();
                return CapturedRequest {
                    body: Body::new(ReplayBody {
                        data: Some(received.freeze()),
                        error: Some(e),
                    }),
                    preview: buffer.preview(),
                    failure: Some(failure),
                };
            }
            None => break,
        }
    }

    CapturedRequest {
        body: Body::from(received.freeze()),
        preview: buffer.preview(),
        failure: None,
    }
}

/// Already-read bytes followed by the error that cut the read short.
struct ReplayBody {
    data: Option<Bytes>,
    error: Option<axum::Error>,
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if let Some(data) = self.data.take().filter(|d| !d.is_empty()) {
            return Poll::Ready(Some(Ok(Frame::data(data))));
        }
        Poll::Ready(self.error.take().map(Err))
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

type OnComplete = Box<dyn FnOnce(Preview) + Send + 'static>;

/// Body decorator that records a bounded preview while streaming through.
pub struct CaptureBody<B> {
    inner: B,
    buffer: PreviewBuffer,
    on_complete: Option<OnComplete>,
}

impl<B> CaptureBody<B> {
    pub fn new<F>(inner: B, limit: usize, on_complete: F) -> Self
    where
        F: FnOnce(Preview) + Send + 'static,
    {
        Self {
            inner,
            buffer: PreviewBuffer::new(limit),
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// Fire `on_complete` when `inner` finishes, keeping none of its bytes.
    pub fn completion<F>(inner: B, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(inner, 0, move |_| on_complete())
    }

    /// Fire the completion callback if it has not fired yet.
    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(self.buffer.preview());
        }
    }
}

impl<B> HttpBody for CaptureBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.buffer.record(data);
                }
                if this.inner.is_end_stream() {
                    this.complete();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(captured = this.buffer.len(), "Body stream failed");
                this.complete();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for CaptureBody<B> {
    fn drop(&mut self) {
        self.complete();
    }
}
