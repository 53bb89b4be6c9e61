use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Wraps a response stream and cancels `token` when the stream is
/// dropped, i.e. when the client disconnects or the response finishes.
pub struct DetectDisconnect<S> {
    inner: S,
    _guard: DropGuard,
}

impl<S> DetectDisconnect<S> {
    pub fn new(inner: S, token: CancellationToken) -> Self {
        Self {
            inner,
            _guard: token.drop_guard(),
        }
    }
}

impl<S: Stream + Unpin> Stream for DetectDisconnect<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
