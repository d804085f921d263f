use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

/// Inbound audio queue between the receive and playback pipelines.
///
/// Unbounded FIFO with one extra operation over a plain channel: the receive
/// pipeline can drain everything still buffered when the remote signals a new
/// turn, so interrupted answers stop playing immediately.
pub(crate) struct PlaybackQueue {
    inner: Mutex<VecDeque<Bytes>>,
    notify: Notify,
}

impl PlaybackQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub(crate) async fn push(&self, pcm: Bytes) {
        self.inner.lock().await.push_back(pcm);
        self.notify.notify_one();
    }

    /// Pop the oldest chunk, waiting until one is available.
    pub(crate) async fn pop(&self) -> Bytes {
        loop {
            let notified = self.notify.notified();
            if let Some(pcm) = self.inner.lock().await.pop_front() {
                return pcm;
            }
            notified.await;
        }
    }

    /// Discard everything buffered; returns how many chunks were dropped.
    pub(crate) async fn drain(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let discarded = guard.len();
        guard.clear();
        discarded
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn pop_preserves_fifo_order() {
        let queue = PlaybackQueue::new();
        queue.push(Bytes::from_static(b"one")).await;
        queue.push(Bytes::from_static(b"two")).await;

        assert_eq!(queue.pop().await, Bytes::from_static(b"one"));
        assert_eq!(queue.pop().await, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn drain_empties_all_buffered_chunks() {
        let queue = PlaybackQueue::new();
        for _ in 0..7 {
            queue.push(Bytes::from_static(b"pcm")).await;
        }

        assert_eq!(queue.drain().await, 7);
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn drain_on_empty_queue_is_zero() {
        let queue = PlaybackQueue::new();
        assert_eq!(queue.drain().await, 0);
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = std::sync::Arc::new(PlaybackQueue::new());
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::task::yield_now().await;
        queue.push(Bytes::from_static(b"late")).await;

        let popped = timeout(Duration::from_secs(1), popper)
            .await
            .expect("pop completes")
            .expect("task succeeds");
        assert_eq!(popped, Bytes::from_static(b"late"));
    }
}
