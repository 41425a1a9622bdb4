//! Cancellable snapshot streams.
//!
//! A [`Subscription`] wraps the engine's snapshot stream. Cancelling it (or
//! dropping it) drops the inner stream, which releases the underlying bus
//! listener. Cancellation is idempotent, and a snapshot that completes after
//! cancellation is dropped instead of delivered. A subscription whose inner
//! stream ends counts as released and keeps returning `None`.

use crate::error::SyncError;
use futures::task::AtomicWaker;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tracing::debug;

/// A full view of a collection at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// 1-based position of this snapshot within its subscription.
    pub seq: u64,
    pub items: Vec<T>,
}

impl<T> Snapshot<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub type SnapshotStream<T> = Pin<Box<dyn Stream<Item = Result<Snapshot<T>, SyncError>> + Send>>;

/// Type-erased release handle, kept by the engine's registry.
pub(crate) trait Release: Send + Sync {
    fn release(&self);
}

struct Shared<T> {
    released: AtomicBool,
    waker: AtomicWaker,
    stream: Mutex<Option<SnapshotStream<T>>>,
}

impl<T> Release for Shared<T> {
    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let stream = self
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(stream);
        self.waker.wake();
        debug!("subscription released");
    }
}

pub struct Subscription<T> {
    shared: Arc<Shared<T>>,
}

impl<T: 'static> Subscription<T> {
    pub(crate) fn new(stream: SnapshotStream<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                released: AtomicBool::new(false),
                waker: AtomicWaker::new(),
                stream: Mutex::new(Some(stream)),
            }),
        }
    }

    pub(crate) fn handle(&self) -> Arc<dyn Release> {
        self.shared.clone()
    }
}

impl<T> Subscription<T> {
    /// Stop delivery and release the listener. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.shared.release();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.released.load(Ordering::Acquire)
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<Snapshot<T>, SyncError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let shared = &self.shared;
        if shared.released.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        shared.waker.register(cx.waker());

        let mut guard = shared.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stream) = guard.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = stream.as_mut().poll_next(cx);
        if let Poll::Ready(None) = polled {
            // The inner stream must not be polled again once finished.
            *guard = None;
            shared.released.store(true, Ordering::Release);
            debug!("subscription ended");
        }
        drop(guard);

        match polled {
            // Released while the snapshot was being produced.
            Poll::Ready(Some(_)) if shared.released.load(Ordering::Acquire) => Poll::Ready(None),
            other => other,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.shared.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};
    use std::time::Duration;

    fn snapshot(seq: u64) -> Result<Snapshot<u32>, SyncError> {
        Ok(Snapshot {
            seq,
            items: vec![seq as u32],
        })
    }

    #[tokio::test]
    async fn delivers_until_cancelled() {
        let mut sub = Subscription::new(stream::iter(vec![snapshot(1), snapshot(2)]).boxed());
        assert_eq!(sub.next().await.unwrap().unwrap().seq, 1);

        sub.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_wakes_pending_consumer() {
        let sub = Subscription::new(stream::pending::<Result<Snapshot<u32>, SyncError>>().boxed());
        let handle = sub.handle();

        let waiter = tokio::spawn(async move {
            let mut sub = sub;
            sub.next().await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.release();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("consumer should be woken")
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cancel_releases_inner_stream() {
        struct Tracked(Arc<AtomicBool>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let tracked = Tracked(dropped.clone());
        let inner = stream::pending::<Result<Snapshot<u32>, SyncError>>()
            .map(move |item| {
                let _keep = &tracked;
                item
            })
            .boxed();

        let sub = Subscription::new(inner);
        assert!(!dropped.load(Ordering::SeqCst));
        sub.cancel();
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn ended_stream_stays_ended() {
        let mut sub = Subscription::new(stream::iter(vec![snapshot(1)]).boxed());
        assert_eq!(sub.next().await.unwrap().unwrap().seq, 1);
        assert!(!sub.is_cancelled());

        assert!(sub.next().await.is_none());
        assert!(sub.is_cancelled());
        assert!(sub.next().await.is_none());
        sub.cancel();
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn snapshot_len() {
        let s = Snapshot::<u8> {
            seq: 1,
            items: vec![],
        };
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
    }
}
