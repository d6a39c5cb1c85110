//! Bounded multi-consumer queue over a tokio mpsc channel.
//!
//! Producers clone the `Sender`; consumers share one receiver behind a
//! mutex. The queue closes once every sender is dropped, which is how a
//! stage tells the next one that its input is exhausted.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub fn bounded<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, SharedReceiver::new(rx))
}

#[derive(Debug)]
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Next item, or `None` once the queue is closed and drained.
    /// Cancel safe.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }

    /// For consumers on blocking threads. Must not be called from async code.
    pub fn blocking_recv(&self) -> Option<T> {
        self.inner.blocking_lock().blocking_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_each_item_delivered_once_then_closed() {
        let (tx, rx) = bounded::<u32>(4);
        let mut consumers = tokio::task::JoinSet::new();
        for _ in 0..3 {
            let rx = rx.clone();
            consumers.spawn(async move {
                let mut seen = Vec::new();
                while let Some(v) = rx.recv().await {
                    seen.push(v);
                }
                seen
            });
        }
        for v in 0..100 {
            tx.send(v).await.unwrap();
        }
        drop(tx);

        let mut all = Vec::new();
        while let Some(seen) = consumers.join_next().await {
            all.extend(seen.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_blocking_consumer() {
        let (tx, rx) = bounded::<u32>(2);
        let consumer = tokio::task::spawn_blocking(move || {
            let mut n = 0;
            while rx.blocking_recv().is_some() {
                n += 1;
            }
            n
        });
        for v in 0..10 {
            tx.send(v).await.unwrap();
        }
        drop(tx);
        assert_eq!(consumer.await.unwrap(), 10);
    }
}
