//! Completion queue between node tasks and the dispatch loop.
//!
//! Every dispatched node gets a [`CompletionSender`]; the dispatch loop
//! owns the [`CompletionQueue`] and reacts to results as they arrive, so
//! it never blocks on a particular node. The queue tracks outstanding
//! senders plus undelivered items, which lets the loop tell "nothing left
//! in flight" apart from "waiting for a slow node".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::QueueError;

/// Receiving side, owned by a single dispatch loop.
#[derive(Debug)]
pub struct CompletionQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: mpsc::UnboundedReceiver<T>,
    pending: Arc<AtomicUsize>,
}

/// One-shot sending side handed to a single node task.
#[derive(Debug)]
pub struct CompletionSender<T> {
    tx: mpsc::UnboundedSender<T>,
    pending: Arc<AtomicUsize>,
    sent: bool,
}

impl<T> CompletionQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register one more in-flight task and return its sender.
    pub fn sender(&self) -> CompletionSender<T> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        CompletionSender {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
            sent: false,
        }
    }

    /// Number of tasks that have not reported yet plus results not yet taken.
    pub fn in_flight(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Wait for the next completion.
    ///
    /// The queue keeps its own sender alive, so this pends forever when
    /// nothing is in flight; guard it with [`CompletionQueue::is_idle`].
    pub async fn next(&mut self) -> Option<T> {
        let item = self.rx.recv().await;
        if item.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        item
    }
}

impl<T> Default for CompletionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionSender<T> {
    /// Deliver the task's result.
    pub fn complete(mut self, item: T) -> Result<(), QueueError> {
        self.sent = true;
        self.tx.send(item).map_err(|_| {
            // Nobody will ever receive it, so it no longer counts as pending.
            self.pending.fetch_sub(1, Ordering::SeqCst);
            QueueError::ReceiverDropped
        })
    }
}

impl<T> Drop for CompletionSender<T> {
    fn drop(&mut self) {
        if !self.sent {
            warn!("completion sender dropped without reporting a result");
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_outstanding_work_until_received() {
        let mut queue = CompletionQueue::new();
        assert!(queue.is_idle());

        let a = queue.sender();
        let b = queue.sender();
        assert_eq!(queue.in_flight(), 2);

        a.complete("a").unwrap();
        // Delivered but not yet taken: still counted.
        assert_eq!(queue.in_flight(), 2);
        assert_eq!(queue.next().await, Some("a"));
        assert_eq!(queue.in_flight(), 1);

        tokio::spawn(async move { b.complete("b").unwrap() });
        assert_eq!(queue.next().await, Some("b"));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn dropped_sender_releases_its_slot() {
        let queue: CompletionQueue<u32> = CompletionQueue::new();
        let sender = queue.sender();
        assert_eq!(queue.in_flight(), 1);
        drop(sender);
        assert!(queue.is_idle());
    }
}
