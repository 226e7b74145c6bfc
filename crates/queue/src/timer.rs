//! Scheduler-owned timer wheel.
//!
//! Retry back-off and `delay` wake-ups are entries here rather than
//! sleeps inside node tasks: a waiting branch holds no worker slot, and
//! cancelling an execution simply drops its wheel.

use std::future::poll_fn;
use std::task::{ready, Poll};
use std::time::Duration;

use tokio_util::time::DelayQueue;

/// Longest single arming of an entry. `DelayQueue` rejects timeouts past
/// its horizon (a little over two years), so longer waits are armed in
/// slices of this size and re-armed as each slice expires.
pub const MAX_SLICE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug)]
struct Entry<T> {
    item: T,
    /// Time still to wait once the current slice expires.
    remaining: Duration,
}

#[derive(Debug)]
pub struct TimerWheel<T> {
    queue: DelayQueue<Entry<T>>,
}

impl<T> TimerWheel<T> {
    pub fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
        }
    }

    /// Fire `item` after `delay`. Any delay is accepted.
    pub fn schedule(&mut self, item: T, delay: Duration) {
        let slice = delay.min(MAX_SLICE);
        self.queue.insert(
            Entry {
                item,
                remaining: delay - slice,
            },
            slice,
        );
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every pending entry.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Wait for the next expired entry. Returns `None` immediately when the
    /// wheel is empty, so guard it with [`TimerWheel::is_empty`] inside
    /// `select!`.
    pub async fn next_expired(&mut self) -> Option<T> {
        poll_fn(|cx| loop {
            let Some(expired) = ready!(self.queue.poll_expired(cx)) else {
                return Poll::Ready(None);
            };
            let Entry { item, remaining } = expired.into_inner();
            if remaining.is_zero() {
                return Poll::Ready(Some(item));
            }
            self.schedule(item, remaining);
        })
        .await
    }
}

impl<T> Default for TimerWheel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_fire_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        wheel.schedule("slow", Duration::from_secs(5));
        wheel.schedule("fast", Duration::from_millis(10));
        assert_eq!(wheel.len(), 2);

        assert_eq!(wheel.next_expired().await, Some("fast"));
        assert_eq!(wheel.next_expired().await, Some("slow"));
        assert!(wheel.is_empty());
        assert_eq!(wheel.next_expired().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_discards_pending_entries() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(1u8, Duration::from_secs(1));
        wheel.clear();
        assert!(wheel.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_past_the_horizon_are_rearmed() {
        let mut wheel = TimerWheel::new();
        let three_years = MAX_SLICE * 3;
        let start = tokio::time::Instant::now();
        wheel.schedule("far", three_years);
        wheel.schedule("near", Duration::from_secs(1));

        assert_eq!(wheel.next_expired().await, Some("near"));
        assert_eq!(wheel.len(), 1);
        assert_eq!(wheel.next_expired().await, Some("far"));
        assert!(start.elapsed() >= three_years);
        assert!(wheel.is_empty());
    }
}
