//! In-memory channel implementation.

use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::Channel;
use crate::domain::{TaskId, TaskInvocation};
use crate::error::EngineError;

/// Delayed entry for the scheduled heap.
///
/// Reverse ordering so `BinaryHeap` acts as a min-heap (earliest due first).
#[derive(Debug)]
struct Scheduled {
    due_at: Instant,
    task_id: TaskId,
    invocation: TaskInvocation,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.task_id == other.task_id
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier due times have higher priority.
        other
            .due_at
            .cmp(&self.due_at)
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

struct ChannelState {
    ready: VecDeque<TaskInvocation>,
    scheduled: BinaryHeap<Scheduled>,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
        }
    }

    /// Move due entries from scheduled to ready.
    fn promote_due(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.due_at > now {
                break; // heap is sorted, nothing further is due
            }
            let entry = self.scheduled.pop().expect("peeked entry exists");
            self.ready.push_back(entry.invocation);
        }
    }
}

/// In-memory FIFO channel with delayed-dispatch support.
pub struct InMemoryChannel {
    state: Mutex<ChannelState>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn enqueue(&self, invocation: TaskInvocation) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::ChannelClosed);
        }
        {
            let mut state = self.state.lock().await;
            state.ready.push_back(invocation);
        }
        // Notify outside the lock; a permit is stored if no worker is waiting.
        self.notify.notify_one();
        Ok(())
    }

    async fn enqueue_after(
        &self,
        invocation: TaskInvocation,
        delay: Duration,
    ) -> Result<(), EngineError> {
        if delay.is_zero() {
            return self.enqueue(invocation).await;
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::ChannelClosed);
        }
        {
            let mut state = self.state.lock().await;
            state.scheduled.push(Scheduled {
                due_at: Instant::now() + delay,
                task_id: invocation.task_id,
                invocation,
            });
        }
        // Wake a waiter so it re-arms its sleep against the new due time.
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Option<TaskInvocation> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_due();

                if let Some(invocation) = state.ready.pop_front() {
                    if !state.ready.is_empty() {
                        // More work queued: wake a sibling worker.
                        self.notify.notify_one();
                    }
                    return Some(invocation);
                }

                state.scheduled.peek().map(|entry| entry.due_at)
            };

            // Register interest before re-checking the closed flag, so a
            // close() between the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            if let Some(wake_at) = next_wake {
                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep_until(wake_at) => {}
                }
            } else {
                notified.await;
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskSpec;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn invocation(name: &str) -> TaskInvocation {
        TaskInvocation::new(TaskId::generate(), TaskSpec::new(name, vec![json!(1)]))
    }

    #[tokio::test]
    async fn enqueue_dequeue_roundtrip() {
        let channel = InMemoryChannel::new();
        let inv = invocation("test");
        let id = inv.task_id;

        channel.enqueue(inv).await.unwrap();

        let out = tokio::time::timeout(Duration::from_millis(100), channel.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.task_id, id);
    }

    #[tokio::test]
    async fn dequeue_preserves_fifo_order() {
        let channel = InMemoryChannel::new();
        let first = invocation("first");
        let second = invocation("second");
        let (id1, id2) = (first.task_id, second.task_id);

        channel.enqueue(first).await.unwrap();
        channel.enqueue(second).await.unwrap();

        assert_eq!(channel.dequeue().await.unwrap().task_id, id1);
        assert_eq!(channel.dequeue().await.unwrap().task_id, id2);
    }

    #[tokio::test]
    async fn delayed_enqueue_is_not_visible_before_due() {
        let channel = InMemoryChannel::new();
        let inv = invocation("later");
        let id = inv.task_id;

        channel
            .enqueue_after(inv, Duration::from_millis(80))
            .await
            .unwrap();

        let early = tokio::time::timeout(Duration::from_millis(20), channel.dequeue()).await;
        assert!(early.is_err(), "message delivered before its due time");

        let out = tokio::time::timeout(Duration::from_millis(500), channel.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.task_id, id);
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_dequeue() {
        let channel = Arc::new(InMemoryChannel::new());

        let waiter = tokio::spawn({
            let channel = Arc::clone(&channel);
            async move { channel.dequeue().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let inv = invocation("wake");
        let id = inv.task_id;
        channel.enqueue(inv).await.unwrap();

        let out = waiter.await.unwrap().unwrap();
        assert_eq!(out.task_id, id);
    }

    #[tokio::test]
    async fn close_unblocks_dequeue_with_none() {
        let channel = Arc::new(InMemoryChannel::new());

        let waiter = tokio::spawn({
            let channel = Arc::clone(&channel);
            async move { channel.dequeue().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.close();

        let out = tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn enqueue_after_close_fails() {
        let channel = InMemoryChannel::new();
        channel.close();

        let err = channel.enqueue(invocation("late")).await.unwrap_err();
        assert!(matches!(err, EngineError::ChannelClosed));
    }
}
