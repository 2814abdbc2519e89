//! A FIFO queue with cooperative wake-up built on a `tokio::sync::Notify`
//! rather than a condition variable.
//!
//! The mutex protecting the buffer is never held across an `.await`: `pop`
//! checks `len() > 0` before waiting on `notify`, so a push that races a
//! concurrent `pop` is never lost — either the length check already sees
//! the item, or `Notify` banks the permit for the next `notified().await`.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::cancellation::CancellationToken;
use crate::error::TransportError;

#[derive(Debug)]
pub struct Queue<T> {
    buffer: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.buffer.lock().push_back(item);
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    /// Wait for and remove the head of the queue, or return a cancellation
    /// error if `cancel` fires first.
    pub async fn pop(&self, cancel: &CancellationToken) -> Result<T, TransportError> {
        loop {
            if let Some(item) = self.buffer.lock().pop_front() {
                return Ok(item);
            }
            tokio::select! {
                () = self.notify.notified() => continue,
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pop_returns_pushed_items_in_order() {
        let q: Queue<i32> = Queue::new();
        q.push(1);
        q.push(2);
        let cancel = CancellationToken::new();
        assert_eq!(q.pop(&cancel).await.unwrap(), 1);
        assert_eq!(q.pop(&cancel).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn pop_wakes_on_concurrent_push() {
        let q = std::sync::Arc::new(Queue::<i32>::new());
        let cancel = CancellationToken::new();
        let q2 = q.clone();
        let handle = tokio::spawn(async move { q2.pop(&CancellationToken::new()).await });
        tokio::task::yield_now().await;
        q.push(42);
        let got = handle.await.unwrap().unwrap();
        assert_eq!(got, 42);
        let _ = cancel;
    }

    #[tokio::test]
    async fn pop_respects_cancellation() {
        let q: Queue<i32> = Queue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = q.pop(&cancel).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}
