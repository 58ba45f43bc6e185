//! Strictly FIFO mutual exclusion per drive pair.
//!
//! Each job takes a [`Ticket`] when the dispatch loop draws it, so the order
//! in which jobs hold a lane is the order they were drawn, regardless of
//! which execution unit the runtime polls first.

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// One lane of the queue; at most one job holds it at a time.
#[derive(Debug, Default)]
pub(crate) struct PairLock {
    tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl PairLock {
    /// Join the end of the lane.
    pub fn enter(&self) -> Ticket {
        let (release, next) = oneshot::channel();
        let prev = std::mem::replace(
            &mut *self.tail.lock().unwrap_or_else(PoisonError::into_inner),
            Some(next),
        );
        Ticket {
            prev,
            release: Some(release),
        }
    }
}

/// A place in a lane.
#[derive(Debug)]
pub(crate) struct Ticket {
    prev: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

impl Ticket {
    /// Wait until every earlier ticket in the lane has been released.
    ///
    /// Cancel safe: dropping the future keeps the ticket's place.
    pub async fn acquire(&mut self) {
        if let Some(prev) = self.prev.as_mut() {
            // Ok or closed both mean the predecessor is done.
            let _ = prev.await;
        }
        self.prev = None;
    }

    /// Hold the lane until the guard is dropped. Call after [`acquire`](Self::acquire).
    pub fn into_guard(mut self) -> PairGuard {
        PairGuard {
            _release: self.release.take(),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        // Abandoned while still waiting: pass the lane on only once the
        // predecessor is done, so successors never overlap it.
        if let (Some(prev), Some(release)) = (self.prev.take(), self.release.take()) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = prev.await;
                    drop(release);
                });
            }
        }
    }
}

/// Releases the lane when dropped.
#[derive(Debug)]
pub(crate) struct PairGuard {
    _release: Option<oneshot::Sender<()>>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    #[tokio::test]
    async fn test_first_ticket_is_free() {
        let lane = PairLock::default();
        let mut ticket = lane.enter();
        tokio::time::timeout(Duration::from_secs(1), ticket.acquire())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lane_is_fifo() {
        let lane = PairLock::default();
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let first = lane.enter();
        let tickets: Vec<_> = (0..5).map(|_| lane.enter()).collect();

        let mut handles = Vec::new();
        for (i, mut ticket) in tickets.into_iter().enumerate().rev() {
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                ticket.acquire().await;
                let _guard = ticket.into_guard();
                order.lock().await.push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }

        let mut first = first;
        first.acquire().await;
        drop(first.into_guard());

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_abandoned_ticket_waits_for_predecessor() {
        let lane = PairLock::default();

        let mut a = lane.enter();
        a.acquire().await;
        let guard_a = a.into_guard();

        let b = lane.enter();
        let mut c = lane.enter();
        drop(b);

        let blocked = tokio::time::timeout(Duration::from_millis(50), c.acquire()).await;
        assert!(blocked.is_err(), "c must not run while a holds the lane");

        drop(guard_a);
        tokio::time::timeout(Duration::from_secs(1), c.acquire())
            .await
            .unwrap();
    }
}
