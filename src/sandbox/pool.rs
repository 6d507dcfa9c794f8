//! Bounded box-id allocator
//!
//! Isolate box ids are the only host-level shared resource. The pool hands
//! out ids from a fixed range through an acquire/release free-list; acquire
//! waits when every id is leased.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

pub const BOX_ID_MIN: u32 = 17;
pub const BOX_ID_MAX: u32 = 999;

pub struct BoxPool {
    free: Mutex<VecDeque<u32>>,
    notify: Notify,
}

impl BoxPool {
    pub fn new() -> Self {
        Self::with_range(BOX_ID_MIN, BOX_ID_MAX)
    }

    pub fn with_range(min: u32, max: u32) -> Self {
        Self {
            free: Mutex::new((min..=max).collect()),
            notify: Notify::new(),
        }
    }

    /// Lease a box id, waiting until one is free.
    pub async fn acquire(&self) -> u32 {
        loop {
            if let Some(id) = self.free.lock().await.pop_front() {
                return id;
            }
            self.notify.notified().await;
        }
    }

    /// Return a leased box id to the pool.
    pub async fn release(&self, id: u32) {
        self.free.lock().await.push_back(id);
        self.notify.notify_one();
    }
}

impl Default for BoxPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let pool = BoxPool::with_range(1, 2);
        let a = pool.acquire().await;
        let b = pool.acquire().await;
        assert_ne!(a, b);

        pool.release(a).await;
        let c = pool.acquire().await;
        assert_eq!(c, a);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        use std::sync::Arc;

        let pool = Arc::new(BoxPool::with_range(5, 5));
        let id = pool.acquire().await;
        assert_eq!(id, 5);

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };

        // The waiter cannot complete until the lease is returned
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        pool.release(id).await;
        assert_eq!(waiter.await.unwrap(), 5);
    }
}
