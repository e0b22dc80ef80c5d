use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of requests in flight against the job server.
///
/// Wrap in an `Arc` via [`Throttler::new`], then call [`Throttler::acquire`] before each request and hold the
/// permit until the response body has been consumed. At most `max_concurrent` requests run simultaneously, no
/// matter how many job tasks share the throttler.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Throttler {
    /// Create a new throttler that allows at most `max_concurrent` requests at a time.
    ///
    /// A value of zero is treated as one.
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        let max_concurrent = max_concurrent.max(1);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    /// Wait for a free slot.
    ///
    /// The slot is released when the returned permit is dropped.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use core::time::Duration;

    #[tokio::test]
    async fn limits_concurrency() {
        let throttler = Throttler::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let throttler = Arc::clone(&throttler);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _permit = throttler.acquire().await;
                    let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                    _ = max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    _ = active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        _ = futures_util::future::join_all(tasks).await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_is_treated_as_one() {
        let throttler = Throttler::new(0);
        assert_eq!(throttler.max_concurrent(), 1);
        let _permit = throttler.acquire().await;
    }
}
