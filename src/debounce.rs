//! Keyed, single-shot delayed jobs.
//!
//! Scheduling a key again before its delay elapses replaces the pending job
//! and restarts the timer. Once a job starts running it is no longer
//! pending and is never aborted; jobs for the same key run one at a time.
//! A key's run slot exists only while a job for it is running or waiting to.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    next_generation: u64,
    pending: HashMap<String, Pending>,
    running: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `job` after the delay unless `key` is scheduled again first.
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, key: &str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = lock(&self.inner);
        inner.next_generation += 1;
        let generation = inner.next_generation;

        let shared = Arc::clone(&self.inner);
        let delay = self.delay;
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let slot = {
                let mut inner = lock(&shared);
                match inner.pending.get(&owned_key) {
                    Some(p) if p.generation == generation => {
                        inner.pending.remove(&owned_key);
                    }
                    _ => return,
                }
                inner
                    .running
                    .entry(owned_key.clone())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                    .clone()
            };

            {
                let _running = slot.lock().await;
                job.await;
            }

            // The map holds one reference and this task the other.
            let mut inner = lock(&shared);
            if Arc::strong_count(&slot) == 2 {
                inner.running.remove(&owned_key);
            }
        });

        if let Some(previous) = inner.pending.insert(
            key.to_string(),
            Pending { generation, handle },
        ) {
            previous.handle.abort();
            tracing::trace!(key, "Debounced job rescheduled");
        }
    }

    /// Drop the pending job for `key`, if any. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match lock(&self.inner).pending.remove(key) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending job.
    pub fn cancel_all(&self) {
        let mut inner = lock(&self.inner);
        for (_, p) in inner.pending.drain() {
            p.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.inner).pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Keys with a job running or queued behind one.
    pub fn running_count(&self) -> usize {
        lock(&self.inner).running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_job(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule("a", counter_job(&runs));
        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending("a"));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_resets_timer() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule("a", counter_job(&runs));
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.schedule("a", counter_job(&runs));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule("a", counter_job(&runs));
        debouncer.schedule("b", counter_job(&runs));
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_clears_pending() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule("a", counter_job(&runs));
        debouncer.schedule("b", counter_job(&runs));
        assert!(debouncer.cancel("a"));
        assert!(!debouncer.cancel("a"));
        debouncer.cancel_all();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_slots_are_released() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        for i in 0..50 {
            debouncer.schedule(&format!("template-{i}"), counter_job(&runs));
        }
        debouncer.schedule("cancelled", counter_job(&runs));
        debouncer.cancel("cancelled");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 50);
        assert_eq!(debouncer.pending_count(), 0);
        assert_eq!(debouncer.running_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_runs_one_at_a_time() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let slow_job = || {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            async move {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        };

        debouncer.schedule("a", slow_job());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        // First job is running; this one queues behind it
        debouncer.schedule("a", slow_job());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(debouncer.running_count(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(active.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.running_count(), 0);
    }
}
