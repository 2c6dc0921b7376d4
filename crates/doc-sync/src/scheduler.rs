//! Debounced autosave timer.
//!
//! One scheduler per editor instance. Arming replaces any pending timer
//! (debounce, not throttle). Each arm gets a generation number; a timer that
//! fires must `claim` its generation before acting, so a timer cancelled after
//! it already woke up still does nothing.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

pub struct AutosaveScheduler {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl AutosaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a timer is waiting to fire.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm the timer, cancelling any pending one.
    ///
    /// After the delay `on_fire` is called with this arm's generation. Must be
    /// called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let delay = self.delay;
        trace!(generation, ?delay, "Arming autosave timer");

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation).await;
        }));
        generation
    }

    /// Cancel the pending timer, if any.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Called from a fired timer. Returns true if `generation` is still the
    /// armed one, and disarms without aborting the calling task.
    pub fn claim(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            return false;
        }
        self.pending = None;
        self.generation += 1;
        true
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const DELAY: Duration = Duration::from_millis(100);

    /// Arm a timer that claims its generation and counts successful fires.
    fn arm_counting(scheduler: &Arc<Mutex<AutosaveScheduler>>, fired: &Arc<AtomicUsize>) -> u64 {
        let weak = Arc::downgrade(scheduler);
        let fired = Arc::clone(fired);
        scheduler.lock().unwrap().arm(move |generation| async move {
            let Some(scheduler) = weak.upgrade() else {
                return;
            };
            if scheduler.lock().unwrap().claim(generation) {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let scheduler = Arc::new(Mutex::new(AutosaveScheduler::new(DELAY)));
        let fired = Arc::new(AtomicUsize::new(0));

        arm_counting(&scheduler, &fired);
        assert!(scheduler.lock().unwrap().is_armed());

        tokio::time::sleep(DELAY / 2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(DELAY).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.lock().unwrap().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_the_delay() {
        let scheduler = Arc::new(Mutex::new(AutosaveScheduler::new(DELAY)));
        let fired = Arc::new(AtomicUsize::new(0));

        arm_counting(&scheduler, &fired);
        tokio::time::sleep(DELAY * 3 / 4).await;
        arm_counting(&scheduler, &fired);
        tokio::time::sleep(DELAY * 3 / 4).await;

        // First timer was replaced, second has not elapsed yet
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(DELAY).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let scheduler = Arc::new(Mutex::new(AutosaveScheduler::new(DELAY)));
        let fired = Arc::new(AtomicUsize::new(0));

        arm_counting(&scheduler, &fired);
        scheduler.lock().unwrap().cancel();

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_claim_rejects_old_generation() {
        let mut scheduler = AutosaveScheduler::new(DELAY);
        assert!(!scheduler.claim(0));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            let first = scheduler.arm(|_| async {});
            let second = scheduler.arm(|_| async {});

            assert!(!scheduler.claim(first));
            assert!(scheduler.claim(second));
            assert!(!scheduler.claim(second));
        });
    }
}
