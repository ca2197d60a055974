use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const RERUN: u8 = 2;

/// Allows one refresh at a time. A second caller is turned away, or may
/// ask the running refresh to go round once more.
#[derive(Debug, Default)]
pub struct RefreshGate {
    state: AtomicU8,
}

/// Held by the running refresh. Releases the gate when dropped.
pub struct RefreshPermit<'a> {
    gate: &'a RefreshGate,
    held: bool,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<RefreshPermit<'_>> {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshPermit { gate: self, held: true })
    }

    /// Ask the refresh in flight to run again when it finishes. Returns
    /// false when nothing is in flight.
    pub fn request_rerun(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, RERUN, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == RERUN,
        }
    }
}

impl RefreshPermit<'_> {
    /// Release the gate unless a rerun was requested meanwhile. Returns
    /// true when the holder must refresh again.
    pub fn finish(&mut self) -> bool {
        let released = self
            .gate
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            self.held = false;
        } else {
            self.gate.state.store(RUNNING, Ordering::Release);
        }
        !released
    }
}

impl Drop for RefreshPermit<'_> {
    fn drop(&mut self) {
        if self.held {
            self.gate.state.store(IDLE, Ordering::Release);
        }
    }
}

/// Handle to a running poll loop.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop polling, abandoning any tick still in flight.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Run `tick` every `interval` until stopped. The first tick fires one
/// interval from now; ticks missed while a slow tick runs are dropped.
pub fn spawn_polling<F, Fut>(interval: Duration, tick: F) -> PollHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Polling every {:?}", interval);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    debug!("Poll tick");
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = tick() => {}
                    }
                }
            }
        }

        info!("Polling stopped");
    });

    PollHandle { shutdown, task }
}

/// Poll `check` up to `attempts` times, `interval` apart.
pub async fn wait_for<F, Fut>(attempts: u32, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=attempts {
        if check().await {
            return true;
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_gate_admits_one_at_a_time() {
        let gate = RefreshGate::new();

        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_rerun_request_keeps_gate_held() {
        let gate = RefreshGate::new();
        assert!(!gate.request_rerun());

        let mut permit = gate.try_acquire().unwrap();
        assert!(gate.request_rerun());
        assert!(gate.request_rerun());

        // One pending rerun, however many times it was asked for
        assert!(permit.finish());
        assert!(gate.try_acquire().is_none());
        assert!(!permit.finish());

        assert!(gate.try_acquire().is_some());
        drop(permit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = spawn_polling(Duration::from_secs(30), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_does_not_stack() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = spawn_polling(Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(25)).await;
            }
        });

        // Ticks start at 10s and 40s; those due at 20s and 30s are dropped
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_gives_up() {
        let calls = AtomicUsize::new(0);
        let found = wait_for(5, Duration::from_millis(200), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;

        assert!(!found);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_succeeds_late() {
        let calls = AtomicUsize::new(0);
        let found = wait_for(30, Duration::from_millis(200), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { n >= 3 }
        })
        .await;

        assert!(found);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
