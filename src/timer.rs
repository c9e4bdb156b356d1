//! Software trigger timer.
//!
//! In internal trigger mode the camera is started in software-trigger capture
//! and every exposure needs an explicit trigger call. `TriggerTimer` fires a
//! callback at a fixed period on its own thread between `start` and `stop`.
//! Both calls are idempotent.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{CameraError, CameraResult};

/// Callback invoked at every tick.
pub type TickFn = Arc<dyn Fn() -> CameraResult<()> + Send + Sync>;

struct TimerShared {
    running: Mutex<bool>,
    cond: Condvar,
    ticks: AtomicU64,
}

/// Periodic pulse generator running on a dedicated thread.
pub struct TriggerTimer {
    period: Duration,
    on_tick: TickFn,
    shared: Arc<TimerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TriggerTimer {
    /// Create a stopped timer.
    pub fn new(period: Duration, on_tick: TickFn) -> Self {
        Self {
            period,
            on_tick,
            shared: Arc::new(TimerShared {
                running: Mutex::new(false),
                cond: Condvar::new(),
                ticks: AtomicU64::new(0),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start firing. No-op if already running.
    pub fn start(&self) -> CameraResult<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }

        *self.shared.running.lock() = true;

        let shared = Arc::clone(&self.shared);
        let on_tick = Arc::clone(&self.on_tick);
        let period = self.period;
        let spawned = std::thread::Builder::new()
            .name("dhyana-trigger".to_owned())
            .spawn(move || run(&shared, &on_tick, period));

        match spawned {
            Ok(h) => {
                tracing::debug!(period_ms = period.as_millis() as u64, "Trigger timer started");
                *handle = Some(h);
                Ok(())
            }
            Err(e) => {
                *self.shared.running.lock() = false;
                Err(CameraError::hardware(format!(
                    "Unable to start the internal trigger timer: {e}"
                )))
            }
        }
    }

    /// Stop firing and wait for the timer thread. No-op if not running.
    pub fn stop(&self) {
        let Some(h) = self.handle.lock().take() else {
            return;
        };

        *self.shared.running.lock() = false;
        self.shared.cond.notify_all();

        if h.join().is_err() {
            tracing::error!("Trigger timer thread panicked");
        }
        tracing::debug!(ticks = self.ticks(), "Trigger timer stopped");
    }

    /// Whether the timer thread is active.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Total number of ticks fired since creation.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for TriggerTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &TimerShared, on_tick: &TickFn, period: Duration) {
    let mut next = Instant::now() + period;
    let mut running = shared.running.lock();

    while *running {
        if !shared.cond.wait_until(&mut running, next).timed_out() {
            continue;
        }
        if !*running {
            break;
        }

        // Trigger outside the lock so that stop() is never blocked by the driver.
        let result = parking_lot::MutexGuard::unlocked(&mut running, || on_tick());
        shared.ticks.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = result {
            tracing::warn!(error = %e, "Software trigger failed");
        }

        next += period;
        let now = Instant::now();
        if next < now {
            next = now + period;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_timer(period_ms: u64) -> (TriggerTimer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let timer = TriggerTimer::new(
            Duration::from_millis(period_ms),
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        (timer, count)
    }

    #[test]
    fn test_timer_fires_while_running() {
        let (timer, count) = counting_timer(2);
        timer.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        timer.stop();

        let fired = count.load(Ordering::SeqCst);
        assert!(fired > 0, "timer never fired");
        assert_eq!(timer.ticks(), fired as u64);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), fired, "timer fired after stop");
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (timer, _count) = counting_timer(5);
        timer.stop();
        timer.start().unwrap();
        timer.start().unwrap();
        assert!(timer.is_running());
        timer.stop();
        timer.stop();
        assert!(!timer.is_running());
    }

    #[test]
    fn test_timer_restarts_after_stop() {
        let (timer, count) = counting_timer(2);
        timer.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        timer.stop();
        let first = count.load(Ordering::SeqCst);

        timer.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        timer.stop();
        assert!(count.load(Ordering::SeqCst) > first);
    }

    #[test]
    fn test_failing_tick_keeps_timer_alive() {
        let timer = TriggerTimer::new(
            Duration::from_millis(2),
            Arc::new(|| Err(CameraError::hardware("trigger refused"))),
        );
        timer.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(timer.is_running());
        timer.stop();
        assert!(timer.ticks() > 1);
    }
}
