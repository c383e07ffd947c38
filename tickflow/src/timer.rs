use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

/// Granularity of the interruptible sleep: [`Timer::stop`] is observed within one tick.
const TICK: Duration = Duration::from_millis(10);

/// A cooperative one-shot or periodic deferred task.
///
/// The task runs on a dedicated thread. [`Timer::stop`] is cooperative and idempotent:
/// the sleeping thread observes it at the next 10 ms tick and exits without invoking
/// the task again. Panics from the task are logged and, for periodic schedules, do not
/// cancel future invocations.
#[derive(Debug)]
pub struct Timer {
    running: Arc<AtomicBool>,
}

fn interruptible_sleep(running: &AtomicBool, duration: Duration) {
    let start = Instant::now();

    while running.load(Ordering::Acquire) {
        let remaining = duration.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        spin_sleep::sleep(TICK.min(remaining));
    }
}

fn run_task<F: FnMut()>(f: &mut F) {
    if catch_unwind(AssertUnwindSafe(|| f())).is_err() {
        error!("timer task panicked");
    }
}

impl Timer {
    /// Schedule `f` to run once after `delay`.
    pub fn run_once<F>(f: F, delay: Duration) -> Arc<Timer>
    where
        F: FnOnce() + Send + 'static,
    {
        let timer = Arc::new(Timer {
            running: Arc::new(AtomicBool::new(true)),
        });

        let running = Arc::clone(&timer.running);
        std::thread::spawn(move || {
            interruptible_sleep(&running, delay);

            if running.swap(false, Ordering::AcqRel) {
                let mut f = Some(f);
                run_task(&mut || {
                    if let Some(f) = f.take() {
                        f()
                    }
                });
            }
        });

        timer
    }

    /// Schedule `f` to run after `delay` and then every `period`.
    pub fn schedule<F>(f: F, delay: Duration, period: Duration) -> Arc<Timer>
    where
        F: FnMut() + Send + 'static,
    {
        let timer = Arc::new(Timer {
            running: Arc::new(AtomicBool::new(true)),
        });

        let running = Arc::clone(&timer.running);
        std::thread::spawn(move || {
            let mut f = f;
            interruptible_sleep(&running, delay);

            while running.load(Ordering::Acquire) {
                run_task(&mut f);
                interruptible_sleep(&running, period);
            }
        });

        timer
    }

    /// Request the timer to stop. Idempotent; a sleeping timer observes the stop
    /// within one tick and exits without invoking the task.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the timer has neither fired (one-shot) nor been stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
