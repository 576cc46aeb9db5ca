use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;

/// Polling interval of the watchdog thread.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Wall-clock watchdog: a background thread flips a flag once the time budget
/// is spent. The optimizer polls the flag between perturbations; the engine
/// itself never observes it. The thread is joined on drop.
pub struct Watchdog {
    timed_out: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn start(budget: Duration) -> Self {
        let timed_out = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let timed_out = Arc::clone(&timed_out);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let started = Instant::now();
                while !stop.load(Ordering::Relaxed) {
                    if started.elapsed() >= budget {
                        warn!("time budget of {budget:?} exhausted");
                        timed_out.store(true, Ordering::Relaxed);
                        break;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
        };

        Watchdog {
            timed_out,
            stop,
            handle: Some(handle),
        }
    }

    pub fn has_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn does_not_fire_within_the_budget() {
        let watchdog = Watchdog::start(Duration::from_secs(300));
        assert!(!watchdog.has_timed_out());
    }

    #[test]
    fn fires_once_the_budget_is_spent() {
        let watchdog = Watchdog::start(Duration::from_millis(0));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !watchdog.has_timed_out() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(watchdog.has_timed_out());
    }
}
