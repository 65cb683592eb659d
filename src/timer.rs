/// Debounced loading indicator
///
/// Work that finishes faster than the reveal delay should never flash a
/// spinner. `LoadingTimer::start` schedules a callback after the delay;
/// `stop` cancels it. The timer moves through three states:
///
/// ```text
///   Idle --start--> Scheduled --delay elapsed--> Firing
///    ^                  |                          |
///    +------stop--------+------------stop----------+
/// ```
///
/// `start` while Scheduled or Firing does nothing and does not restart the
/// delay. The delay runs as a `spawn_local` task, so `start` must be called
/// from inside a `tokio::task::LocalSet`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Scheduled,
    Firing,
}

pub struct LoadingTimer {
    state: Rc<Cell<TimerState>>,
    /// Bumped on every stop so a woken task from an earlier start never fires
    epoch: Rc<Cell<u64>>,
    pending: RefCell<Option<JoinHandle<()>>>,
}

impl LoadingTimer {
    pub fn new() -> Self {
        LoadingTimer {
            state: Rc::new(Cell::new(TimerState::Idle)),
            epoch: Rc::new(Cell::new(0)),
            pending: RefCell::new(None),
        }
    }

    pub fn state(&self) -> TimerState {
        self.state.get()
    }

    /// True while Scheduled or Firing
    pub fn is_running(&self) -> bool {
        self.state.get() != TimerState::Idle
    }

    /// Schedule `on_fire` after `delay` unless the timer is already running.
    pub fn start<F>(&self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + 'static,
    {
        if self.is_running() {
            return;
        }
        self.state.set(TimerState::Scheduled);

        let state = Rc::clone(&self.state);
        let epoch = Rc::clone(&self.epoch);
        let started_in = epoch.get();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if epoch.get() == started_in && state.get() == TimerState::Scheduled {
                state.set(TimerState::Firing);
                on_fire();
            }
        });
        *self.pending.borrow_mut() = Some(handle);
    }

    /// Cancel any pending fire and return to Idle.
    pub fn stop(&self) {
        if let Some(handle) = self.pending.borrow_mut().take() {
            handle.abort();
        }
        self.epoch.set(self.epoch.get().wrapping_add(1));
        self.state.set(TimerState::Idle);
    }
}

impl Default for LoadingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoadingTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for LoadingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingTimer")
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        LocalSet::new()
            .run_until(async {
                let timer = LoadingTimer::new();
                let fired = Rc::new(Cell::new(0));

                let counter = Rc::clone(&fired);
                timer.start(Duration::from_millis(100), move || counter.set(counter.get() + 1));
                assert_eq!(timer.state(), TimerState::Scheduled);

                tokio::time::advance(Duration::from_millis(60)).await;
                settle().await;
                assert_eq!(fired.get(), 0);

                tokio::time::advance(Duration::from_millis(50)).await;
                settle().await;
                assert_eq!(fired.get(), 1);
                assert_eq!(timer.state(), TimerState::Firing);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_reset_delay() {
        LocalSet::new()
            .run_until(async {
                let timer = LoadingTimer::new();
                let fired = Rc::new(Cell::new(0));

                let counter = Rc::clone(&fired);
                timer.start(Duration::from_millis(100), move || counter.set(counter.get() + 1));
                tokio::time::advance(Duration::from_millis(80)).await;

                let counter = Rc::clone(&fired);
                timer.start(Duration::from_millis(100), move || counter.set(counter.get() + 10));
                tokio::time::advance(Duration::from_millis(30)).await;
                settle().await;

                // the first schedule fired; the second start was ignored
                assert_eq!(fired.get(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_fire() {
        LocalSet::new()
            .run_until(async {
                let timer = LoadingTimer::new();
                let fired = Rc::new(Cell::new(false));

                let flag = Rc::clone(&fired);
                timer.start(Duration::from_millis(100), move || flag.set(true));
                tokio::time::advance(Duration::from_millis(50)).await;
                timer.stop();
                assert_eq!(timer.state(), TimerState::Idle);

                tokio::time::advance(Duration::from_millis(200)).await;
                settle().await;
                assert!(!fired.get());
                assert!(!timer.is_running());
            })
            .await;
    }
}
