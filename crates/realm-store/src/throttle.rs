//! Leading + trailing edge throttle for background persistence.
//!
//! [`Throttle`] is the pure state machine; [`spawn_throttled`] drives it with
//! a tokio timer. Within one window at most two flushes happen: the first
//! trigger fires immediately (leading edge) and, if anything else arrived
//! before the window closed, one more fires when it does (trailing edge).
//! A trailing flush opens a fresh window.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Where the throttle is in its window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThrottleState {
    /// No window open; the next trigger fires immediately.
    #[default]
    Idle,
    /// A flush fired and its window is open; nothing new since.
    PendingLeading,
    /// Triggers arrived during the open window; flush when it closes.
    PendingTrailing,
}

/// What the driver should do after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleAction {
    Fire,
    Wait,
}

#[derive(Debug, Default)]
pub struct Throttle {
    state: ThrottleState,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    /// A mutation happened.
    pub fn trigger(&mut self) -> ThrottleAction {
        match self.state {
            ThrottleState::Idle => {
                self.state = ThrottleState::PendingLeading;
                ThrottleAction::Fire
            }
            ThrottleState::PendingLeading | ThrottleState::PendingTrailing => {
                self.state = ThrottleState::PendingTrailing;
                ThrottleAction::Wait
            }
        }
    }

    /// The window opened by the last flush has closed.
    pub fn window_elapsed(&mut self) -> ThrottleAction {
        match self.state {
            ThrottleState::PendingTrailing => {
                self.state = ThrottleState::PendingLeading;
                ThrottleAction::Fire
            }
            ThrottleState::PendingLeading | ThrottleState::Idle => {
                self.state = ThrottleState::Idle;
                ThrottleAction::Wait
            }
        }
    }
}

/// Run `flush` on a throttled schedule driven by messages on `triggers`.
///
/// When every sender is dropped the task performs any pending trailing
/// flush and exits.
pub fn spawn_throttled<F, Fut>(
    window: Duration,
    mut triggers: mpsc::UnboundedReceiver<()>,
    flush: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut throttle = Throttle::new();
        while triggers.recv().await.is_some() {
            if throttle.trigger() != ThrottleAction::Fire {
                continue;
            }
            let mut deadline = Instant::now() + window;
            flush().await;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => {
                        if throttle.window_elapsed() == ThrottleAction::Fire {
                            deadline = Instant::now() + window;
                            flush().await;
                        } else {
                            break;
                        }
                    }
                    msg = triggers.recv() => {
                        if msg.is_some() {
                            throttle.trigger();
                        } else {
                            if throttle.state() == ThrottleState::PendingTrailing {
                                flush().await;
                            }
                            return;
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn first_trigger_fires() {
        let mut t = Throttle::new();
        assert_eq!(t.trigger(), ThrottleAction::Fire);
        assert_eq!(t.state(), ThrottleState::PendingLeading);
    }

    #[test]
    fn burst_collapses_to_trailing() {
        let mut t = Throttle::new();
        t.trigger();
        for _ in 0..4 {
            assert_eq!(t.trigger(), ThrottleAction::Wait);
        }
        assert_eq!(t.state(), ThrottleState::PendingTrailing);
        assert_eq!(t.window_elapsed(), ThrottleAction::Fire);
        assert_eq!(t.state(), ThrottleState::PendingLeading);
        assert_eq!(t.window_elapsed(), ThrottleAction::Wait);
        assert_eq!(t.state(), ThrottleState::Idle);
    }

    #[test]
    fn quiet_window_returns_to_idle() {
        let mut t = Throttle::new();
        t.trigger();
        assert_eq!(t.window_elapsed(), ThrottleAction::Wait);
        assert_eq!(t.state(), ThrottleState::Idle);
        assert_eq!(t.trigger(), ThrottleAction::Fire);
    }

    fn counting() -> (Arc<AtomicUsize>, impl Fn() -> std::future::Ready<()> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn five_triggers_in_one_window_flush_twice() {
        let window = Duration::from_secs(1);
        let (count, flush) = counting();
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = spawn_throttled(window, rx, flush);

        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        tokio::time::sleep(window * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_trigger_flushes_once() {
        let window = Duration::from_secs(1);
        let (count, flush) = counting();
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = spawn_throttled(window, rx, flush);

        tx.send(()).unwrap();
        tokio::time::sleep(window * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_windows_each_lead() {
        let window = Duration::from_secs(1);
        let (count, flush) = counting();
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = spawn_throttled(window, rx, flush);

        tx.send(()).unwrap();
        tokio::time::sleep(window * 2).await;
        tx.send(()).unwrap();
        tokio::time::sleep(window * 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_flushes_pending_trailing() {
        let window = Duration::from_secs(10);
        let (count, flush) = counting();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = spawn_throttled(window, rx, flush);

        tx.send(()).unwrap();
        tx.send(()).unwrap();
        drop(tx);
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
