//! Status publishing.
//!
//! A slow thread copies a coherent snapshot out of the controller at the
//! display cadence. Readers either poll `latest()` or take a receiver from
//! `subscribe()`; the channel holds one value and always carries the newest.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel as xch;

use crate::config::TimingConfig;
use crate::state::CycleState;

/// Everything the display shows, captured under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub state: CycleState,
    pub timing: TimingConfig,
}

pub struct StatusPublisher {
    latest: Arc<Mutex<StatusSnapshot>>,
    rx: xch::Receiver<StatusSnapshot>,
    /// Dropping this wakes the thread and ends it.
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl StatusPublisher {
    pub fn spawn<F>(source: F, period: Duration) -> Self
    where
        F: Fn() -> StatusSnapshot + Send + 'static,
    {
        let (tx, rx) = xch::bounded(1);
        let drain = rx.clone();
        let (stop_tx, stop_rx) = xch::bounded::<()>(0);
        let latest = Arc::new(Mutex::new(source()));
        let latest_clone = latest.clone();

        let join_handle = std::thread::spawn(move || {
            let ticker = xch::tick(period);
            loop {
                xch::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let snap = source();
                        *latest_clone.lock().unwrap_or_else(PoisonError::into_inner) = snap;
                        if let Err(xch::TrySendError::Full(snap)) = tx.try_send(snap) {
                            // Replace the unread value with the fresh one.
                            let _ = drain.try_recv();
                            let _ = tx.try_send(snap);
                        }
                    }
                }
            }
            tracing::trace!("status publisher exiting cleanly");
        });

        Self {
            latest,
            rx,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    pub fn latest(&self) -> StatusSnapshot {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> xch::Receiver<StatusSnapshot> {
        self.rx.clone()
    }
}

impl Drop for StatusPublisher {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "status publisher panicked during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CycleMode;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn publishes_latest_and_stops_on_drop() {
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let publisher = StatusPublisher::spawn(
            move || {
                let n = c.fetch_add(1, Ordering::Relaxed);
                StatusSnapshot {
                    state: CycleState {
                        mode: CycleMode::Running,
                        cycle_count: n,
                        ..CycleState::default()
                    },
                    timing: TimingConfig::default(),
                }
            },
            Duration::from_millis(5),
        );
        let rx = publisher.subscribe();
        let first = rx.recv_timeout(Duration::from_secs(2)).expect("snapshot");
        assert_eq!(first.state.mode, CycleMode::Running);
        let second = rx.recv_timeout(Duration::from_secs(2)).expect("snapshot");
        assert!(second.state.cycle_count > first.state.cycle_count);
        drop(publisher);
        let after = counter.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::Relaxed), after, "thread stopped");
    }
}
