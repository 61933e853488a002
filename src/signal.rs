//! Write-once shutdown broadcast shared by every pipeline worker.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct Inner {
    /// Dropped on cancel, which disconnects every receiver at once
    trigger: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
    cancelled: AtomicBool,
}

/// Cooperative cancellation signal.
///
/// Nothing is ever sent on the underlying channel: cancelling drops the only
/// sender, so every clone of the receiver becomes ready inside a
/// `crossbeam::select!` and stays ready forever.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (trigger, receiver) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(trigger)),
                receiver,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Fire the signal. Returns `true` only for the call that actually set it.
    pub fn cancel(&self) -> bool {
        let trigger = self.inner.trigger.lock().take();
        match trigger {
            Some(trigger) => {
                self.inner.cancelled.store(true, Ordering::Release);
                drop(trigger);
                debug!("cancellation signalled");
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver to race against other operations in `select!`.
    ///
    /// Becomes ready (with a disconnect error) once the signal fires.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.receiver
    }

    /// Block until the signal fires
    pub fn wait(&self) {
        let _ = self.inner.receiver.recv();
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::select;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_write_once() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.cancel());
        assert!(!signal.cancel());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_clones_observe_cancel() {
        let signal = CancellationSignal::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        signal.cancel();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn test_receiver_stays_ready_after_cancel() {
        let signal = CancellationSignal::new();
        signal.cancel();
        for _ in 0..3 {
            let observed = select! {
                recv(signal.receiver()) -> _ => true,
                default(Duration::from_millis(100)) => false,
            };
            assert!(observed);
        }
    }

    #[test]
    fn test_receiver_not_ready_before_cancel() {
        let signal = CancellationSignal::new();
        let observed = select! {
            recv(signal.receiver()) -> _ => true,
            default => false,
        };
        assert!(!observed);
    }
}
