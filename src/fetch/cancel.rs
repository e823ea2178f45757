use std::thread;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

/// Creates a linked canceller and signal.
///
/// The signal fires when the [`Canceller`] is cancelled or dropped, so keep
/// the canceller alive for as long as the work should continue.
pub fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, rx) = flume::bounded(0);
    (Canceller { _tx: tx }, CancelSignal { rx: Some(rx) })
}

/// Owning half of a cancellation pair.
#[derive(Debug)]
#[must_use = "dropping a canceller fires its signal"]
pub struct Canceller {
    // Never sent on; receivers observe cancellation as disconnection.
    _tx: Sender<()>,
}

impl Canceller {
    /// Fires the signal.
    pub fn cancel(self) {
        drop(self);
    }
}

/// Observing half of a cancellation pair. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    rx: Option<Receiver<()>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_canceled(&self) -> bool {
        self.rx.as_ref().is_some_and(Receiver::is_disconnected)
    }

    /// Blocks until the signal fires. Never returns for [`CancelSignal::never`].
    pub fn wait(&self) {
        match &self.rx {
            Some(rx) => {
                let _ = rx.recv();
            }
            None => loop {
                thread::park();
            },
        }
    }

    /// Blocks for at most `timeout`, returning whether the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match &self.rx {
            Some(rx) => matches!(rx.recv_timeout(timeout), Err(RecvTimeoutError::Disconnected)),
            None => {
                thread::sleep(timeout);
                false
            }
        }
    }

    pub(crate) fn receiver(&self) -> Option<&Receiver<()>> {
        self.rx.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_fires_every_clone() {
        let (canceller, signal) = cancel_pair();
        let clone = signal.clone();
        assert!(!signal.is_canceled());

        canceller.cancel();
        assert!(signal.is_canceled());
        assert!(clone.is_canceled());
        assert!(clone.wait_timeout(Duration::from_secs(5)));
        signal.wait();
    }

    #[test]
    fn test_drop_fires() {
        let (canceller, signal) = cancel_pair();
        drop(canceller);
        assert!(signal.is_canceled());
    }

    #[test]
    fn test_wait_wakes_blocked_thread() {
        let (canceller, signal) = cancel_pair();
        thread::scope(|scope| {
            let waiter = scope.spawn(|| signal.wait());
            canceller.cancel();
            waiter.join().unwrap();
        });
        assert!(signal.is_canceled());
    }

    #[test]
    fn test_never() {
        let signal = CancelSignal::never();
        assert!(!signal.is_canceled());
        assert!(!signal.wait_timeout(Duration::from_millis(1)));
        assert!(!CancelSignal::default().is_canceled());
    }

    #[test]
    fn test_pending_times_out() {
        let (_canceller, signal) = cancel_pair();
        assert!(!signal.wait_timeout(Duration::from_millis(1)));
    }
}
