//! Explicit shutdown plumbing for the worker threads.
//!
//! Nothing is ever sent on the channel: firing (or dropping) the trigger
//! disconnects it, and every cloned token observes the disconnect.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub struct ShutdownTrigger {
    _tx: Sender<()>,
}

#[derive(Clone)]
pub struct ShutdownToken {
    rx: Receiver<()>,
}

pub fn channel() -> (ShutdownTrigger, ShutdownToken) {
    let (tx, rx) = bounded(0);
    (ShutdownTrigger { _tx: tx }, ShutdownToken { rx })
}

impl ShutdownTrigger {
    pub fn fire(self) {}

    /// Wait up to `limit` for `done` to disconnect, then fire either way.
    /// Returns `true` if the limit elapsed first.
    pub fn fire_after(self, limit: Duration, done: &Receiver<()>) -> bool {
        let timed_out = matches!(done.recv_timeout(limit), Err(RecvTimeoutError::Timeout));
        self.fire();
        timed_out
    }
}

impl ShutdownToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// For use in `select!`: becomes ready once shutdown is requested.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_fire_reaches_all_tokens() {
        let (trigger, token) = channel();
        let other = token.clone();
        assert!(!token.is_cancelled());
        trigger.fire();
        assert!(token.is_cancelled());
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_wakes_blocked_waiter() {
        let (trigger, token) = channel();
        let h = thread::spawn(move || token.receiver().recv_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        drop(trigger);
        let res = h.join().unwrap();
        assert!(res.is_err(), "disconnect wakes the receiver");
    }

    #[test]
    fn test_fire_after_returns_early_when_done() {
        let (trigger, token) = channel();
        let (done_tx, done_rx) = bounded::<()>(0);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(done_tx);
        });

        let start = Instant::now();
        assert!(!trigger.fire_after(Duration::from_secs(10), &done_rx));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(token.is_cancelled());
        worker.join().unwrap();
    }

    #[test]
    fn test_fire_after_times_out() {
        let (trigger, token) = channel();
        let (_done_tx, done_rx) = bounded::<()>(0);
        assert!(trigger.fire_after(Duration::from_millis(20), &done_rx));
        assert!(token.is_cancelled());
    }
}
