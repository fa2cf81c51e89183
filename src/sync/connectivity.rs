//! The online/offline signal and the subscription that reacts to it.

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Reports whether the network is reachable and announces changes.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;

    /// A receiver that observes every subsequent state change. Implementations only send a value
    /// when it differs from the previous one.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// A connectivity signal driven by whoever owns it: the CLI sets it once from its `--offline`
/// flag, tests flip it to simulate the network coming and going.
#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Changes the state. Subscribers are only notified when the value actually changes.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            debug!("Connectivity changed, online = {online}");
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivitySignal for Connectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Owns a listener task that runs `on_online` every time `signal` goes from offline to online.
/// The task stops when the handle is unsubscribed or dropped.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn on_online<F, Fut>(signal: &dyn ConnectivitySignal, mut on_online: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = signal.subscribe();
        // Mark the current state as seen now, not when the task first runs, so an early
        // transition is not missed.
        rx.borrow_and_update();
        let task = tokio::spawn(async move {
            // The channel keeps only the latest value and only announces real changes, so a change
            // that reads online always follows an offline period, even one that started and ended
            // while `on_online` was running.
            while rx.changed().await.is_ok() {
                if *rx.borrow_and_update() {
                    trace!("Connectivity came back");
                    on_online().await;
                }
            }
        });
        Self { task: Some(task) }
    }

    /// Stops listening. Calling this more than once is harmless.
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn counter(signal: &Connectivity) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = Subscription::on_online(signal, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        (count, sub)
    }

    #[tokio::test]
    async fn test_fires_on_offline_to_online() {
        let signal = Connectivity::new(false);
        let (count, _sub) = counter(&signal);
        settle().await;
        signal.set_online(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Staying online is not a transition.
        signal.set_online(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        signal.set_online(false);
        settle().await;
        signal.set_online(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_flip_during_callback_fires_again() {
        let signal = Connectivity::new(false);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = Subscription::on_online(&signal, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });
        settle().await;
        signal.set_online(true);
        settle().await;
        signal.set_online(false);
        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_listening() {
        let signal = Connectivity::new(false);
        let (count, mut sub) = counter(&signal);
        settle().await;
        assert!(sub.is_active());
        sub.unsubscribe();
        settle().await;
        assert!(!sub.is_active());
        signal.set_online(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_stops_listening() {
        let signal = Connectivity::new(false);
        let (count, sub) = counter(&signal);
        drop(sub);
        settle().await;
        signal.set_online(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
