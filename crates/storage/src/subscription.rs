//! Cancellable push streams handed out by a `ContentStore`.

use tokio::sync::mpsc;

use crate::repository::StorageError;

type CancelHook = Box<dyn FnOnce() + Send + 'static>;

/// Consumer side of a live query.
///
/// Yields the current value first, then a new value after every relevant
/// write. A transport error is delivered once and ends the stream. Dropping
/// the subscription (or calling [`Subscription::cancel`]) unregisters the
/// listener from the store.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T, StorageError>>,
    on_cancel: Option<CancelHook>,
}

/// Producer side of a live query, owned by the store.
pub struct Emitter<T> {
    tx: mpsc::UnboundedSender<Result<T, StorageError>>,
}

/// Create a connected emitter/subscription pair.
#[must_use]
pub fn channel<T>() -> (Emitter<T>, Subscription<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Emitter { tx },
        Subscription {
            rx,
            on_cancel: None,
        },
    )
}

impl<T> Subscription<T> {
    /// A subscription that reports `err` and then ends.
    #[must_use]
    pub fn failed(err: StorageError) -> Self {
        let (emitter, subscription) = channel();
        emitter.fail(err);
        subscription
    }

    /// Run `hook` when the subscription is cancelled or dropped.
    #[must_use]
    pub fn on_cancel(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    /// Wait for the next pushed value. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<T, StorageError>> {
        self.rx.recv().await
    }

    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(hook) = self.on_cancel.take() {
            hook();
        }
    }
}

impl<T> Emitter<T> {
    /// Push a value. Returns `false` once the subscriber is gone.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(Ok(value)).is_ok()
    }

    /// Report a transport error and close the stream.
    pub fn fail(self, err: StorageError) {
        let _ = self.tx.send(Err(err));
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the subscriber has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn delivers_values_in_order() {
        let (emitter, mut sub) = channel();
        assert!(emitter.push(1));
        assert!(emitter.push(2));
        drop(emitter);

        assert_eq!(sub.next().await.unwrap().unwrap(), 1);
        assert_eq!(sub.next().await.unwrap().unwrap(), 2);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn failed_subscription_yields_error_then_ends() {
        let mut sub: Subscription<()> =
            Subscription::failed(StorageError::Connection("offline".into()));
        assert!(matches!(sub.next().await, Some(Err(StorageError::Connection(_)))));
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn cancel_runs_hook_and_closes_emitter() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let (emitter, sub) = channel::<u8>();
        let sub = sub.on_cancel(move || flag.store(true, Ordering::SeqCst));

        sub.cancel();

        assert!(fired.load(Ordering::SeqCst));
        assert!(emitter.is_closed());
        assert!(!emitter.push(1));
    }
}
