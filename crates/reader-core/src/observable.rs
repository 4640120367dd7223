use std::iter;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::warn;

/// Announcements a subscriber may fall behind by before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 64;

/// Current value plus a broadcast of every change applied to it.
///
/// The value and its announcement change under one lock, so every subscriber
/// sees updates in the order they were applied. Closing the holder ends each
/// subscription once its backlog has been read.
pub struct Observable<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    value: T,
    sender: Option<Sender<T>>,
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self::with_capacity(value, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(value: T, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(Inner {
                value,
                sender: Some(sender),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Subscriptions taken after [`close`](Self::close) end immediately.
    pub fn subscribe(&self) -> Subscription<T> {
        let receiver = match &self.lock().sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        };
        Subscription { receiver }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .sender
            .as_ref()
            .map_or(0, Sender::receiver_count)
    }

    /// Stops announcing. The value can still be read and replaced.
    pub fn close(&self) {
        self.lock().sender = None;
    }

    /// Replaces the value and announces it, even when it is unchanged.
    pub fn set(&self, value: T) {
        self.update_if(|current| {
            *current = value;
            true
        });
    }

    /// Applies `change` atomically; subscribers hear about it only when it
    /// returns true.
    pub fn update_if(&self, change: impl FnOnce(&mut T) -> bool) -> bool {
        let mut inner = self.lock();
        if !change(&mut inner.value) {
            return false;
        }
        if let Some(sender) = &inner.sender {
            // Err only means nobody is listening.
            let _ = sender.send(inner.value.clone());
        }
        true
    }
}

/// Handle on an [`Observable`]. Dropping it unsubscribes.
pub struct Subscription<T> {
    receiver: Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Next announced value, or `None` once the holder is closed and the
    /// backlog is empty.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber fell behind; oldest updates dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next pending value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber fell behind; oldest updates dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every value announced so far and not yet read.
    pub fn drain(&mut self) -> Vec<T> {
        iter::from_fn(|| self.try_recv()).collect()
    }
}
