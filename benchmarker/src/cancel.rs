//! Cooperative cancellation
//!
//! A [`Cancellation`] is a cheap, cloneable handle built on a
//! `tokio::sync::watch` channel. Children observe their parent, and a child
//! created with [`Cancellation::with_timeout`] also fires once its deadline
//! passes. Nothing is aborted by this type: workers check it before starting
//! new work.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Cancellation {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<bool>,
    deadline: Option<Instant>,
    parent: Option<Cancellation>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self::build(None, None)
    }

    fn build(deadline: Option<Instant>, parent: Option<Cancellation>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                tx,
                deadline,
                parent,
            }),
        }
    }

    /// A handle that is cancelled together with `self`, but can also be
    /// cancelled on its own
    pub fn child(&self) -> Self {
        Self::build(None, Some(self.clone()))
    }

    /// A child that additionally fires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout), Some(self.clone()))
    }

    pub fn cancel(&self) {
        self.inner.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.tx.borrow()
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(Cancellation::is_cancelled)
    }

    /// Resolves once this handle, an ancestor, or a deadline fires
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.inner.tx.subscribe();

            let deadline = async {
                match self.inner.deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            let parent = async {
                match &self.inner.parent {
                    Some(parent) => parent.cancelled().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                // The sender lives in `self`, so this only returns once set.
                _ = rx.wait_for(|cancelled| *cancelled) => {}
                _ = deadline => {}
                _ = parent => {}
            }
        })
    }
}
