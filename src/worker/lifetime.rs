//! Extend-lifetime bookkeeping.
//!
//! Every dispatched event holds a [`LifetimeGuard`] until it settles. The host
//! may only terminate the worker once [`Lifetimes::settled`] resolves.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
  pending: AtomicUsize,
  idle: Notify,
}

/// Shared counter of unsettled events.
#[derive(Clone, Default)]
pub struct Lifetimes {
  inner: Arc<Inner>,
}

impl Lifetimes {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keep the worker alive until the returned guard is dropped.
  pub fn extend(&self) -> LifetimeGuard {
    self.inner.pending.fetch_add(1, Ordering::SeqCst);
    LifetimeGuard {
      inner: Arc::clone(&self.inner),
    }
  }

  pub fn pending(&self) -> usize {
    self.inner.pending.load(Ordering::SeqCst)
  }

  /// Wait until no event is pending.
  pub async fn settled(&self) {
    loop {
      let notified = self.inner.idle.notified();
      tokio::pin!(notified);
      // Register before checking so a release in between is not missed
      notified.as_mut().enable();

      if self.pending() == 0 {
        return;
      }
      notified.await;
    }
  }
}

/// Held by an in-flight event.
pub struct LifetimeGuard {
  inner: Arc<Inner>,
}

impl Drop for LifetimeGuard {
  fn drop(&mut self) {
    if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
      self.inner.idle.notify_waiters();
    }
  }
}
