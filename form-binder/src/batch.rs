//! Batch window for validation requests.
//!
//! Validation requests made within the same scheduling quantum share one
//! barrier. Every validation run awaits the barrier before invoking its
//! validator, so all requests issued synchronously land in the ledger before
//! any of them can settle, and the binder reports a single `validating`
//! period for the whole batch.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;

use crate::utils::lock;

pub(crate) type Barrier = Shared<BoxFuture<'static, ()>>;

#[derive(Default, Clone)]
pub(crate) struct BatchWindow {
    slot: Arc<Mutex<Option<Barrier>>>,
}

impl BatchWindow {
    /// Joins the open batch, opening a new one if none exists.
    ///
    /// Returns the batch barrier and whether this call opened it.
    pub(crate) fn join(&self) -> (Barrier, bool) {
        let mut slot = lock(&self.slot);
        if let Some(barrier) = slot.as_ref() {
            return (barrier.clone(), false);
        }

        let window: Weak<Mutex<Option<Barrier>>> = Arc::downgrade(&self.slot);
        let barrier = async move {
            tokio::task::yield_now().await;
            if let Some(slot) = window.upgrade() {
                *lock(&slot) = None;
            }
        }
        .boxed()
        .shared();

        *slot = Some(barrier.clone());
        (barrier, true)
    }

    /// Returns `true` while a batch is open.
    pub(crate) fn is_open(&self) -> bool {
        lock(&self.slot).is_some()
    }
}
