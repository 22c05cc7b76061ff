//! Shared handle to an in-flight validation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;

use crate::error::ValueError;

/// The outstanding result of running one validator against one node.
///
/// Cloning yields another handle to the same run; every clone resolves to the
/// same outcome. Requesting a validation that is already in flight returns a
/// handle for which [`ptr_eq`](Self::ptr_eq) holds.
#[derive(Clone)]
pub struct PendingValidation {
    inner: Shared<BoxFuture<'static, Option<ValueError>>>,
}

impl PendingValidation {
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = Option<ValueError>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// Returns `true` if both handles refer to the same validation run.
    pub fn ptr_eq(&self, other: &PendingValidation) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the outcome if the run has already settled.
    pub fn peek(&self) -> Option<&Option<ValueError>> {
        self.inner.peek()
    }
}

impl Future for PendingValidation {
    type Output = Option<ValueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingValidation")
            .field("settled", &self.peek().is_some())
            .finish()
    }
}
