//! Binder configuration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::server::EndpointError;

/// Callback invoked with the previous value whenever the binder's value,
/// submitting state or settled-validation state changes.
pub type ChangeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Submit function configured on a binder.
pub type SubmitFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Option<Value>, EndpointError>> + Send + Sync>;

/// Configuration of a [`Binder`](super::Binder).
///
/// # Example
///
/// ```ignore
/// let config = BinderConfig::new()
///     .on_change(|_old| wakeup.send())
///     .on_submit(|person| async move { client.save_person(person).await });
/// ```
#[derive(Clone, Default)]
pub struct BinderConfig {
    pub(crate) on_change: Option<ChangeCallback>,
    pub(crate) on_submit: Option<SubmitFn>,
}

impl BinderConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the change callback.
    pub fn on_change<F>(mut self, on_change: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    /// Set the function used by [`Binder::submit`](super::Binder::submit).
    pub fn on_submit<F, Fut>(mut self, on_submit: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, EndpointError>> + Send + 'static,
    {
        self.on_submit = Some(Arc::new(move |value| on_submit(value).boxed()));
        self
    }
}

impl fmt::Debug for BinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderConfig")
            .field("on_change", &self.on_change.is_some())
            .field("on_submit", &self.on_submit.is_some())
            .finish()
    }
}
