//! Reactive value binding and validation for structured form data.
//!
//! A [`Binder`] tracks a mutable current value against an immutable default
//! snapshot, exposes per-position [`BinderNode`]s with value, dirty, visited
//! and error state, runs synchronous and asynchronous validators without ever
//! running the same (node, validator) pair twice concurrently, and only
//! submits once every outstanding validation has settled.
//!
//! # Example
//!
//! ```ignore
//! use form_binder::prelude::*;
//!
//! let person = Model::object("Person")
//!     .field("name", Model::string().validator(Required::new("Name is required")));
//!
//! let binder = Binder::new(person, BinderConfig::new());
//! let name = binder.root().field("name")?;
//!
//! name.set_visited(true);
//! name.validate().await;
//! assert!(name.invalid());
//!
//! name.set_value("Jane".into());
//! name.validate().await;
//! assert!(binder.errors().is_empty());
//!
//! binder.submit_to(|person| async move { save(person).await }).await?;
//! ```

mod batch;
mod binder;
pub mod error;
mod ledger;
pub mod model;
pub mod server;
mod utils;
pub mod validation;

pub use binder::{Binder, BinderConfig, BinderId, BinderNode, ChangeCallback, SubmitFn};
pub use error::{BinderError, ValidationError, ValueError};
pub use serde_json::Value;

pub mod prelude {
    pub use crate::binder::{Binder, BinderConfig, BinderNode};
    pub use crate::error::{BinderError, ValidationError, ValueError};
    pub use crate::model::{Model, ModelPath, ModelRef, PathKey};
    pub use crate::server::{EndpointError, ValidationErrorData};
    pub use crate::validation::{
        AsyncRule, Checked, Email, MaxLength, MinLength, Pattern, PendingValidation, Required,
        Rule, Validator,
    };
    pub use serde_json::Value;
}
