//! Validators and in-flight validation handles.
//!
//! Validators are attached to [`Model`](crate::model::Model) positions and run
//! by the [`Binder`](crate::Binder) whenever a node asks for validation. Both
//! synchronous and asynchronous rules are supported:
//!
//! ```
//! use form_binder::model::Model;
//! use form_binder::validation::{AsyncRule, MinLength, Required};
//! use serde_json::Value;
//!
//! let username = Model::string()
//!     .validator(Required::new("Username is required"))
//!     .validator(MinLength::new(3, "Username must be at least 3 characters"))
//!     .validator(AsyncRule::new("Username is taken", |value: Value| async move {
//!         value != "admin"
//!     }));
//! ```

mod pending;
mod validator;

pub use pending::PendingValidation;
pub use validator::{
    AsyncRule, Checked, Email, MaxLength, MinLength, Pattern, Required, Rule, ServerValidator,
    Validator,
};

pub(crate) use validator::ValidatorKey;
