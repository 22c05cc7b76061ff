//! Error types

mod binder;
mod validation;
mod value;

pub use binder::*;
pub use validation::*;
pub use value::*;
