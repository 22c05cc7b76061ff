//! Validator trait and built-in rules.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;

/// A unit of validation logic over the value of one node.
///
/// Validators resolve to `true` when the value is acceptable. Synchronous
/// validators return an already completed future; asynchronous ones (e.g. a
/// uniqueness check against a service) may take as long as they need.
///
/// A validator's identity is the address of its `Arc`: the same instance
/// attached to two positions yields two independent validations.
pub trait Validator: Send + Sync {
    /// Message reported when the value is rejected.
    fn message(&self) -> &str;

    /// Checks `value`.
    fn validate(&self, value: &Value) -> BoxFuture<'static, bool>;
}

/// Identity of a validator within the validation ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ValidatorKey(usize);

impl ValidatorKey {
    pub(crate) fn of(validator: &Arc<dyn Validator>) -> Self {
        Self(Arc::as_ptr(validator) as *const () as usize)
    }
}

fn verdict(valid: bool) -> BoxFuture<'static, bool> {
    futures::future::ready(valid).boxed()
}

// =============================================================================
// Built-in rules
// =============================================================================

/// Requires a value: rejects `null`, blank strings and empty arrays.
#[derive(Debug, Clone)]
pub struct Required {
    message: String,
}

impl Required {
    /// Creates the rule with a failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator for Required {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        let present = match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        };
        verdict(present)
    }
}

/// Length of a string in characters, or of an array in items.
fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Requires a minimum length (characters for strings, items for arrays).
#[derive(Debug, Clone)]
pub struct MinLength {
    min: usize,
    message: String,
}

impl MinLength {
    /// Creates the rule with a failure message.
    pub fn new(min: usize, message: impl Into<String>) -> Self {
        Self {
            min,
            message: message.into(),
        }
    }
}

impl Validator for MinLength {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        verdict(length_of(value).is_some_and(|len| len >= self.min))
    }
}

/// Requires a maximum length (characters for strings, items for arrays).
#[derive(Debug, Clone)]
pub struct MaxLength {
    max: usize,
    message: String,
}

impl MaxLength {
    /// Creates the rule with a failure message.
    pub fn new(max: usize, message: impl Into<String>) -> Self {
        Self {
            max,
            message: message.into(),
        }
    }
}

impl Validator for MaxLength {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        verdict(length_of(value).is_none_or(|len| len <= self.max))
    }
}

/// Requires a string value to match a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    message: String,
}

impl Pattern {
    /// Compiles `pattern` into a rule.
    pub fn new(pattern: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            message: message.into(),
        })
    }
}

impl Validator for Pattern {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        verdict(value.as_str().is_some_and(|s| self.regex.is_match(s)))
    }
}

/// Requires a valid email address. Empty strings pass; combine with
/// [`Required`] for mandatory fields.
#[derive(Debug, Clone)]
pub struct Email {
    message: String,
}

impl Email {
    /// Creates the rule with a failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator for Email {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        let valid = match value.as_str() {
            Some("") => true,
            Some(s) => email_address::EmailAddress::is_valid(s),
            None => false,
        };
        verdict(valid)
    }
}

/// Requires a boolean value to be `true`.
#[derive(Debug, Clone)]
pub struct Checked {
    message: String,
}

impl Checked {
    /// Creates the rule with a failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator for Checked {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        verdict(value.as_bool() == Some(true))
    }
}

/// A custom synchronous rule.
pub struct Rule<F> {
    check: F,
    message: String,
}

impl<F> Rule<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    /// Creates a rule that passes when `check` returns `true`.
    pub fn new(message: impl Into<String>, check: F) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl<F> Validator for Rule<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        verdict((self.check)(value))
    }
}

/// A custom asynchronous rule.
///
/// # Example
///
/// ```ignore
/// let unique = AsyncRule::new("Username is taken", |value| async move {
///     !directory.exists(value.as_str().unwrap_or_default()).await
/// });
/// ```
pub struct AsyncRule<F> {
    check: F,
    message: String,
}

impl<F, Fut> AsyncRule<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    /// Creates a rule that passes when the future returned by `check`
    /// resolves to `true`.
    pub fn new(message: impl Into<String>, check: F) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl<F, Fut> Validator for AsyncRule<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        (self.check)(value.clone()).boxed()
    }
}

/// Carries a rejection reported by the submit endpoint.
///
/// Never fails on its own; it only exists so server-side errors have a
/// validator and message like every local error.
#[derive(Debug, Clone)]
pub struct ServerValidator {
    message: String,
}

impl ServerValidator {
    /// Wraps a server-provided message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator for ServerValidator {
    fn message(&self) -> &str {
        &self.message
    }

    fn validate(&self, _value: &Value) -> BoxFuture<'static, bool> {
        verdict(true)
    }
}
