//! Per-invocation execution context.

use std::collections::BTreeMap;

use crate::Value;

/// Resolved inputs for one command invocation.
///
/// Built by the engine after flag parsing and argument binding, passed to
/// the action callable, and discarded when the call returns. Flag values
/// are already typed; positional arguments stay raw string tokens.
///
/// # Examples
///
/// ```
/// use chore_core::{ExecutionContext, Value};
///
/// let mut ctx = ExecutionContext::default();
/// ctx.set_flag("verbose", Value::Bool(true));
/// ctx.bind_arg("target", "frontend");
/// ctx.push_rest("extra-token");
///
/// assert_eq!(ctx.flag("verbose"), Some(&Value::Bool(true)));
/// assert_eq!(ctx.arg("target"), Some("frontend"));
/// assert_eq!(ctx.rest(), &["extra-token".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    flags: BTreeMap<String, Value>,
    args: Vec<(String, String)>,
    rest: Vec<String>,
    rest_name: Option<String>,
}

impl ExecutionContext {
    /// Sets a resolved flag value.
    pub fn set_flag(&mut self, name: impl Into<String>, value: Value) {
        self.flags.insert(name.into(), value);
    }

    /// Binds a positional token to its declared name, preserving order.
    pub fn bind_arg(&mut self, name: impl Into<String>, token: impl Into<String>) {
        self.args.push((name.into(), token.into()));
    }

    /// Appends a token to the variadic overflow.
    pub fn push_rest(&mut self, token: impl Into<String>) {
        self.rest.push(token.into());
    }

    /// Typed value of a declared flag.
    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    /// All resolved flags.
    pub fn flags(&self) -> &BTreeMap<String, Value> {
        &self.flags
    }

    /// Token bound to a declared positional argument.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Named bindings in declaration order.
    pub fn args(&self) -> &[(String, String)] {
        &self.args
    }

    /// Overflow tokens captured by the variadic slot.
    pub fn rest(&self) -> &[String] {
        &self.rest
    }

    /// Names the variadic slot so hosts can expose the overflow under the
    /// declared argument name as well.
    pub fn set_rest_name(&mut self, name: impl Into<String>) {
        self.rest_name = Some(name.into());
    }

    /// Declared name of the variadic slot, if any.
    pub fn rest_name(&self) -> Option<&str> {
        self.rest_name.as_deref()
    }
}
