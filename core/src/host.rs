//! The interpreter boundary: invoking registered actions.
//!
//! The engine never holds script callables directly. It resolves an
//! [`ActionHandle`] through whatever [`ActionInvoker`] registered it — the
//! Starlark session in the `chore` binary, or [`NativeActions`] for
//! embedders and tests.

use thiserror::Error;

use crate::{ActionHandle, ExecutionContext, Value};

/// Failure reported by an action callable or the host invoking it.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// The callable itself raised an error.
    #[error("{message}")]
    Raised {
        /// Human-readable failure, as reported by the script runtime.
        message: String,
    },
    /// The handle does not resolve to a callable on this host.
    #[error("no action registered for handle {0:?}")]
    UnknownHandle(ActionHandle),
}

impl ActionError {
    /// Wraps a script-raised failure message.
    pub fn raised(message: impl Into<String>) -> Self {
        ActionError::Raised {
            message: message.into(),
        }
    }
}

/// Host capability to call a registered action with a resolved context.
///
/// Implementations must treat the handle as opaque: no introspection, no
/// serialization, just invocation.
pub trait ActionInvoker {
    /// Calls the action bound to `handle` with `ctx`.
    fn invoke(&self, handle: ActionHandle, ctx: &ExecutionContext) -> Result<Value, ActionError>;
}

type NativeAction = Box<dyn Fn(&ExecutionContext) -> Result<Value, ActionError> + Send + Sync>;

/// [`ActionInvoker`] over plain Rust closures.
///
/// Lets a host binary define commands natively, and gives tests an
/// interpreter-free way to drive the engine.
///
/// # Examples
///
/// ```
/// use chore_core::{ActionInvoker, ExecutionContext, NativeActions, Value};
///
/// let mut actions = NativeActions::new();
/// let handle = actions.register(|ctx| {
///     Ok(Value::from(ctx.rest().len() as i64))
/// });
///
/// let ctx = ExecutionContext::default();
/// assert_eq!(actions.invoke(handle, &ctx).unwrap(), Value::Int(0));
/// ```
#[derive(Default)]
pub struct NativeActions {
    actions: Vec<NativeAction>,
}

impl NativeActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure and returns its opaque handle.
    pub fn register<F>(&mut self, action: F) -> ActionHandle
    where
        F: Fn(&ExecutionContext) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        let handle = ActionHandle::new(self.actions.len() as u32);
        self.actions.push(Box::new(action));
        handle
    }
}

impl ActionInvoker for NativeActions {
    fn invoke(&self, handle: ActionHandle, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let action = self
            .actions
            .get(handle.index() as usize)
            .ok_or(ActionError::UnknownHandle(handle))?;
        action(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_handle_is_an_error() {
        let actions = NativeActions::new();
        let err = actions
            .invoke(ActionHandle::new(7), &ExecutionContext::default())
            .unwrap_err();
        assert!(matches!(err, ActionError::UnknownHandle(_)));
    }

    #[test]
    fn test_registered_action_sees_context() {
        let mut actions = NativeActions::new();
        let handle = actions.register(|ctx| {
            let target = ctx.arg("target").unwrap_or("none").to_string();
            Ok(Value::Str(target))
        });

        let mut ctx = ExecutionContext::default();
        ctx.bind_arg("target", "docs");
        assert_eq!(
            actions.invoke(handle, &ctx).unwrap(),
            Value::Str("docs".to_string())
        );
    }
}
