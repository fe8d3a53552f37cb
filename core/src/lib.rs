//! Core types for the `chore` task runner.
//!
//! This crate defines the foundational pieces shared by the engine, the
//! runtime builtins, and the script adapter:
//!
//! - [`Value`] — the host-native value representation, with the conversion
//!   boundary ([`ConversionError`]) where script values become typed native
//!   values exactly once.
//! - [`CliSpec`], [`CommandSpec`], [`FlagSpec`], [`ArgSpec`] — the
//!   declaration data model populated during script evaluation.
//! - [`Registry`] — the mutable registration session with fail-fast
//!   validation, frozen into a [`FrozenRegistry`] before any command runs.
//! - [`ExecutionContext`] — resolved flags and arguments for one
//!   invocation.
//! - [`ActionInvoker`] — the interpreter boundary: a registered action is
//!   an opaque [`ActionHandle`], called only through the host that
//!   registered it. [`NativeActions`] implements the trait over Rust
//!   closures.
//!
//! # Example
//!
//! ```
//! use chore_core::*;
//!
//! let mut registry = Registry::new();
//! registry.set_cli(CliSpec::new("demo", "demo project tasks")).unwrap();
//!
//! let mut actions = NativeActions::new();
//! let handle = actions.register(|_ctx| Ok(Value::Bool(true)));
//!
//! registry.add_command(
//!     CommandSpec::new("test")
//!         .with_usage("run the test suite")
//!         .with_flag(FlagSpec::boolean("short").with_default(Value::Bool(true)))
//!         .with_action(handle),
//! ).unwrap();
//!
//! let frozen = registry.freeze();
//! assert_eq!(frozen.commands().len(), 1);
//! ```

mod context;
mod host;
mod registry;
mod types;
mod value;

pub use context::ExecutionContext;
pub use host::{ActionError, ActionInvoker, NativeActions};
pub use registry::{
    FrozenRegistry, RegisteredCommand, Registry, RegistryError, args_error,
};
pub use types::{
    ActionHandle, ArgSpec, ArgSpecError, CliSpec, CommandSpec, FlagKind, FlagSpec,
};
pub use value::{ConversionError, Value};
