//! Command tree compilation and invocation dispatch for `chore`.
//!
//! This crate turns a frozen [`chore_core::Registry`] into a runnable CLI
//! surface:
//!
//! - [`CommandTree`] — the executable tree, compiled once at startup, with
//!   longest-prefix resolution and the completion table.
//! - [`parse_flags`] — typed flag parsing (`--name=value` / `--name value`,
//!   defaults, repetition for list flags).
//! - [`build_context`] — flag parsing plus positional binding into an
//!   [`chore_core::ExecutionContext`].
//! - [`help`] — deterministic usage-text generation.
//! - [`Engine`] — the dispatch loop with the exit-code policy
//!   ([`EXIT_SUCCESS`] / [`EXIT_FAILURE`] / [`EXIT_USAGE`]).
//!
//! Actions are invoked through [`chore_core::ActionInvoker`]; the engine
//! itself never touches the scripting runtime.

pub mod help;

mod context;
mod error;
mod exec;
mod parser;
mod tree;

pub use context::build_context;
pub use error::UsageError;
pub use exec::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE, Engine, Outcome};
pub use parser::{ParsedFlags, parse_flags};
pub use tree::{CommandNode, CommandTree, CompletionEntry};
