//! Starlark adapter for `chore`.
//!
//! The scripting language itself is the [`starlark`] crate; this crate is
//! the boundary around it:
//!
//! - [`bridge`] — converting Starlark values to and from the host-native
//!   [`chore_core::Value`], exactly once per crossing.
//! - [`chore_globals`](globals) — the builtins registered into every
//!   script: `cli`, `command`, `sub_command`, `shell`, `cache`,
//!   `cache_get`, `cache_put`, `cache_remove`, `template`, `spawn`,
//!   `wait`, plus the `current_dir` constant.
//! - [`Session`] — load → evaluate → freeze; the frozen module and its
//!   action values live for the process lifetime, and the session
//!   implements [`chore_core::ActionInvoker`] so the engine can dispatch
//!   into scripts without knowing Starlark exists.
//!
//! Script evaluation is single-threaded and finishes before any command
//! runs; spawned tasks call frozen module-level functions on their own
//! threads with fresh evaluators.

mod bridge;
mod globals;
mod session;

pub use bridge::{alloc_native, to_native, to_native_return};
pub use session::{ScriptError, Services, Session};
