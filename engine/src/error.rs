//! Per-invocation usage errors.

use thiserror::Error;

/// Errors produced while mapping an argument vector onto the compiled
/// command tree.
///
/// These are usage guidance, not execution failures: the engine reports
/// them next to the relevant help text and exits with the usage-error
/// code, distinct from the code used for action failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The invocation path matches no registered command.
    #[error("unknown command `{path}`")]
    CommandNotFound {
        /// The unmatched token(s), space-joined.
        path: String,
    },
    /// A `--flag` token names no declared flag.
    #[error("unknown flag `--{flag}`")]
    UnknownFlag { flag: String },
    /// A flag value does not parse as the declared type.
    #[error("flag `--{flag}` expects a {expected} value, got `{value}`")]
    TypeMismatch {
        flag: String,
        expected: &'static str,
        value: String,
    },
    /// A value-taking flag appeared as the final token with no value.
    #[error("flag `--{flag}` is missing a value")]
    MissingValue { flag: String },
    /// Too few positional tokens for the declared argument names.
    #[error("expected {expected} positional argument(s), got {got}")]
    Arity { expected: usize, got: usize },
}
