//! Invocation dispatch: resolve, build context, invoke, map to exit codes.

use chore_core::{ActionError, ActionInvoker, FrozenRegistry, Value};
use tracing::debug;

use crate::{CommandTree, UsageError, build_context, help};

/// Exit code for a successful invocation (including help requests).
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for an action that ran and failed.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for usage errors: unknown command/flag, wrong arity.
pub const EXIT_USAGE: i32 = 2;

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum Outcome {
    /// The action ran and returned normally.
    Success(Value),
    /// Help was requested (or the invocation was empty); the text is the
    /// generated usage to print.
    Help(String),
    /// The argument vector could not be mapped onto the command tree. The
    /// help text gives the user guidance next to the error.
    Usage {
        error: UsageError,
        help: String,
    },
    /// The action (or a builtin it called) failed.
    Failure(ActionError),
}

impl Outcome {
    /// The process exit code this outcome maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success(_) | Outcome::Help(_) => EXIT_SUCCESS,
            Outcome::Usage { .. } => EXIT_USAGE,
            Outcome::Failure(_) => EXIT_FAILURE,
        }
    }
}

/// The execution engine: a compiled tree plus the dispatch loop.
///
/// Construction compiles the tree once; after that the engine is
/// read-only and every invocation walks
/// resolve → context → invoke → outcome.
///
/// # Examples
///
/// ```
/// use chore_core::{CommandSpec, NativeActions, Registry, Value};
/// use chore_engine::{Engine, Outcome};
///
/// let mut actions = NativeActions::new();
/// let handle = actions.register(|_ctx| Ok(Value::Bool(true)));
///
/// let mut registry = Registry::new();
/// registry.add_command(CommandSpec::new("ok").with_action(handle)).unwrap();
///
/// let engine = Engine::new(registry.freeze());
/// let outcome = engine.run(&["ok".to_string()], &actions);
/// assert_eq!(outcome.exit_code(), 0);
/// ```
pub struct Engine {
    tree: CommandTree,
}

impl Engine {
    /// Compiles the frozen registry into the executable tree.
    pub fn new(registry: FrozenRegistry) -> Self {
        Self {
            tree: CommandTree::compile(registry),
        }
    }

    /// The compiled tree, for completion listings and help rendering.
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Dispatches one invocation.
    ///
    /// `argv` is the token vector after host flags are stripped. The
    /// engine performs no retries; failure policy belongs to the action.
    pub fn run(&self, argv: &[String], invoker: &dyn ActionInvoker) -> Outcome {
        if argv.is_empty() || is_help_token(&argv[0]) {
            return Outcome::Help(help::render_root(&self.tree));
        }

        let (node, consumed) = match self.tree.resolve(argv) {
            Ok(resolved) => resolved,
            Err(error) => {
                return Outcome::Usage {
                    error,
                    help: help::render_root(&self.tree),
                };
            }
        };
        let path = &argv[..consumed];
        let remaining = &argv[consumed..];

        if remaining.iter().any(|t| is_help_token(t)) {
            return Outcome::Help(help::render_command(&self.tree, node, path));
        }

        let Some(action) = node.action else {
            // Group node: nothing to invoke, show its subcommands.
            return Outcome::Help(help::render_command(&self.tree, node, path));
        };

        let ctx = match build_context(node, remaining) {
            Ok(ctx) => ctx,
            Err(error) => {
                return Outcome::Usage {
                    error,
                    help: help::render_command(&self.tree, node, path),
                };
            }
        };

        debug!(command = %path.join(" "), "invoking action");
        match invoker.invoke(action, &ctx) {
            Ok(value) => Outcome::Success(value),
            Err(error) => {
                debug!(command = %path.join(" "), error = %error, "action failed");
                Outcome::Failure(error)
            }
        }
    }
}

fn is_help_token(token: &str) -> bool {
    token == "--help" || token == "-h" || token == "help"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chore_core::{
        ArgSpec, CliSpec, CommandSpec, FlagSpec, NativeActions, Registry, Value,
    };

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn engine_and_actions() -> (Engine, NativeActions) {
        let mut actions = NativeActions::new();
        let ok = actions.register(|ctx| {
            Ok(ctx
                .flag("short")
                .cloned()
                .unwrap_or(Value::Bool(false)))
        });
        let fails = actions.register(|_ctx| Err(chore_core::ActionError::raised("boom")));

        let mut registry = Registry::new();
        registry
            .set_cli(CliSpec::new("demo", "demo tasks"))
            .unwrap();
        registry
            .add_command(
                CommandSpec::new("test")
                    .with_flag(FlagSpec::boolean("short").with_default(Value::Bool(true)))
                    .with_action(ok),
            )
            .unwrap();
        registry
            .add_command(CommandSpec::new("broken").with_action(fails))
            .unwrap();
        registry
            .add_command(
                CommandSpec::new("need-arg")
                    .with_args(ArgSpec::from_names(["target"]).unwrap())
                    .with_action(ok),
            )
            .unwrap();
        (Engine::new(registry.freeze()), actions)
    }

    #[test]
    fn test_empty_invocation_prints_root_help() {
        let (engine, actions) = engine_and_actions();
        let outcome = engine.run(&[], &actions);
        assert!(matches!(outcome, Outcome::Help(_)));
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_unknown_command_is_usage_error() {
        let (engine, actions) = engine_and_actions();
        let outcome = engine.run(&argv(&["deploy"]), &actions);
        assert_eq!(outcome.exit_code(), EXIT_USAGE);
        assert!(matches!(
            outcome,
            Outcome::Usage {
                error: UsageError::CommandNotFound { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_default_flag_reaches_action() {
        let (engine, actions) = engine_and_actions();
        match engine.run(&argv(&["test"]), &actions) {
            Outcome::Success(value) => assert_eq!(value, Value::Bool(true)),
            other => panic!("expected success, got {other:?}"),
        }
        match engine.run(&argv(&["test", "--short=false"]), &actions) {
            Outcome::Success(value) => assert_eq!(value, Value::Bool(false)),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_flag_exits_with_usage_code() {
        let (engine, actions) = engine_and_actions();
        let outcome = engine.run(&argv(&["test", "--bogus"]), &actions);
        assert_eq!(outcome.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_action_failure_exits_with_failure_code() {
        let (engine, actions) = engine_and_actions();
        let outcome = engine.run(&argv(&["broken"]), &actions);
        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_help_flag_after_command_prints_command_help() {
        let (engine, actions) = engine_and_actions();
        match engine.run(&argv(&["test", "--help"]), &actions) {
            Outcome::Help(text) => assert!(text.contains("demo test")),
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_positional_is_usage_error() {
        let (engine, actions) = engine_and_actions();
        let outcome = engine.run(&argv(&["need-arg"]), &actions);
        assert!(matches!(
            outcome,
            Outcome::Usage {
                error: UsageError::Arity { expected: 1, got: 0 },
                ..
            }
        ));
    }
}
