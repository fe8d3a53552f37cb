//! Builds the execution context for a resolved command.

use chore_core::ExecutionContext;

use crate::{CommandNode, UsageError, parse_flags};

/// Runs flag parsing then argument binding for `node` over the tokens left
/// after command resolution.
///
/// Required positional names bind leftover tokens in order; surplus tokens
/// land in the overflow slot (named, when the command declares a variadic
/// argument). Fails with the parser's [`UsageError`]s or with
/// [`UsageError::Arity`] when required names stay unbound.
///
/// # Examples
///
/// ```
/// use chore_core::{ArgSpec, CommandSpec, Registry};
/// use chore_engine::{CommandTree, build_context};
///
/// let mut registry = Registry::new();
/// registry.add_command(
///     CommandSpec::new("greet")
///         .with_args(ArgSpec::from_names(["name", "titles..."]).unwrap()),
/// ).unwrap();
/// let tree = CommandTree::compile(registry.freeze());
///
/// let tokens: Vec<String> = ["ada", "dr", "prof"].iter().map(|s| s.to_string()).collect();
/// let (node, _) = tree.resolve(&["greet".to_string()]).unwrap();
/// let ctx = build_context(node, &tokens).unwrap();
/// assert_eq!(ctx.arg("name"), Some("ada"));
/// assert_eq!(ctx.rest(), &["dr".to_string(), "prof".to_string()]);
/// ```
pub fn build_context(node: &CommandNode, tokens: &[String]) -> Result<ExecutionContext, UsageError> {
    let parsed = parse_flags(&node.flags, tokens)?;

    let required = node.args.required();
    if parsed.positionals.len() < required.len() {
        return Err(UsageError::Arity {
            expected: required.len(),
            got: parsed.positionals.len(),
        });
    }

    let mut ctx = ExecutionContext::default();
    for (name, value) in parsed.values {
        ctx.set_flag(name, value);
    }
    let mut positionals = parsed.positionals.into_iter();
    for name in required {
        // Length checked above; each required name binds exactly one token.
        if let Some(token) = positionals.next() {
            ctx.bind_arg(name.as_str(), token);
        }
    }
    for token in positionals {
        ctx.push_rest(token);
    }
    if let Some(variadic) = node.args.variadic() {
        ctx.set_rest_name(variadic);
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandTree;
    use chore_core::{ArgSpec, CommandSpec, FlagSpec, Registry, Value};

    fn tree_with(spec: CommandSpec) -> CommandTree {
        let mut registry = Registry::new();
        registry.add_command(spec).unwrap();
        CommandTree::compile(registry.freeze())
    }

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_too_few_positionals_is_arity_error() {
        let tree = tree_with(
            CommandSpec::new("cp").with_args(ArgSpec::from_names(["src", "dst"]).unwrap()),
        );
        let (node, _) = tree.resolve(&tokens(&["cp"])).unwrap();
        let err = build_context(node, &tokens(&["only-src"])).unwrap_err();
        assert_eq!(err, UsageError::Arity { expected: 2, got: 1 });
    }

    #[test]
    fn test_flags_and_args_resolve_together() {
        let tree = tree_with(
            CommandSpec::new("build")
                .with_flag(FlagSpec::boolean("release"))
                .with_args(ArgSpec::from_names(["target"]).unwrap()),
        );
        let (node, _) = tree.resolve(&tokens(&["build"])).unwrap();
        let ctx = build_context(node, &tokens(&["--release", "frontend"])).unwrap();
        assert_eq!(ctx.flag("release"), Some(&Value::Bool(true)));
        assert_eq!(ctx.arg("target"), Some("frontend"));
        assert!(ctx.rest().is_empty());
    }

    #[test]
    fn test_variadic_slot_is_named() {
        let tree = tree_with(
            CommandSpec::new("fmt").with_args(ArgSpec::from_names(["files..."]).unwrap()),
        );
        let (node, _) = tree.resolve(&tokens(&["fmt"])).unwrap();
        let ctx = build_context(node, &tokens(&["a.rs", "b.rs"])).unwrap();
        assert_eq!(ctx.rest(), &["a.rs".to_string(), "b.rs".to_string()]);
        assert_eq!(ctx.rest_name(), Some("files"));
    }
}
