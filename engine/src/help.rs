//! Deterministic help-text generation.
//!
//! Help is a pure function of the compiled tree: same registry, same
//! bytes, so snapshots stay stable. Usage strings concatenate top-down —
//! CLI usage, then command listing, then per-command flags and args.

use std::fmt::Write;

use crate::{CommandNode, CommandTree};

/// Renders the root help: program line, usage skeleton, and the command
/// listing grouped by category (declaration order within each group).
pub fn render_root(tree: &CommandTree) -> String {
    let mut out = String::new();
    let name = tree.program_name();

    match tree.cli() {
        Some(cli) if !cli.usage.is_empty() => {
            let _ = writeln!(out, "{} - {}", cli.name, cli.usage);
        }
        _ => {
            let _ = writeln!(out, "{name}");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "  {name} <command> [flags] [args]");

    let mut listing: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for root in tree.roots() {
        collect_listing(root, &mut Vec::new(), &mut listing);
    }
    if listing.is_empty() {
        return out;
    }

    let width = listing
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .map(|(path, _)| path.len())
        .max()
        .unwrap_or(0);

    for (category, rows) in listing {
        let _ = writeln!(out);
        let _ = writeln!(out, "{category}:");
        for (path, usage) in rows {
            if usage.is_empty() {
                let _ = writeln!(out, "  {path}");
            } else {
                let _ = writeln!(out, "  {path:width$}  {usage}");
            }
        }
    }
    out
}

/// Renders help for one command: usage line with flags/args placeholders,
/// description, declared flags with defaults, declared arguments, and
/// direct subcommands.
pub fn render_command(tree: &CommandTree, node: &CommandNode, path: &[String]) -> String {
    let mut out = String::new();
    let name = tree.program_name();
    let joined = path.join(" ");

    let mut usage_line = format!("  {name} {joined}");
    if !node.flags.is_empty() {
        usage_line.push_str(" [flags]");
    }
    for required in node.args.required() {
        let _ = write!(usage_line, " <{required}>");
    }
    if let Some(variadic) = node.args.variadic() {
        let _ = write!(usage_line, " [{variadic}...]");
    }
    if !node.children().is_empty() {
        usage_line.push_str(" [subcommand]");
    }

    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "{usage_line}");
    if !node.usage.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", node.usage);
    }

    if !node.flags.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Flags:");
        let width = node
            .flags
            .iter()
            .map(|f| f.name.len() + f.kind.name().len() + 3)
            .max()
            .unwrap_or(0);
        for flag in &node.flags {
            let head = format!("--{} {}", flag.name, flag.kind.name());
            let mut line = format!("  {head:width$}  {}", flag.usage);
            if let Some(default) = &flag.default {
                let _ = write!(line, " (default: {default})");
            }
            let _ = writeln!(out, "{}", line.trim_end());
        }
    }

    if !node.children().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Subcommands:");
        let width = node
            .children()
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0);
        for child in node.children() {
            if child.usage.is_empty() {
                let _ = writeln!(out, "  {}", child.name);
            } else {
                let _ = writeln!(out, "  {:width$}  {}", child.name, child.usage);
            }
        }
    }

    out
}

fn collect_listing(
    node: &CommandNode,
    prefix: &mut Vec<String>,
    listing: &mut Vec<(String, Vec<(String, String)>)>,
) {
    prefix.push(node.name.clone());
    let category = node
        .category
        .clone()
        .unwrap_or_else(|| "Commands".to_string());
    let row = (prefix.join(" "), node.usage.clone());
    match listing.iter_mut().find(|(c, _)| *c == category) {
        Some((_, rows)) => rows.push(row),
        None => listing.push((category, vec![row])),
    }
    for child in node.children() {
        collect_listing(child, prefix, listing);
    }
    prefix.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chore_core::{ArgSpec, CliSpec, CommandSpec, FlagKind, FlagSpec, Registry, Value};

    fn sample_tree() -> CommandTree {
        let mut registry = Registry::new();
        registry
            .set_cli(CliSpec::new("demo", "tasks for the demo project"))
            .unwrap();
        registry
            .add_command(
                CommandSpec::new("test")
                    .with_usage("run the test suite")
                    .with_flag(
                        FlagSpec::boolean("short")
                            .with_default(Value::Bool(true))
                            .with_usage("skip slow tests"),
                    ),
            )
            .unwrap();
        registry
            .add_command(
                CommandSpec::new("release")
                    .with_usage("cut a release")
                    .with_category("publishing")
                    .with_args(ArgSpec::from_names(["version"]).unwrap())
                    .with_flag(FlagSpec::new("jobs", FlagKind::Int).with_default(Value::Int(2))),
            )
            .unwrap();
        CommandTree::compile(registry.freeze())
    }

    #[test]
    fn test_root_help_is_deterministic() {
        let tree = sample_tree();
        assert_eq!(render_root(&tree), render_root(&tree));
    }

    #[test]
    fn test_root_help_groups_by_category() {
        let tree = sample_tree();
        let help = render_root(&tree);
        assert!(help.contains("demo - tasks for the demo project"));
        assert!(help.contains("Commands:"));
        assert!(help.contains("publishing:"));
        let commands_at = help.find("Commands:").unwrap();
        let publishing_at = help.find("publishing:").unwrap();
        assert!(commands_at < publishing_at);
    }

    #[test]
    fn test_command_help_shows_flags_and_args() {
        let tree = sample_tree();
        let tokens = vec!["release".to_string()];
        let (node, _) = tree.resolve(&tokens).unwrap();
        let help = render_command(&tree, node, &tokens);
        assert!(help.contains("demo release [flags] <version>"));
        assert!(help.contains("--jobs int"));
        assert!(help.contains("(default: 2)"));
    }
}
