//! Executable command tree, compiled once from a frozen registry.

use chore_core::{ActionHandle, ArgSpec, CliSpec, FlagSpec, FrozenRegistry};

use crate::UsageError;

/// One node of the compiled tree.
#[derive(Debug)]
pub struct CommandNode {
    /// Name of this node (one path segment).
    pub name: String,
    /// One-line description.
    pub usage: String,
    /// Optional help-listing group.
    pub category: Option<String>,
    /// Bound action; `None` for pure group nodes.
    pub action: Option<ActionHandle>,
    /// Declared flags in declaration order.
    pub flags: Vec<FlagSpec>,
    /// Declared positional arguments.
    pub args: ArgSpec,
    children: Vec<CommandNode>,
}

impl CommandNode {
    fn from_spec(spec: chore_core::CommandSpec) -> Self {
        Self {
            name: spec.name,
            usage: spec.usage,
            category: spec.category,
            action: spec.action,
            flags: spec.flags,
            args: spec.args,
            children: Vec::new(),
        }
    }

    /// Child nodes in registration order.
    pub fn children(&self) -> &[CommandNode] {
        &self.children
    }

    /// Looks up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut CommandNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }
}

/// A completion-table entry: one invocable path and its flag names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEntry {
    /// Path segments from the root.
    pub path: Vec<String>,
    /// Declared flag names, without dashes.
    pub flags: Vec<String>,
}

/// The executable command tree.
///
/// Compiled exactly once, at startup, from the frozen registry; read-only
/// afterwards. Resolution is longest-prefix match over path segments.
///
/// # Examples
///
/// ```
/// use chore_core::{CommandSpec, Registry};
/// use chore_engine::CommandTree;
///
/// let mut registry = Registry::new();
/// registry.add_command(CommandSpec::new("db")).unwrap();
/// registry.add_subcommand(
///     vec!["db".into(), "migrate".into()],
///     CommandSpec::new("migrate"),
/// ).unwrap();
///
/// let tree = CommandTree::compile(registry.freeze());
/// let tokens = ["db".to_string(), "migrate".to_string(), "--dry".to_string()];
/// let (node, consumed) = tree.resolve(&tokens).unwrap();
/// assert_eq!(node.name, "migrate");
/// assert_eq!(consumed, 2);
/// ```
#[derive(Debug)]
pub struct CommandTree {
    cli: Option<CliSpec>,
    roots: Vec<CommandNode>,
}

impl CommandTree {
    /// Builds the tree from a frozen registry.
    ///
    /// The registry has already validated names, flags, and parent
    /// existence, so compilation itself cannot fail.
    pub fn compile(registry: FrozenRegistry) -> Self {
        let cli = registry.cli().cloned();
        let mut roots: Vec<CommandNode> = Vec::new();

        for registered in registry.commands() {
            let node = CommandNode::from_spec(registered.spec.clone());
            let parent_path = &registered.path[..registered.path.len() - 1];
            if parent_path.is_empty() {
                roots.push(node);
                continue;
            }
            let mut parent = roots
                .iter_mut()
                .find(|r| r.name == parent_path[0])
                .expect("registry guarantees parent registration");
            for segment in &parent_path[1..] {
                parent = parent
                    .child_mut(segment)
                    .expect("registry guarantees parent registration");
            }
            parent.children.push(node);
        }

        Self { cli, roots }
    }

    /// The root descriptor, if one was registered.
    pub fn cli(&self) -> Option<&CliSpec> {
        self.cli.as_ref()
    }

    /// Program name for usage lines.
    pub fn program_name(&self) -> &str {
        self.cli.as_ref().map(|c| c.name.as_str()).unwrap_or("chore")
    }

    /// Top-level commands in registration order.
    pub fn roots(&self) -> &[CommandNode] {
        &self.roots
    }

    /// Maps the leading tokens onto a command path, longest prefix first.
    ///
    /// Returns the matched node and how many tokens were consumed. Fails
    /// with [`UsageError::CommandNotFound`] when the first token matches no
    /// top-level command.
    pub fn resolve(&self, tokens: &[String]) -> Result<(&CommandNode, usize), UsageError> {
        let first = tokens.first().ok_or(UsageError::CommandNotFound {
            path: String::new(),
        })?;
        let mut node = self
            .roots
            .iter()
            .find(|r| &r.name == first)
            .ok_or_else(|| UsageError::CommandNotFound {
                path: first.clone(),
            })?;

        let mut consumed = 1;
        while let Some(next) = tokens.get(consumed) {
            match node.child(next) {
                Some(child) => {
                    node = child;
                    consumed += 1;
                }
                None => break,
            }
        }
        tracing::debug!(command = %tokens[..consumed].join(" "), "resolved command");
        Ok((node, consumed))
    }

    /// Derives the completion table: every invocable path with its flag
    /// names. Shell-specific script rendering is the consumer's concern.
    pub fn completion_entries(&self) -> Vec<CompletionEntry> {
        let mut entries = Vec::new();
        let mut path = Vec::new();
        for root in &self.roots {
            collect_completions(root, &mut path, &mut entries);
        }
        entries
    }
}

fn collect_completions(
    node: &CommandNode,
    path: &mut Vec<String>,
    entries: &mut Vec<CompletionEntry>,
) {
    path.push(node.name.clone());
    entries.push(CompletionEntry {
        path: path.clone(),
        flags: node.flags.iter().map(|f| f.name.clone()).collect(),
    });
    for child in node.children() {
        collect_completions(child, path, entries);
    }
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chore_core::{CommandSpec, FlagSpec, Registry};

    fn sample_tree() -> CommandTree {
        let mut registry = Registry::new();
        registry
            .add_command(CommandSpec::new("test").with_flag(FlagSpec::boolean("short")))
            .unwrap();
        registry.add_command(CommandSpec::new("db")).unwrap();
        registry
            .add_subcommand(
                vec!["db".into(), "migrate".into()],
                CommandSpec::new("migrate"),
            )
            .unwrap();
        CommandTree::compile(registry.freeze())
    }

    #[test]
    fn test_resolve_longest_prefix() {
        let tree = sample_tree();
        let tokens: Vec<String> = ["db", "migrate", "up"].iter().map(|s| s.to_string()).collect();
        let (node, consumed) = tree.resolve(&tokens).unwrap();
        assert_eq!(node.name, "migrate");
        // "up" is not a subcommand, it stays an argument token.
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_resolve_unknown_root_fails() {
        let tree = sample_tree();
        let tokens = vec!["deploy".to_string()];
        let err = tree.resolve(&tokens).unwrap_err();
        assert_eq!(
            err,
            UsageError::CommandNotFound {
                path: "deploy".to_string()
            }
        );
    }

    #[test]
    fn test_completion_entries_cover_all_paths() {
        let tree = sample_tree();
        let entries = tree.completion_entries();
        let paths: Vec<String> = entries.iter().map(|e| e.path.join(" ")).collect();
        assert_eq!(paths, ["test", "db", "db migrate"]);
        assert_eq!(entries[0].flags, ["short"]);
    }
}
