//! Mutable registration session for CLI and command declarations.
//!
//! A [`Registry`] is populated single-threaded while the script evaluates,
//! validating every insertion so that a broken declaration fails before any
//! command can run. [`Registry::freeze`] consumes it into a read-only
//! [`FrozenRegistry`] for the compiler; nothing can be registered after
//! that point.

use std::collections::HashSet;

use thiserror::Error;

use crate::{ArgSpecError, CliSpec, CommandSpec};

/// Registration-time errors.
///
/// All of these are fatal: the process must not compile a CLI tree from a
/// partially-invalid registry. Each variant carries enough context (command
/// path, offending flag) to fix the script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `cli(...)` was called more than once.
    #[error("cli() already registered as `{existing}`")]
    DuplicateCli {
        /// Name passed to the first `cli()` call.
        existing: String,
    },
    /// A command name collides within the same parent scope.
    #[error("duplicate command `{path}`")]
    DuplicateCommand {
        /// Fully-qualified, space-joined path of the colliding command.
        path: String,
    },
    /// A flag declaration is invalid.
    #[error("command `{path}`: invalid flag `{flag}`: {reason}")]
    InvalidFlag {
        path: String,
        flag: String,
        reason: String,
    },
    /// A positional-argument declaration is invalid.
    #[error("command `{path}`: invalid args: {reason}")]
    InvalidArgs { path: String, reason: String },
    /// A subcommand path names a parent that was never registered.
    #[error("command `{path}`: parent `{parent}` is not registered")]
    UnknownParent { path: String, parent: String },
}

/// One registered command with its fully-qualified path.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredCommand {
    /// Path segments from the root, e.g. `["db", "migrate"]`.
    pub path: Vec<String>,
    /// The declaration.
    pub spec: CommandSpec,
}

impl RegisteredCommand {
    /// Space-joined path, as shown in errors and help.
    pub fn display_path(&self) -> String {
        self.path.join(" ")
    }
}

/// Mutable registration session.
///
/// # Examples
///
/// ```
/// use chore_core::{CliSpec, CommandSpec, Registry};
///
/// let mut registry = Registry::new();
/// registry.set_cli(CliSpec::new("demo", "demo project tasks")).unwrap();
/// registry.add_command(CommandSpec::new("build")).unwrap();
/// let frozen = registry.freeze();
/// assert_eq!(frozen.commands().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    cli: Option<CliSpec>,
    commands: Vec<RegisteredCommand>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the root CLI descriptor. Callable at most once.
    pub fn set_cli(&mut self, cli: CliSpec) -> Result<(), RegistryError> {
        if let Some(existing) = &self.cli {
            return Err(RegistryError::DuplicateCli {
                existing: existing.name.clone(),
            });
        }
        self.cli = Some(cli);
        Ok(())
    }

    /// Registers a top-level command.
    pub fn add_command(&mut self, spec: CommandSpec) -> Result<(), RegistryError> {
        let path = vec![spec.name.clone()];
        self.insert(path, spec)
    }

    /// Registers a nested command at `path`; every ancestor must already be
    /// registered. The last path segment must equal `spec.name`.
    pub fn add_subcommand(
        &mut self,
        path: Vec<String>,
        spec: CommandSpec,
    ) -> Result<(), RegistryError> {
        if path.len() > 1 {
            let parent = &path[..path.len() - 1];
            if !self.commands.iter().any(|c| c.path == parent) {
                return Err(RegistryError::UnknownParent {
                    path: path.join(" "),
                    parent: parent.join(" "),
                });
            }
        }
        self.insert(path, spec)
    }

    fn insert(&mut self, path: Vec<String>, spec: CommandSpec) -> Result<(), RegistryError> {
        let display = path.join(" ");
        if self.commands.iter().any(|c| c.path == path) {
            return Err(RegistryError::DuplicateCommand { path: display });
        }
        validate_flags(&display, &spec)?;
        self.commands.push(RegisteredCommand { path, spec });
        Ok(())
    }

    /// Whether any declaration has been made yet.
    pub fn is_empty(&self) -> bool {
        self.cli.is_none() && self.commands.is_empty()
    }

    /// Ends the registration phase. The result is immutable.
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry {
            cli: self.cli,
            commands: self.commands,
        }
    }
}

/// Validates an [`ArgSpecError`] into the registry taxonomy.
pub fn args_error(path: &str, err: ArgSpecError) -> RegistryError {
    RegistryError::InvalidArgs {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

fn validate_flags(path: &str, spec: &CommandSpec) -> Result<(), RegistryError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for flag in &spec.flags {
        if flag.name.is_empty() {
            return Err(RegistryError::InvalidFlag {
                path: path.to_string(),
                flag: "<empty>".to_string(),
                reason: "flag name cannot be empty".to_string(),
            });
        }
        if !seen.insert(flag.name.as_str()) {
            return Err(RegistryError::InvalidFlag {
                path: path.to_string(),
                flag: flag.name.clone(),
                reason: "duplicate flag name".to_string(),
            });
        }
        if let Some(default) = &flag.default {
            if !flag.kind.admits(default) {
                return Err(RegistryError::InvalidFlag {
                    path: path.to_string(),
                    flag: flag.name.clone(),
                    reason: format!(
                        "default of type `{}` does not match declared type `{}`",
                        default.type_name(),
                        flag.kind.name()
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Read-only registry, produced by [`Registry::freeze`].
///
/// The compiler consumes this; during command execution nothing can mutate
/// it, so it needs no locking.
#[derive(Debug, Default)]
pub struct FrozenRegistry {
    cli: Option<CliSpec>,
    commands: Vec<RegisteredCommand>,
}

impl FrozenRegistry {
    /// The root descriptor, if `cli(...)` was called.
    pub fn cli(&self) -> Option<&CliSpec> {
        self.cli.as_ref()
    }

    /// All registered commands in declaration order.
    pub fn commands(&self) -> &[RegisteredCommand] {
        &self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgSpec, FlagKind, FlagSpec, Value};

    #[test]
    fn test_set_cli_twice_fails() {
        let mut registry = Registry::new();
        registry.set_cli(CliSpec::new("one", "")).unwrap();
        let err = registry.set_cli(CliSpec::new("two", "")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateCli {
                existing: "one".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_command_fails_regardless_of_order() {
        let mut registry = Registry::new();
        registry.add_command(CommandSpec::new("test")).unwrap();
        registry.add_command(CommandSpec::new("build")).unwrap();
        let err = registry.add_command(CommandSpec::new("test")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateCommand {
                path: "test".to_string()
            }
        );
    }

    #[test]
    fn test_same_name_under_different_parents_is_allowed() {
        let mut registry = Registry::new();
        registry.add_command(CommandSpec::new("db")).unwrap();
        registry.add_command(CommandSpec::new("cache")).unwrap();
        registry
            .add_subcommand(
                vec!["db".into(), "status".into()],
                CommandSpec::new("status"),
            )
            .unwrap();
        registry
            .add_subcommand(
                vec!["cache".into(), "status".into()],
                CommandSpec::new("status"),
            )
            .unwrap();
    }

    #[test]
    fn test_subcommand_requires_registered_parent() {
        let mut registry = Registry::new();
        let err = registry
            .add_subcommand(
                vec!["db".into(), "migrate".into()],
                CommandSpec::new("migrate"),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownParent {
                path: "db migrate".to_string(),
                parent: "db".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_flag_name_fails() {
        let mut registry = Registry::new();
        let spec = CommandSpec::new("build")
            .with_flag(FlagSpec::boolean("fast"))
            .with_flag(FlagSpec::new("fast", FlagKind::Str));
        let err = registry.add_command(spec).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFlag { ref flag, .. } if flag == "fast"));
    }

    #[test]
    fn test_default_type_mismatch_fails() {
        let mut registry = Registry::new();
        let spec = CommandSpec::new("build")
            .with_flag(FlagSpec::new("jobs", FlagKind::Int).with_default(Value::Str("4".into())));
        let err = registry.add_command(spec).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidFlag { ref reason, .. } if reason.contains("does not match")
        ));
    }

    #[test]
    fn test_freeze_preserves_declaration_order() {
        let mut registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.add_command(CommandSpec::new(name)).unwrap();
        }
        let frozen = registry.freeze();
        let names: Vec<_> = frozen
            .commands()
            .iter()
            .map(|c| c.spec.name.as_str())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_variadic_args_validated_through_arg_spec() {
        let err = ArgSpec::from_names(["rest...", "x"]).unwrap_err();
        let err = args_error("build", err);
        assert!(matches!(err, RegistryError::InvalidArgs { .. }));
    }
}
