//! Declaration types for the command registry.
//!
//! These model what a script declares: the root CLI descriptor, commands,
//! their flags, and their positional arguments. They are plain data; no
//! action runs at declaration time.

use serde::{Deserialize, Serialize};

use crate::Value;

/// Root CLI descriptor, registered at most once per script evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliSpec {
    /// Program name shown in help and usage lines.
    pub name: String,
    /// Free-text usage line.
    pub usage: String,
}

impl CliSpec {
    pub fn new(name: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
        }
    }
}

/// Type of value a flag accepts.
///
/// # Examples
///
/// ```
/// use chore_core::FlagKind;
///
/// assert_eq!(FlagKind::Bool.name(), "bool");
/// assert!(FlagKind::parse("string").is_some());
/// assert!(FlagKind::parse("tuple").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// Boolean switch; an inline value (`--name=false`) is accepted.
    Bool,
    /// String value.
    Str,
    /// 64-bit signed integer value.
    Int,
    /// 64-bit float value.
    Float,
    /// Repeatable string value collected into a list.
    List,
}

impl FlagKind {
    /// Script-facing name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            FlagKind::Bool => "bool",
            FlagKind::Str => "string",
            FlagKind::Int => "int",
            FlagKind::Float => "float",
            FlagKind::List => "list",
        }
    }

    /// Parses a script-facing kind name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(FlagKind::Bool),
            "string" => Some(FlagKind::Str),
            "int" => Some(FlagKind::Int),
            "float" => Some(FlagKind::Float),
            "list" => Some(FlagKind::List),
            _ => None,
        }
    }

    /// The value bound when a flag is absent and declares no default.
    pub fn zero_value(&self) -> Value {
        match self {
            FlagKind::Bool => Value::Bool(false),
            FlagKind::Str => Value::Str(String::new()),
            FlagKind::Int => Value::Int(0),
            FlagKind::Float => Value::Float(0.0),
            FlagKind::List => Value::List(Vec::new()),
        }
    }

    /// Whether `default` is a value of this kind.
    pub fn admits(&self, default: &Value) -> bool {
        matches!(
            (self, default),
            (FlagKind::Bool, Value::Bool(_))
                | (FlagKind::Str, Value::Str(_))
                | (FlagKind::Int, Value::Int(_))
                | (FlagKind::Float, Value::Float(_))
                | (FlagKind::Float, Value::Int(_))
                | (FlagKind::List, Value::List(_))
        )
    }
}

/// Declaration of one command flag.
///
/// Use the constructors and chain [`with_default`](FlagSpec::with_default) /
/// [`with_usage`](FlagSpec::with_usage):
///
/// ```
/// use chore_core::{FlagKind, FlagSpec, Value};
///
/// let flag = FlagSpec::new("jobs", FlagKind::Int)
///     .with_default(Value::Int(4))
///     .with_usage("number of parallel jobs");
/// assert_eq!(flag.name, "jobs");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Flag name without leading dashes; unique within its command.
    pub name: String,
    /// Accepted value type.
    pub kind: FlagKind,
    /// Value bound when the flag is absent. Must match `kind`.
    pub default: Option<Value>,
    /// One-line description for help output.
    pub usage: String,
}

impl FlagSpec {
    pub fn new(name: impl Into<String>, kind: FlagKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            usage: String::new(),
        }
    }

    /// Shorthand for a boolean switch.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Bool)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }
}

/// Ordered positional-argument declaration.
///
/// Names are bound to tokens in order. A name with a trailing `...`
/// declares the variadic slot, which absorbs all remaining tokens and must
/// be the last name.
///
/// # Examples
///
/// ```
/// use chore_core::ArgSpec;
///
/// let args = ArgSpec::from_names(["target", "files..."]).unwrap();
/// assert_eq!(args.required(), &["target".to_string()]);
/// assert_eq!(args.variadic(), Some("files"));
///
/// assert!(ArgSpec::from_names(["files...", "target"]).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    required: Vec<String>,
    variadic: Option<String>,
}

/// Why an [`ArgSpec`] declaration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSpecError {
    /// A `name...` slot appears before the final position.
    VariadicNotLast(String),
    /// More than one `name...` slot is declared.
    MultipleVariadic(String),
    /// An argument name is empty.
    EmptyName,
}

impl std::fmt::Display for ArgSpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgSpecError::VariadicNotLast(name) => {
                write!(f, "variadic argument `{name}...` must be declared last")
            }
            ArgSpecError::MultipleVariadic(name) => {
                write!(f, "second variadic argument declared after `{name}...`")
            }
            ArgSpecError::EmptyName => write!(f, "argument name cannot be empty"),
        }
    }
}

impl ArgSpec {
    /// Builds a spec from declared names, validating variadic placement.
    pub fn from_names<I, S>(names: I) -> Result<Self, ArgSpecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spec = ArgSpec::default();
        for name in names {
            let name = name.as_ref();
            if let Some(stem) = name.strip_suffix("...") {
                if stem.is_empty() {
                    return Err(ArgSpecError::EmptyName);
                }
                if let Some(existing) = &spec.variadic {
                    return Err(ArgSpecError::MultipleVariadic(existing.clone()));
                }
                spec.variadic = Some(stem.to_string());
            } else {
                if name.is_empty() {
                    return Err(ArgSpecError::EmptyName);
                }
                if let Some(varargs) = &spec.variadic {
                    return Err(ArgSpecError::VariadicNotLast(varargs.clone()));
                }
                spec.required.push(name.to_string());
            }
        }
        Ok(spec)
    }

    /// Names that must each bind exactly one token.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// The variadic slot name, without the `...` marker.
    pub fn variadic(&self) -> Option<&str> {
        self.variadic.as_deref()
    }

    /// True when no positional arguments are declared.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.variadic.is_none()
    }
}

/// Opaque reference to a script callable held by the registering host.
///
/// The registry stores the handle only; the callable is never introspected
/// or serialized. Resolution back to something invocable happens through
/// [`ActionInvoker`](crate::ActionInvoker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionHandle(u32);

impl ActionHandle {
    pub fn new(index: u32) -> Self {
        ActionHandle(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Declaration of one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command name, unique within its parent scope.
    pub name: String,
    /// One-line description for help output.
    pub usage: String,
    /// Optional help-listing group.
    pub category: Option<String>,
    /// The bound script callable. `None` declares a pure group node that
    /// only exists to hold subcommands.
    pub action: Option<ActionHandle>,
    /// Declared flags, in declaration order.
    pub flags: Vec<FlagSpec>,
    /// Declared positional arguments.
    pub args: ArgSpec,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: String::new(),
            category: None,
            action: None,
            flags: Vec::new(),
            args: ArgSpec::default(),
        }
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_action(mut self, action: ActionHandle) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_args(mut self, args: ArgSpec) -> Self {
        self.args = args;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_kind_admits_matching_defaults() {
        assert!(FlagKind::Bool.admits(&Value::Bool(true)));
        assert!(FlagKind::Int.admits(&Value::Int(3)));
        assert!(!FlagKind::Int.admits(&Value::Str("3".into())));
        // An int default is acceptable for a float flag.
        assert!(FlagKind::Float.admits(&Value::Int(3)));
    }

    #[test]
    fn test_arg_spec_variadic_must_be_last() {
        let err = ArgSpec::from_names(["rest...", "target"]).unwrap_err();
        assert_eq!(err, ArgSpecError::VariadicNotLast("rest".to_string()));

        let err = ArgSpec::from_names(["a", "rest...", "more..."]).unwrap_err();
        assert_eq!(err, ArgSpecError::MultipleVariadic("rest".to_string()));
    }

    #[test]
    fn test_arg_spec_orders_required_names() {
        let spec = ArgSpec::from_names(["src", "dst", "extras..."]).unwrap();
        assert_eq!(spec.required(), &["src".to_string(), "dst".to_string()]);
        assert_eq!(spec.variadic(), Some("extras"));
    }
}
