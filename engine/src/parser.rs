//! Flag parsing for compiled commands.
//!
//! Accepts `--name=value` and `--name value` forms. Boolean flags take an
//! optional inline value (`--fast`, `--fast=false`). List flags append on
//! repetition. `--` ends flag recognition; everything after it is
//! positional. Flags may appear before, between, or after positional
//! tokens.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chore_core::{FlagKind, FlagSpec, Value};

use crate::UsageError;

/// Result of one parse: resolved flag values (defaults applied) and the
/// remaining positional tokens in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFlags {
    /// Flag name to typed value, for every declared flag.
    pub values: BTreeMap<String, Value>,
    /// Tokens not consumed by flag parsing.
    pub positionals: Vec<String>,
}

/// Parses `tokens` against the declared flags.
///
/// # Examples
///
/// ```
/// use chore_core::{FlagKind, FlagSpec, Value};
/// use chore_engine::parse_flags;
///
/// let flags = [FlagSpec::new("jobs", FlagKind::Int).with_default(Value::Int(2))];
/// let tokens: Vec<String> = ["--jobs", "8", "frontend"]
///     .iter().map(|s| s.to_string()).collect();
///
/// let parsed = parse_flags(&flags, &tokens).unwrap();
/// assert_eq!(parsed.values["jobs"], Value::Int(8));
/// assert_eq!(parsed.positionals, ["frontend"]);
/// ```
pub fn parse_flags(specs: &[FlagSpec], tokens: &[String]) -> Result<ParsedFlags, UsageError> {
    let mut values: BTreeMap<String, Value> = BTreeMap::new();
    let mut positionals = Vec::new();
    let mut only_positionals = false;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        if only_positionals {
            positionals.push(token.clone());
            continue;
        }
        if token == "--" {
            only_positionals = true;
            continue;
        }
        let Some(stripped) = token.strip_prefix("--") else {
            positionals.push(token.clone());
            continue;
        };

        let (name, inline) = match stripped.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (stripped, None),
        };
        let spec = specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| UsageError::UnknownFlag {
                flag: name.to_string(),
            })?;

        let raw = match (spec.kind, inline) {
            // A bare boolean flag means true; an inline value may override.
            (FlagKind::Bool, None) => "true".to_string(),
            (_, Some(inline)) => inline,
            (_, None) => iter
                .next()
                .cloned()
                .ok_or_else(|| UsageError::MissingValue {
                    flag: name.to_string(),
                })?,
        };

        let value = coerce(spec, &raw)?;
        match values.entry(spec.name.clone()) {
            // Repeated list flags accumulate; anything else overwrites.
            Entry::Occupied(mut entry) if spec.kind == FlagKind::List => {
                if let (Value::List(items), Value::List(new_items)) = (entry.get_mut(), value) {
                    items.extend(new_items);
                }
            }
            Entry::Occupied(mut entry) => {
                entry.insert(value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }

    for spec in specs {
        if !values.contains_key(&spec.name) {
            let value = spec
                .default
                .clone()
                .unwrap_or_else(|| spec.kind.zero_value());
            values.insert(spec.name.clone(), value);
        }
    }

    Ok(ParsedFlags {
        values,
        positionals,
    })
}

fn coerce(spec: &FlagSpec, raw: &str) -> Result<Value, UsageError> {
    let mismatch = || UsageError::TypeMismatch {
        flag: spec.name.clone(),
        expected: spec.kind.name(),
        value: raw.to_string(),
    };
    match spec.kind {
        FlagKind::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        FlagKind::Str => Ok(Value::Str(raw.to_string())),
        FlagKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| mismatch()),
        FlagKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch()),
        FlagKind::List => Ok(Value::List(vec![Value::Str(raw.to_string())])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bool_flag_defaults_and_overrides() {
        let specs = [FlagSpec::boolean("short").with_default(Value::Bool(true))];

        let parsed = parse_flags(&specs, &[]).unwrap();
        assert_eq!(parsed.values["short"], Value::Bool(true));

        let parsed = parse_flags(&specs, &tokens(&["--short=false"])).unwrap();
        assert_eq!(parsed.values["short"], Value::Bool(false));

        let parsed = parse_flags(&specs, &tokens(&["--short"])).unwrap();
        assert_eq!(parsed.values["short"], Value::Bool(true));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let specs = [FlagSpec::boolean("short")];
        let err = parse_flags(&specs, &tokens(&["--bogus"])).unwrap_err();
        assert_eq!(
            err,
            UsageError::UnknownFlag {
                flag: "bogus".to_string()
            }
        );
    }

    #[test]
    fn test_space_and_equals_forms_are_equivalent() {
        let specs = [FlagSpec::new("out", FlagKind::Str)];
        let a = parse_flags(&specs, &tokens(&["--out", "dist"])).unwrap();
        let b = parse_flags(&specs, &tokens(&["--out=dist"])).unwrap();
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_typed_values_are_coerced_once() {
        let specs = [
            FlagSpec::new("jobs", FlagKind::Int),
            FlagSpec::new("ratio", FlagKind::Float),
        ];
        let parsed = parse_flags(&specs, &tokens(&["--jobs=8", "--ratio", "0.5"])).unwrap();
        assert_eq!(parsed.values["jobs"], Value::Int(8));
        assert_eq!(parsed.values["ratio"], Value::Float(0.5));

        let err = parse_flags(&specs, &tokens(&["--jobs=many"])).unwrap_err();
        assert!(matches!(err, UsageError::TypeMismatch { ref flag, .. } if flag == "jobs"));
    }

    #[test]
    fn test_list_flags_accumulate() {
        let specs = [FlagSpec::new("tag", FlagKind::List)];
        let parsed = parse_flags(&specs, &tokens(&["--tag=a", "--tag", "b"])).unwrap();
        assert_eq!(
            parsed.values["tag"],
            Value::List(vec![Value::Str("a".into()), Value::Str("b".into())])
        );
    }

    #[test]
    fn test_flags_interspersed_with_positionals() {
        let specs = [FlagSpec::boolean("fast")];
        let parsed =
            parse_flags(&specs, &tokens(&["frontend", "--fast", "backend"])).unwrap();
        assert_eq!(parsed.values["fast"], Value::Bool(true));
        assert_eq!(parsed.positionals, ["frontend", "backend"]);
    }

    #[test]
    fn test_double_dash_ends_flag_parsing() {
        let specs = [FlagSpec::boolean("fast")];
        let parsed = parse_flags(&specs, &tokens(&["--", "--fast"])).unwrap();
        assert_eq!(parsed.values["fast"], Value::Bool(false));
        assert_eq!(parsed.positionals, ["--fast"]);
    }

    #[test]
    fn test_trailing_value_flag_without_value() {
        let specs = [FlagSpec::new("out", FlagKind::Str)];
        let err = parse_flags(&specs, &tokens(&["--out"])).unwrap_err();
        assert_eq!(
            err,
            UsageError::MissingValue {
                flag: "out".to_string()
            }
        );
    }
}
