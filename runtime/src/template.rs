//! Template rendering by field substitution.
//!
//! `{{field}}` placeholders are replaced with values from the data
//! mapping; `{{a.b}}` descends into nested maps. Substitution only — the
//! template text can never execute code.

use std::collections::BTreeMap;

use thiserror::Error;

use chore_core::Value;

/// Template failure, reported for the first offending position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder names a field the data does not provide.
    #[error("unresolved template field `{field}`")]
    Unresolved { field: String },
    /// Malformed placeholder syntax.
    #[error("template syntax error at byte {offset}: {detail}")]
    Syntax { offset: usize, detail: String },
}

/// Renders `text`, substituting `{{field}}` placeholders from `data`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use chore_core::Value;
/// use chore_runtime::render_template;
///
/// let mut data = BTreeMap::new();
/// data.insert("name".to_string(), Value::from("World"));
/// assert_eq!(
///     render_template("Hello {{name}}", &data).unwrap(),
///     "Hello World"
/// );
/// assert!(render_template("Hello {{missing}}", &data).is_err());
/// ```
pub fn render_template(
    text: &str,
    data: &BTreeMap<String, Value>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| TemplateError::Syntax {
                offset: offset + open,
                detail: "unclosed `{{`".to_string(),
            })?;
        let field = after_open[..close].trim();
        if field.is_empty() {
            return Err(TemplateError::Syntax {
                offset: offset + open,
                detail: "empty placeholder".to_string(),
            });
        }
        let value = resolve(field, data).ok_or_else(|| TemplateError::Unresolved {
            field: field.to_string(),
        })?;
        out.push_str(&value.to_string());

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Looks up a possibly-dotted field path in the data mapping.
fn resolve<'a>(field: &str, data: &'a BTreeMap<String, Value>) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        match current {
            Value::Map(entries) => current = entries.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}
