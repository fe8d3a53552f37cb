//! Conversion between Starlark values and the host-native [`Value`].
//!
//! Conversion happens once, at this boundary; everything behind it works
//! with typed native values.

use starlark::values::dict::{AllocDict, DictRef};
use starlark::values::float::StarlarkFloat;
use starlark::values::list::{AllocList, ListRef};
use starlark::values::structs::AllocStruct;
use starlark::values::tuple::TupleRef;
use starlark::values::{Heap, Value as StarValue, ValueLike};

use chore_core::{ConversionError, ExecutionContext, Value};

/// Converts a Starlark value into a native value.
///
/// `None`, sets, functions, and other opaque types are rejected with a
/// [`ConversionError`] naming the type. Integers outside the 32-bit range
/// Starlark stores inline are reported as out of range.
pub fn to_native(value: StarValue<'_>) -> Result<Value, ConversionError> {
    if value.is_none() {
        return Err(ConversionError::Unsupported("NoneType".to_string()));
    }
    if let Some(b) = value.unpack_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(i) = value.unpack_i32() {
        return Ok(Value::Int(i64::from(i)));
    }
    if let Some(f) = value.downcast_ref::<StarlarkFloat>() {
        return Ok(Value::Float(f.0));
    }
    if let Some(s) = value.unpack_str() {
        return Ok(Value::Str(s.to_string()));
    }
    if let Some(list) = ListRef::from_value(value) {
        let items = list
            .iter()
            .map(to_native)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(items));
    }
    if let Some(tuple) = TupleRef::from_value(value) {
        let items = tuple
            .iter()
            .map(to_native)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(items));
    }
    if let Some(dict) = DictRef::from_value(value) {
        let mut map = std::collections::BTreeMap::new();
        for (key, entry) in dict.iter() {
            let key = key
                .unpack_str()
                .ok_or_else(|| ConversionError::NonStringKey(key.get_type().to_string()))?;
            map.insert(key.to_string(), to_native(entry)?);
        }
        return Ok(Value::Map(map));
    }
    if value.get_type() == "int" {
        // Inline ints unpacked above; anything left is a big integer.
        return Err(ConversionError::IntOutOfRange(value.to_string()));
    }
    Err(ConversionError::Unsupported(value.get_type().to_string()))
}

/// Like [`to_native`], but maps Starlark `None` to Rust `None` instead of
/// an error. Used for action and task return values, where returning
/// nothing is the common case.
pub fn to_native_return(value: StarValue<'_>) -> Result<Option<Value>, ConversionError> {
    if value.is_none() {
        return Ok(None);
    }
    to_native(value).map(Some)
}

/// Allocates a native value on a Starlark heap.
pub fn alloc_native<'v>(heap: &'v Heap, value: &Value) -> StarValue<'v> {
    match value {
        Value::Bool(b) => StarValue::new_bool(*b),
        Value::Int(i) => heap.alloc(*i),
        Value::Float(f) => heap.alloc(*f),
        Value::Str(s) => heap.alloc(s.as_str()),
        Value::List(items) => {
            let items: Vec<StarValue> = items.iter().map(|v| alloc_native(heap, v)).collect();
            heap.alloc(AllocList(items))
        }
        Value::Map(entries) => {
            let pairs: Vec<(&str, StarValue)> = entries
                .iter()
                .map(|(k, v)| (k.as_str(), alloc_native(heap, v)))
                .collect();
            heap.alloc(AllocDict(pairs))
        }
    }
}

/// Builds the `ctx` value passed to an action: `ctx.flags` and `ctx.args`
/// as attribute structs, `ctx.rest` as the overflow token list. A declared
/// variadic argument also appears under its name in `ctx.args`.
pub fn alloc_ctx<'v>(heap: &'v Heap, ctx: &ExecutionContext) -> StarValue<'v> {
    let flags: Vec<(&str, StarValue)> = ctx
        .flags()
        .iter()
        .map(|(name, value)| (name.as_str(), alloc_native(heap, value)))
        .collect();

    let rest: Vec<StarValue> = ctx.rest().iter().map(|t| heap.alloc(t.as_str())).collect();
    let rest_value = heap.alloc(AllocList(rest));

    let mut args: Vec<(&str, StarValue)> = ctx
        .args()
        .iter()
        .map(|(name, token)| (name.as_str(), heap.alloc(token.as_str())))
        .collect();
    if let Some(variadic) = ctx.rest_name() {
        args.push((variadic, rest_value));
    }

    heap.alloc(AllocStruct([
        ("flags", heap.alloc(AllocStruct(flags))),
        ("args", heap.alloc(AllocStruct(args))),
        ("rest", rest_value),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starlark::environment::Module;

    #[test]
    fn test_round_trip_scalars_and_containers() {
        let module = Module::new();
        let heap = module.heap();

        let native = Value::Map(
            [
                ("flag".to_string(), Value::Bool(true)),
                ("count".to_string(), Value::Int(3)),
                (
                    "names".to_string(),
                    Value::List(vec![Value::from("a"), Value::from("b")]),
                ),
            ]
            .into_iter()
            .collect(),
        );

        let star = alloc_native(heap, &native);
        assert_eq!(to_native(star).unwrap(), native);
    }

    #[test]
    fn test_none_is_rejected_by_name() {
        let err = to_native(StarValue::new_none()).unwrap_err();
        assert_eq!(err, ConversionError::Unsupported("NoneType".to_string()));
        assert_eq!(to_native_return(StarValue::new_none()).unwrap(), None);
    }

    #[test]
    fn test_ctx_is_a_struct_with_the_expected_shape() {
        let module = Module::new();
        let heap = module.heap();

        let mut ctx = ExecutionContext::default();
        ctx.set_flag("verbose", Value::Bool(true));
        ctx.bind_arg("target", "frontend");
        ctx.push_rest("extra");
        ctx.set_rest_name("files");

        // Attribute access is exercised end to end by the session tests;
        // here we only pin the value shape.
        let value = alloc_ctx(heap, &ctx);
        assert_eq!(value.get_type(), "struct");
        let rendered = value.to_string();
        assert!(rendered.contains("flags"), "rendered: {rendered}");
        assert!(rendered.contains("frontend"), "rendered: {rendered}");
        assert!(rendered.contains("extra"), "rendered: {rendered}");
    }
}
