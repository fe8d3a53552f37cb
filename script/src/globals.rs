//! Global builtins registered into every chore script.
//!
//! Declaration builtins (`cli`, `command`, `sub_command`) are only valid
//! while the script file loads; execution builtins (`shell`, `cache`,
//! `template`, `spawn`, `wait`) do host-privileged work on behalf of
//! actions without the script ever leaving the sandbox.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::anyhow;
use starlark::environment::{GlobalsBuilder, Module};
use starlark::eval::Evaluator;
use starlark::starlark_module;
use starlark::values::dict::DictRef;
use starlark::values::list::{AllocList, ListRef};
use starlark::values::none::NoneType;
use starlark::values::structs::AllocStruct;
use starlark::values::Value as StarValue;

use chore_core::{
    ArgSpec, CliSpec, CommandSpec, FlagKind, FlagSpec, Value, args_error,
};
use chore_runtime::{ShellRequest, render_template, spawn_task};

use crate::bridge::{alloc_native, to_native, to_native_return};
use crate::session::{HostExtra, InvokeState, LoadState, host_extra};

/// Parses the script-side `args=["name", "files..."]` declaration.
fn parse_args_decl(command: &str, args: Option<StarValue>) -> anyhow::Result<ArgSpec> {
    let Some(args) = args else {
        return Ok(ArgSpec::default());
    };
    let list =
        ListRef::from_value(args).ok_or_else(|| anyhow!("args must be a list of strings"))?;
    let mut names = Vec::new();
    for item in list.iter() {
        let name = item
            .unpack_str()
            .ok_or_else(|| anyhow!("args must be a list of strings"))?;
        names.push(name.to_string());
    }
    ArgSpec::from_names(names).map_err(|e| anyhow::Error::from(args_error(command, e)))
}

/// Parses the script-side flag declaration dict:
/// `{"jobs": {"type": "int", "default": 4, "help": "..."}}`.
fn parse_flags_decl(flags: Option<StarValue>) -> anyhow::Result<Vec<FlagSpec>> {
    let Some(flags) = flags else {
        return Ok(Vec::new());
    };
    let dict = DictRef::from_value(flags).ok_or_else(|| anyhow!("flags must be a dict"))?;
    let mut specs = Vec::new();
    for (key, decl) in dict.iter() {
        let name = key
            .unpack_str()
            .ok_or_else(|| anyhow!("flag name must be a string"))?;
        let decl = DictRef::from_value(decl)
            .ok_or_else(|| anyhow!("flag `{name}` must be declared as a dict"))?;

        let mut kind = FlagKind::Str;
        let mut default = None;
        let mut usage = String::new();
        for (field, value) in decl.iter() {
            match field.unpack_str() {
                Some("type") => {
                    let type_name = value
                        .unpack_str()
                        .ok_or_else(|| anyhow!("flag `{name}`: type must be a string"))?;
                    kind = FlagKind::parse(type_name)
                        .ok_or_else(|| anyhow!("flag `{name}`: unknown type `{type_name}`"))?;
                }
                Some("default") => {
                    default = Some(to_native(value)?);
                }
                Some("help") => {
                    usage = value
                        .unpack_str()
                        .ok_or_else(|| anyhow!("flag `{name}`: help must be a string"))?
                        .to_string();
                }
                Some(other) => {
                    return Err(anyhow!("flag `{name}`: unknown field `{other}`"));
                }
                None => return Err(anyhow!("flag `{name}`: field names must be strings")),
            }
        }

        let mut spec = FlagSpec::new(name, kind).with_usage(usage);
        if let Some(default) = default {
            spec = spec.with_default(default);
        }
        specs.push(spec);
    }
    Ok(specs)
}

fn build_spec<'v>(
    load: &LoadState<'v>,
    name: &str,
    action: StarValue<'v>,
    help: &str,
    args: Option<StarValue<'v>>,
    flags: Option<StarValue<'v>>,
    category: &str,
) -> anyhow::Result<CommandSpec> {
    let mut spec = CommandSpec::new(name)
        .with_usage(help)
        .with_args(parse_args_decl(name, args)?);
    for flag in parse_flags_decl(flags)? {
        spec = spec.with_flag(flag);
    }
    if !category.is_empty() {
        spec = spec.with_category(category);
    }
    if !action.is_none() {
        let mut actions = load.actions.borrow_mut();
        let handle = chore_core::ActionHandle::new(actions.len() as u32);
        actions.push(action);
        spec = spec.with_action(handle);
    }
    Ok(spec)
}

fn load_state<'v, 'e>(
    extra: &'e HostExtra<'v>,
    builtin: &str,
) -> anyhow::Result<&'e LoadState<'v>> {
    extra.load.as_ref().ok_or_else(|| {
        anyhow!("{builtin}() can only be called while the script file loads")
    })
}

fn invoke_state<'v, 'e>(
    extra: &'e HostExtra<'v>,
    builtin: &str,
) -> anyhow::Result<&'e InvokeState> {
    extra.invoke.as_ref().ok_or_else(|| {
        anyhow!("{builtin}() is only available inside a running action")
    })
}

#[starlark_module]
pub(crate) fn chore_globals(builder: &mut GlobalsBuilder) {
    /// Registers the root CLI descriptor. Callable at most once.
    fn cli<'v>(
        name: &str,
        #[starlark(default = "")] usage: &str,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<NoneType> {
        let extra = host_extra(eval)?;
        let load = load_state(extra, "cli")?;
        load.registry
            .borrow_mut()
            .set_cli(CliSpec::new(name, usage))?;
        Ok(NoneType)
    }

    /// Registers a top-level command. The action runs only when the
    /// command is invoked, never at declaration time.
    fn command<'v>(
        name: &str,
        action: StarValue<'v>,
        #[starlark(require = named, default = "")] help: &str,
        #[starlark(require = named)] args: Option<StarValue<'v>>,
        #[starlark(require = named)] flags: Option<StarValue<'v>>,
        #[starlark(require = named, default = "")] category: &str,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<NoneType> {
        let extra = host_extra(eval)?;
        let load = load_state(extra, "command")?;
        let spec = build_spec(load, name, action, help, args, flags, category)?;
        load.registry.borrow_mut().add_command(spec)?;
        Ok(NoneType)
    }

    /// Registers a nested command at `path` (a list of names ending in the
    /// new command's own name). Every ancestor must already be registered.
    fn sub_command<'v>(
        path: StarValue<'v>,
        action: StarValue<'v>,
        #[starlark(require = named, default = "")] help: &str,
        #[starlark(require = named)] args: Option<StarValue<'v>>,
        #[starlark(require = named)] flags: Option<StarValue<'v>>,
        #[starlark(require = named, default = "")] category: &str,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<NoneType> {
        let extra = host_extra(eval)?;
        let load = load_state(extra, "sub_command")?;

        let list = ListRef::from_value(path)
            .ok_or_else(|| anyhow!("path must be a list of strings"))?;
        let mut segments = Vec::new();
        for item in list.iter() {
            let segment = item
                .unpack_str()
                .ok_or_else(|| anyhow!("path must be a list of strings"))?;
            segments.push(segment.to_string());
        }
        let name = segments
            .last()
            .ok_or_else(|| anyhow!("path cannot be empty"))?
            .clone();

        let spec = build_spec(load, &name, action, help, args, flags, category)?;
        load.registry.borrow_mut().add_subcommand(segments, spec)?;
        Ok(NoneType)
    }

    /// Runs a command through `bash -c` and returns a result struct with
    /// `stdout`, `stderr`, `exit_code`, and `success`.
    ///
    /// Fails on non-zero exit unless `check=False`; a `timeout` (seconds)
    /// kills only this subprocess.
    fn shell<'v>(
        command: &str,
        #[starlark(require = named)] cwd: Option<&str>,
        #[starlark(require = named)] env: Option<StarValue<'v>>,
        #[starlark(require = named)] timeout: Option<i32>,
        #[starlark(require = named, default = true)] stream: bool,
        #[starlark(require = named, default = true)] check: bool,
        #[starlark(require = named, default = "")] prefix: &str,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<StarValue<'v>> {
        let extra = host_extra(eval)?;
        let mut request = ShellRequest::new(command).with_prefix(prefix);
        request.stream = stream;
        request.check = check;
        match cwd {
            Some(cwd) => request.cwd = Some(extra.services.script_dir().join(cwd)),
            None => request.cwd = Some(extra.services.script_dir().to_path_buf()),
        }
        if let Some(env) = env {
            let dict = DictRef::from_value(env)
                .ok_or_else(|| anyhow!("env must be a dict of strings"))?;
            for (key, value) in dict.iter() {
                let (Some(key), Some(value)) = (key.unpack_str(), value.unpack_str()) else {
                    return Err(anyhow!("env must be a dict of strings"));
                };
                request = request.with_env(key, value);
            }
        }
        if let Some(seconds) = timeout {
            if seconds < 0 {
                return Err(anyhow!("timeout must be non-negative"));
            }
            request.timeout = Some(Duration::from_secs(seconds as u64));
        }

        let output = request.run()?;
        let heap = eval.heap();
        Ok(heap.alloc(AllocStruct([
            ("stdout", heap.alloc(output.stdout.as_str())),
            ("stderr", heap.alloc(output.stderr.as_str())),
            ("exit_code", heap.alloc(output.exit_code)),
            ("success", StarValue::new_bool(output.success)),
        ])))
    }

    /// Returns the cached value for `key`, or calls `producer` exactly
    /// once to fill it. Concurrent same-key callers share one production;
    /// a failing producer is not cached.
    fn cache<'v>(
        key: &str,
        producer: StarValue<'v>,
        #[starlark(require = named)] ttl: Option<i32>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<StarValue<'v>> {
        let extra = host_extra(eval)?;
        let services = std::sync::Arc::clone(&extra.services);
        let ttl = match ttl {
            Some(seconds) if seconds < 0 => {
                return Err(anyhow!("ttl must be non-negative"));
            }
            Some(seconds) => Some(Duration::from_secs(seconds as u64)),
            None => None,
        };

        let value = services.cache.get_or_produce(key, ttl, || {
            let produced = eval
                .eval_function(producer, &[], &[])
                .map_err(|e| chore_runtime::CacheError::producer(key, e.to_string()))?;
            to_native(produced)
                .map_err(|e| chore_runtime::CacheError::producer(key, e.to_string()))
        })?;
        Ok(alloc_native(eval.heap(), &value))
    }

    /// Reads a cached value directly; `None` when absent or expired.
    fn cache_get<'v>(
        key: &str,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<StarValue<'v>> {
        let extra = host_extra(eval)?;
        Ok(match extra.services.cache.get(key) {
            Some(value) => alloc_native(eval.heap(), &value),
            None => StarValue::new_none(),
        })
    }

    /// Stores a value directly under `key`.
    fn cache_put<'v>(
        key: &str,
        value: StarValue<'v>,
        #[starlark(require = named)] ttl: Option<i32>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<NoneType> {
        let extra = host_extra(eval)?;
        let native = to_native(value)?;
        let ttl = match ttl {
            Some(seconds) if seconds < 0 => {
                return Err(anyhow!("ttl must be non-negative"));
            }
            Some(seconds) => Some(Duration::from_secs(seconds as u64)),
            None => None,
        };
        extra.services.cache.put(key, &native, ttl)?;
        Ok(NoneType)
    }

    /// Removes a cached key. Absent keys are fine.
    fn cache_remove<'v>(key: &str, eval: &mut Evaluator<'v, '_>) -> anyhow::Result<NoneType> {
        let extra = host_extra(eval)?;
        extra.services.cache.remove(key)?;
        Ok(NoneType)
    }

    /// Renders `{{field}}` placeholders in `text`. Fields come from the
    /// current execution context (flags and arguments) merged with the
    /// optional `data` dict; `data` wins on collision. Substitution only —
    /// the text can never execute code.
    fn template<'v>(
        text: &str,
        #[starlark(require = named)] data: Option<StarValue<'v>>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<String> {
        let extra = host_extra(eval)?;
        let mut fields: BTreeMap<String, Value> = BTreeMap::new();
        if let Some(invoke) = &extra.invoke {
            if let Some(ctx) = &invoke.ctx {
                for (name, value) in ctx.flags() {
                    fields.insert(name.clone(), value.clone());
                }
                for (name, token) in ctx.args() {
                    fields.insert(name.clone(), Value::Str(token.clone()));
                }
                if let Some(rest_name) = ctx.rest_name() {
                    let rest = ctx
                        .rest()
                        .iter()
                        .map(|t| Value::Str(t.clone()))
                        .collect::<Vec<_>>();
                    fields.insert(rest_name.to_string(), Value::List(rest));
                }
            }
        }
        if let Some(data) = data {
            match to_native(data)? {
                Value::Map(entries) => fields.extend(entries),
                other => {
                    return Err(anyhow!(
                        "data must be a dict, got {}",
                        other.type_name()
                    ));
                }
            }
        }
        Ok(render_template(text, &fields)?)
    }

    /// Schedules a module-level function for concurrent execution and
    /// returns its task handle.
    fn spawn<'v>(
        func: StarValue<'v>,
        #[starlark(require = named)] args: Option<StarValue<'v>>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<i32> {
        let extra = host_extra(eval)?;
        let invoke = invoke_state(extra, "spawn")?;
        let shared = std::sync::Arc::clone(&invoke.shared);

        let Some(frozen) = func.unpack_frozen() else {
            // Nested functions live in the invocation heap and cannot
            // cross threads.
            return Err(anyhow!(
                "spawn() requires a function defined at the top level of the script"
            ));
        };

        let mut native_args = Vec::new();
        if let Some(args) = args {
            let list = ListRef::from_value(args)
                .ok_or_else(|| anyhow!("args must be a list"))?;
            for item in list.iter() {
                native_args.push(to_native(item)?);
            }
        }

        let id = extra.services.tasks.next_id();
        let handle = spawn_task(format!("task-{id}"), move || {
            let module = Module::new();
            module
                .frozen_heap()
                .add_reference(shared.module.frozen_heap());
            let task_extra = HostExtra {
                services: std::sync::Arc::clone(&shared.services),
                load: None,
                invoke: Some(InvokeState {
                    shared: std::sync::Arc::clone(&shared),
                    ctx: None,
                }),
            };
            let mut task_eval = Evaluator::new(&module);
            task_eval.extra = Some(&task_extra);

            let func = frozen.to_value();
            let call_args: Vec<StarValue> = native_args
                .iter()
                .map(|v| alloc_native(module.heap(), v))
                .collect();
            let result = task_eval
                .eval_function(func, &call_args, &[])
                .map_err(|e| e.to_string())?;
            to_native_return(result).map_err(|e| e.to_string())
        });
        extra.services.tasks.insert(id, handle);
        Ok(id as i32)
    }

    /// Blocks until the referenced task handles complete and returns
    /// their results in handle order. Fails with the first task's error;
    /// later failures are counted, not dropped.
    fn wait<'v>(
        handles: StarValue<'v>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<StarValue<'v>> {
        let extra = host_extra(eval)?;

        let ids: Vec<i32> = if let Some(list) = ListRef::from_value(handles) {
            list.iter()
                .map(|v| {
                    v.unpack_i32()
                        .ok_or_else(|| anyhow!("wait() takes task handles"))
                })
                .collect::<anyhow::Result<_>>()?
        } else if let Some(id) = handles.unpack_i32() {
            vec![id]
        } else {
            return Err(anyhow!("wait() takes a task handle or a list of them"));
        };

        let mut joined = Vec::with_capacity(ids.len());
        for id in ids {
            let handle = extra
                .services
                .tasks
                .take(id as u64)
                .ok_or_else(|| anyhow!("unknown or already-awaited task handle {id}"))?;
            joined.push(handle);
        }

        let results = chore_runtime::wait_all(joined)?;
        let heap = eval.heap();
        let values: Vec<StarValue> = results
            .iter()
            .map(|result| match result {
                Some(value) => alloc_native(heap, value),
                None => StarValue::new_none(),
            })
            .collect();
        Ok(heap.alloc(AllocList(values)))
    }
}
