//! Script sessions: load, evaluate, freeze, invoke.
//!
//! Evaluation is single-threaded and completes before any command runs:
//! the registry the builtins populate is frozen together with the module,
//! and action callables become frozen values that can be invoked (and
//! spawned onto other threads) for the rest of the process lifetime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use starlark::any::ProvidesStaticType;
use starlark::environment::{FrozenModule, GlobalsBuilder, Module};
use starlark::eval::Evaluator;
use starlark::syntax::{AstModule, Dialect};
use starlark::values::{OwnedFrozenValue, Value as StarValue};
use thiserror::Error;
use tracing::debug;

use chore_core::{
    ActionError, ActionHandle, ActionInvoker, ExecutionContext, FrozenRegistry, Registry,
    RegistryError, Value,
};
use chore_runtime::{CacheStore, TaskHandle};

use crate::bridge::{alloc_ctx, to_native_return};
use crate::globals::chore_globals;

/// Script loading and evaluation failures.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("read script `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The script does not parse.
    #[error("parse `{path}`: {message}")]
    Parse { path: String, message: String },
    /// Evaluation raised an error (including registration failures
    /// surfaced by the declaration builtins).
    #[error("evaluate `{path}`: {message}")]
    Eval { path: String, message: String },
    /// A declaration was invalid.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Host services shared by every builtin: the cache store, the task
/// table, and the script's directory.
pub struct Services {
    pub(crate) cache: CacheStore,
    pub(crate) script_dir: PathBuf,
    pub(crate) tasks: TaskTable,
}

impl Services {
    pub fn new(cache: CacheStore, script_dir: PathBuf) -> Self {
        Self {
            cache,
            script_dir,
            tasks: TaskTable::default(),
        }
    }

    /// Directory containing the loaded script.
    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Waits for spawned tasks the script never awaited, so the process
    /// does not exit from under them. Returns how many of them failed;
    /// their errors are logged, not swallowed.
    pub fn wait_outstanding(&self) -> usize {
        let handles: Vec<TaskHandle<Option<Value>>> = {
            let mut table = self.tasks.table.lock().expect("task table poisoned");
            let ids: Vec<u64> = table.keys().copied().collect();
            ids.into_iter().filter_map(|id| table.remove(&id)).collect()
        };
        if handles.is_empty() {
            return 0;
        }
        match chore_runtime::wait_all(handles) {
            Ok(_) => 0,
            Err(err) => {
                tracing::warn!(error = %err, "unawaited task failed");
                1 + err.additional_failures
            }
        }
    }
}

/// Live task handles, keyed by the integer ids handed to scripts.
///
/// A handle leaves the table when awaited, so no two script tasks can
/// await the same handle.
#[derive(Default)]
pub(crate) struct TaskTable {
    next: AtomicU64,
    table: Mutex<HashMap<u64, TaskHandle<Option<Value>>>>,
}

impl TaskTable {
    pub(crate) fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn insert(&self, id: u64, handle: TaskHandle<Option<Value>>) {
        self.table
            .lock()
            .expect("task table poisoned")
            .insert(id, handle);
    }

    pub(crate) fn take(&self, id: u64) -> Option<TaskHandle<Option<Value>>> {
        self.table.lock().expect("task table poisoned").remove(&id)
    }
}

/// State reachable from builtins through the evaluator's `extra` slot.
#[derive(ProvidesStaticType)]
pub(crate) struct HostExtra<'v> {
    pub(crate) services: Arc<Services>,
    /// Present only while the script file loads.
    pub(crate) load: Option<LoadState<'v>>,
    /// Present only while an action (or spawned task) runs.
    pub(crate) invoke: Option<InvokeState>,
}

pub(crate) struct LoadState<'v> {
    pub(crate) registry: RefCell<Registry>,
    pub(crate) actions: RefCell<Vec<StarValue<'v>>>,
}

pub(crate) struct InvokeState {
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) ctx: Option<ExecutionContext>,
}

/// Fetches the host state out of an evaluator.
pub(crate) fn host_extra<'v>(
    eval: &Evaluator<'v, 'v>,
) -> anyhow::Result<&'v HostExtra<'v>> {
    eval.extra
        .ok_or_else(|| anyhow::anyhow!("chore host state is missing from the evaluator"))?
        .downcast_ref::<HostExtra>()
        .ok_or_else(|| anyhow::anyhow!("chore host state has an unexpected type"))
}

/// Everything an invocation needs, kept alive for the process lifetime.
pub(crate) struct SessionShared {
    pub(crate) module: FrozenModule,
    pub(crate) actions: Vec<OwnedFrozenValue>,
    pub(crate) services: Arc<Services>,
}

/// A loaded script: the frozen module plus its action handles.
///
/// Implements [`ActionInvoker`], so the engine can dispatch into the
/// script without knowing anything about Starlark.
pub struct Session {
    shared: Arc<SessionShared>,
}

fn action_binding(index: usize) -> String {
    format!("chore_action_{index}")
}

impl Session {
    /// Loads and evaluates a script file.
    ///
    /// Returns the session and the frozen registry its declarations
    /// produced. Any registration error aborts the load; no partial
    /// registry escapes.
    pub fn load(
        path: &Path,
        services: Arc<Services>,
    ) -> Result<(Session, FrozenRegistry), ScriptError> {
        let path_str = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ast = AstModule::parse(&path_str, content, &Dialect::Extended).map_err(|e| {
            ScriptError::Parse {
                path: path_str.clone(),
                message: e.to_string(),
            }
        })?;

        let globals = GlobalsBuilder::standard().with(chore_globals).build();
        let module = Module::new();
        module.set(
            "current_dir",
            module
                .heap()
                .alloc(services.script_dir.display().to_string()),
        );

        let extra = HostExtra {
            services: Arc::clone(&services),
            load: Some(LoadState {
                registry: RefCell::new(Registry::new()),
                actions: RefCell::new(Vec::new()),
            }),
            invoke: None,
        };
        {
            let mut eval = Evaluator::new(&module);
            eval.extra = Some(&extra);
            eval.eval_module(ast, &globals).map_err(|e| ScriptError::Eval {
                path: path_str.clone(),
                message: e.to_string(),
            })?;
        }

        let load = extra.load.expect("load state set above");
        let registry = load.registry.into_inner().freeze();
        let actions = load.actions.into_inner();
        let action_count = actions.len();
        for (index, action) in actions.into_iter().enumerate() {
            module.set(&action_binding(index), action);
        }

        let frozen = module.freeze().map_err(|e| ScriptError::Eval {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        let mut owned = Vec::with_capacity(action_count);
        for index in 0..action_count {
            let value = frozen.get(&action_binding(index)).map_err(|e| {
                ScriptError::Eval {
                    path: path_str.clone(),
                    message: e.to_string(),
                }
            })?;
            owned.push(value);
        }

        debug!(script = %path_str, commands = registry.commands().len(), "script loaded");
        let session = Session {
            shared: Arc::new(SessionShared {
                module: frozen,
                actions: owned,
                services,
            }),
        };
        Ok((session, registry))
    }
}

impl ActionInvoker for Session {
    fn invoke(&self, handle: ActionHandle, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let owned = self
            .shared
            .actions
            .get(handle.index() as usize)
            .ok_or(ActionError::UnknownHandle(handle))?;

        let module = Module::new();
        let extra = HostExtra {
            services: Arc::clone(&self.shared.services),
            load: None,
            invoke: Some(InvokeState {
                shared: Arc::clone(&self.shared),
                ctx: Some(ctx.clone()),
            }),
        };
        let mut eval = Evaluator::new(&module);
        eval.extra = Some(&extra);

        let func = owned.owned_value(module.frozen_heap());
        let ctx_value = alloc_ctx(module.heap(), ctx);
        let result = eval
            .eval_function(func, &[ctx_value], &[])
            .map_err(|e| ActionError::raised(e.to_string()))?;

        match to_native_return(result) {
            // Actions usually return nothing; that reads as plain success.
            Ok(None) => Ok(Value::Bool(true)),
            Ok(Some(value)) => Ok(value),
            Err(err) => Err(ActionError::raised(err.to_string())),
        }
    }
}
