//! The script-rule adapter (C6): wraps a named script-host function as a
//! synthetic [`Operator`], serialising context creation/teardown behind an
//! engine-scoped gate (spec §4.5).

use std::any::Any;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::EngineError;
use crate::field::FieldValue;
use crate::operator::{Operator, OperatorState};
use crate::tx::Tx;

/// Opaque handle to a per-invocation script context. Hosts are free to give
/// this whatever internal meaning they like (an index into a table of Lua
/// registry references, for instance); the engine never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptContextId(pub u64);

/// The embedded scripting runtime boundary (spec §2, "Script host").
///
/// A root context is created at engine init and holds the library of
/// loaded functions; `new_context`/`dispose_context` manage per-invocation
/// contexts cloned from it. Implementations do their own synchronisation if
/// they need it beyond the [`ScriptGate`]; the gate only serialises
/// structural mutation of the root context from this crate's side.
pub trait ScriptHost: Send + Sync {
    /// The `RuleExt` URI scheme this host handles (e.g. `"lua"` for a
    /// `lua:/path/to/file.lua` directive), without the trailing colon
    /// (spec §4.3: "whatever script scheme the script host advertises").
    fn scheme(&self) -> &str;

    /// Load the function at `path` under `name`, publishing it in the root
    /// context's function library.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if the path or function cannot be
    /// loaded.
    fn load_function(&self, path: &str, name: &str) -> Result<(), EngineError>;

    /// Create a per-invocation context cloned from the root context.
    ///
    /// # Errors
    /// Returns [`EngineError::Alloc`] if the host cannot allocate one.
    fn new_context(&self) -> Result<ScriptContextId, EngineError>;

    /// Dispose of a per-invocation context previously returned by
    /// [`Self::new_context`].
    fn dispose_context(&self, ctx: ScriptContextId);

    /// Call the named function within `ctx`, passing the transaction, and
    /// return its integer result.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `name` was never loaded, or
    /// propagates a host-specific execution failure.
    fn call(&self, ctx: ScriptContextId, name: &str, tx: &Tx) -> Result<i64, EngineError>;
}

/// Engine-scoped mutual-exclusion gate around script-context creation and
/// disposal (spec §4.5, §5's "script host root context is the one shared
/// mutable resource"). The call itself (`ScriptHost::call`) runs outside the
/// gate; only the structural create/dispose pair is serialised.
///
/// Acquisition uses `try_lock`: under contention the caller gets a
/// [`EngineError::Transient`] rather than blocking, matching spec §7's
/// "script gate could not be acquired" error kind.
#[derive(Debug, Default)]
pub struct ScriptGate(Mutex<()>);

impl ScriptGate {
    /// Build an unlocked gate.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a per-invocation context under the gate.
    ///
    /// # Errors
    /// Returns [`EngineError::Transient`] if the gate is contended, or
    /// whatever `host.new_context` itself returns.
    pub fn new_context(&self, host: &dyn ScriptHost) -> Result<ScriptContextId, EngineError> {
        let _guard = self
            .0
            .try_lock()
            .map_err(|_| EngineError::transient("script gate contended on context creation"))?;
        host.new_context()
    }

    /// Dispose of a per-invocation context under the gate. Contention here
    /// is logged and the context is leaked for the host to reclaim at
    /// shutdown rather than blocking the caller.
    pub fn dispose_context(&self, host: &dyn ScriptHost, ctx: ScriptContextId) {
        match self.0.try_lock() {
            Ok(_guard) => host.dispose_context(ctx),
            Err(_) => warn!(ctx = ctx.0, "script gate contended on context disposal; leaking context"),
        }
    }
}

/// A synthetic [`Operator`] that invokes a named script-host function,
/// coercing its integer result to a boolean (spec §4.5).
pub struct ScriptRuleAdapter {
    host: Arc<dyn ScriptHost>,
    gate: Arc<ScriptGate>,
    function: String,
}

impl ScriptRuleAdapter {
    /// Bind a synthetic operator to `function`, already loaded into
    /// `host`'s root context under that name.
    #[must_use]
    pub fn new(host: Arc<dyn ScriptHost>, gate: Arc<ScriptGate>, function: impl Into<String>) -> Self {
        Self {
            host,
            gate,
            function: function.into(),
        }
    }
}

impl Operator for ScriptRuleAdapter {
    fn create(&self, _params: &str) -> Result<OperatorState, EngineError> { Ok(Box::new(())) }

    fn execute(&self, tx: &Tx, _state: &(dyn Any + Send + Sync), _field: Option<&FieldValue>) -> Result<bool, EngineError> {
        let ctx = match self.gate.new_context(&*self.host) {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(function = %self.function, %err, "script context unavailable; rule yields false");
                return Ok(false);
            }
        };

        let result = self.host.call(ctx, &self.function, tx);
        self.gate.dispose_context(&*self.host, ctx);
        Ok(result? != 0)
    }

    fn accepts_null_field(&self) -> bool { true }
}

#[cfg(feature = "lua")]
pub mod lua {
    //! An `mlua`-backed [`ScriptHost`] (feature `lua`).

    use std::collections::HashMap;
    use std::sync::Mutex;

    use mlua::{Lua, Value};

    use super::{EngineError, ScriptContextId, ScriptHost};
    use crate::tx::Tx;

    /// A [`ScriptHost`] backed by an embedded Lua interpreter. Per-invocation
    /// contexts are distinct `Lua` VMs loaded from the same source text,
    /// since `mlua` registry values are not safely shareable across VMs.
    pub struct LuaScriptHost {
        functions: Mutex<HashMap<String, String>>,
        contexts: Mutex<HashMap<u64, Lua>>,
        next_id: Mutex<u64>,
    }

    impl Default for LuaScriptHost {
        fn default() -> Self {
            Self {
                functions: Mutex::new(HashMap::new()),
                contexts: Mutex::new(HashMap::new()),
                next_id: Mutex::new(0),
            }
        }
    }

    impl LuaScriptHost {
        /// Build a host with no functions loaded.
        #[must_use]
        pub fn new() -> Self { Self::default() }
    }

    impl ScriptHost for LuaScriptHost {
        fn scheme(&self) -> &str { "lua" }

        fn load_function(&self, path: &str, name: &str) -> Result<(), EngineError> {
            let source = std::fs::read_to_string(path)
                .map_err(|err| EngineError::invalid(format!("cannot read script '{path}': {err}")))?;
            lock(&self.functions).insert(name.to_owned(), source);
            Ok(())
        }

        fn new_context(&self) -> Result<ScriptContextId, EngineError> {
            let lua = Lua::new();
            let mut next_id = lock(&self.next_id);
            let id = *next_id;
            *next_id += 1;
            lock(&self.contexts).insert(id, lua);
            Ok(ScriptContextId(id))
        }

        fn dispose_context(&self, ctx: ScriptContextId) {
            lock(&self.contexts).remove(&ctx.0);
        }

        fn call(&self, ctx: ScriptContextId, name: &str, tx: &Tx) -> Result<i64, EngineError> {
            let source = lock(&self.functions)
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::not_found(format!("script function '{name}'")))?;

            let contexts = lock(&self.contexts);
            let lua = contexts
                .get(&ctx.0)
                .ok_or_else(|| EngineError::invalid("script context disposed before call"))?;

            lua.globals().set("tx_id", tx.id()).map_err(lua_err)?;
            let value: Value = lua.load(&source).eval().map_err(lua_err)?;
            match value {
                Value::Integer(n) => Ok(n),
                Value::Boolean(b) => Ok(i64::from(b)),
                Value::Nil => Ok(0),
                other => Err(EngineError::invalid(format!("script returned non-numeric value: {other:?}"))),
            }
        }
    }

    fn lua_err(err: mlua::Error) -> EngineError { EngineError::fatal(format!("lua error: {err}")) }

    /// Recover from mutex poisoning rather than panicking: a panic while
    /// holding one of these locks (inside a Lua call, say) should not take
    /// down every other transaction sharing this host.
    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
