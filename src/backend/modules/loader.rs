//! Module Loader
//!
//! Turns a module id into executed, cached exports:
//!
//! 1. normalize the id
//! 2. resolve it through the repository chain
//! 3. return the cached exports when the module already ran (cache keys are
//!    the id that matched in the repository, so `foo` and `foo.sx` share
//!    one entry when both resolve to `foo.sx`)
//! 4. read the module text
//! 5. execute it in a fresh scope binding `require`, `exports` and `module`
//! 6. cache `module.exports` under the matched id
//!
//! Failed loads never populate the cache. Module bodies load their own
//! dependencies by calling `require`, which re-enters the same loader.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use super::cache::ModuleCache;
use super::chain::ResolutionChain;
use super::config::LoaderConfig;
use super::error::{LoadResult, ModuleError};
use super::locator::{Locator, RepositorySource, Resource};
use super::path::ModuleId;
use crate::backend::script::{
    evaluate, execute_module, install_builtins, RuntimeError, Scope, ScriptError, Value,
};

struct LoaderState {
    config: LoaderConfig,
    chain: ResolutionChain,
    cache: ModuleCache,
    /// Modules whose body is currently executing (cycle detection).
    loading: HashSet<ModuleId>,
    /// Builtins, host natives, `require` and `resolve`.
    globals: Scope,
    /// Persistent scope for console input.
    console: Scope,
}

/// Handle to a module loading engine.
///
/// Clones share the same repositories and cache. The loader is
/// single-threaded: it is neither `Send` nor `Sync`.
#[derive(Clone)]
pub struct ModuleLoader {
    state: Rc<RefCell<LoaderState>>,
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader {
    /// A loader with the default configuration: one directory locator for
    /// the current directory and the `.sx` extension.
    pub fn new() -> Self {
        Self::build(LoaderConfig::default(), Vec::new())
    }

    /// A loader whose default directory locator is `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let config = LoaderConfig {
            default_root: root.into(),
            ..LoaderConfig::default()
        };
        Self::build(config, Vec::new())
    }

    /// A loader built from `config`.
    ///
    /// Fails if one of the configured repositories is not a supported
    /// locator kind.
    pub fn with_config(config: LoaderConfig) -> LoadResult<Self> {
        let extra = config
            .repositories
            .iter()
            .map(|text| Locator::from_source(RepositorySource::descriptor(text.as_str())))
            .collect::<LoadResult<Vec<_>>>()?;
        Ok(Self::build(config, extra))
    }

    fn build(config: LoaderConfig, extra: Vec<Locator>) -> Self {
        let mut chain = ResolutionChain::new(config.default_root.clone(), config.extension.clone());
        for locator in extra {
            chain.add(locator);
        }

        let globals = Scope::new();
        install_builtins(&globals);
        let console = globals.child();

        let state = Rc::new(RefCell::new(LoaderState {
            config,
            chain,
            cache: ModuleCache::new(),
            loading: HashSet::new(),
            globals: globals.clone(),
            console,
        }));

        globals.define("require", require_native(Rc::downgrade(&state)));
        globals.define("resolve", resolve_native(Rc::downgrade(&state)));
        ModuleLoader { state }
    }

    /// Load a module and return its exports.
    pub fn load(&self, raw: &str) -> LoadResult<Value> {
        let id = ModuleId::normalize(raw).ok_or_else(|| ModuleError::InvalidIdentifier {
            raw: raw.to_string(),
        })?;
        self.load_id(id)
    }

    /// Load a module named by a script value.
    pub fn load_value(&self, raw: &Value) -> LoadResult<Value> {
        match ModuleId::from_value(raw)? {
            Some(id) => self.load_id(id),
            None => Err(ModuleError::InvalidIdentifier {
                raw: raw.to_string(),
            }),
        }
    }

    fn load_id(&self, id: ModuleId) -> LoadResult<Value> {
        let (key, resource) = self
            .state
            .borrow()
            .chain
            .locate(&id)
            .ok_or_else(|| ModuleError::NotFound { id: id.to_string() })?;

        if let Some(exports) = self.state.borrow().cache.get(&key) {
            debug!(module = %key, "using cached exports");
            return Ok(exports);
        }

        if self.state.borrow().loading.contains(&key) {
            return Err(ModuleError::CircularRequire { id: id.to_string() });
        }

        let uri = resource.uri();
        let source = resource.read_to_string().map_err(|e| ModuleError::Read {
            id: id.to_string(),
            uri: uri.clone(),
            source: e,
        })?;

        let (scope, module) = self.execution_scope(&id, &resource);

        info!(module = %id, uri = %uri, "loading module");
        self.state.borrow_mut().loading.insert(key.clone());
        let result = execute_module(&source, &scope);
        self.state.borrow_mut().loading.remove(&key);

        match result {
            Ok(()) => {}
            Err(ScriptError::Syntax(e)) => {
                return Err(ModuleError::Syntax {
                    id: id.to_string(),
                    uri,
                    line: Some(e.line),
                    message: e.message,
                })
            }
            Err(ScriptError::Runtime(e)) => {
                return Err(ModuleError::Execution {
                    id: id.to_string(),
                    uri,
                    source: e,
                })
            }
        }

        let exports = module.get("exports").unwrap_or(Value::Nil);
        self.state.borrow_mut().cache.put(key, exports.clone());
        Ok(exports)
    }

    /// Fresh scope for one module execution, plus its `module` record.
    fn execution_scope(&self, id: &ModuleId, resource: &Resource) -> (Scope, Value) {
        let state = self.state.borrow();
        let scope = state.globals.child();
        let exports = Value::dict();
        let module = Value::dict_from([
            ("id", Value::str(id.as_str())),
            ("uri", Value::from(resource.uri())),
            ("exports", exports.clone()),
        ]);
        if let Some(require) = state.globals.get("require") {
            scope.define("require", require);
        }
        scope.define("exports", exports);
        scope.define("module", module.clone());
        (scope, module)
    }

    /// Find the resource a module id resolves to, without loading it.
    pub fn resolve(&self, raw: &str) -> Option<Resource> {
        self.state.borrow().chain.resolve(raw)
    }

    /// Append a repository to the resolution chain. `None` is ignored.
    pub fn add_repository(&self, source: impl Into<Option<RepositorySource>>) -> LoadResult<()> {
        let Some(source) = source.into() else {
            return Ok(());
        };
        let locator = Locator::from_source(source)?;
        self.state.borrow_mut().chain.add(locator);
        Ok(())
    }

    /// Remove the repository at `index`; out-of-range indices are ignored.
    pub fn remove_repository(&self, index: usize) -> Option<Locator> {
        self.state.borrow_mut().chain.remove(index)
    }

    /// Restore the default directory plus the configured repositories.
    ///
    /// The module cache is left untouched.
    pub fn reset_repositories(&self) {
        let mut state = self.state.borrow_mut();
        state.chain.reset();
        let configured = state.config.repositories.clone();
        for text in configured {
            match Locator::from_source(RepositorySource::Descriptor(text)) {
                Ok(locator) => state.chain.add(locator),
                Err(e) => warn!(error = %e, "skipping configured repository"),
            }
        }
    }

    /// URIs of the repository roots, in resolution order.
    pub fn repositories(&self) -> Vec<String> {
        self.state
            .borrow()
            .chain
            .locators()
            .iter()
            .map(Locator::uri)
            .collect()
    }

    pub fn locators(&self) -> Vec<Locator> {
        self.state.borrow().chain.locators().to_vec()
    }

    /// Number of modules in the cache.
    pub fn cache_len(&self) -> usize {
        self.state.borrow().cache.len()
    }

    /// Whether the module named by `raw` has been loaded, under its own id
    /// or its extension-qualified form.
    pub fn is_cached(&self, raw: &str) -> bool {
        let Some(id) = ModuleId::normalize(raw) else {
            return false;
        };
        let state = self.state.borrow();
        state.cache.contains(&id) || state.cache.contains(&id.qualified(state.chain.extension()))
    }

    /// Ids of the cached modules, sorted.
    pub fn cached_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .cache
            .ids()
            .into_iter()
            .map(ModuleId::to_string)
            .collect()
    }

    /// Make a host function visible to every module body.
    pub fn register_native<F>(&self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        self.state
            .borrow()
            .globals
            .define(name, Value::native(name, func));
    }

    pub fn config(&self) -> LoaderConfig {
        self.state.borrow().config.clone()
    }

    /// Evaluate console input in a scope that persists between calls.
    pub fn evaluate_console(&self, source: &str) -> Result<Value, ScriptError> {
        let console = self.state.borrow().console.clone();
        evaluate(source, &console)
    }
}

fn loader_from(state: &Weak<RefCell<LoaderState>>) -> Result<ModuleLoader, RuntimeError> {
    state
        .upgrade()
        .map(|state| ModuleLoader { state })
        .ok_or_else(|| RuntimeError::new("module loader is no longer available"))
}

fn require_native(state: Weak<RefCell<LoaderState>>) -> Value {
    Value::native("require", move |args| {
        let [id] = args else {
            return Err(RuntimeError::new(format!(
                "require expects 1 argument, got {}",
                args.len()
            )));
        };
        loader_from(&state)?
            .load_value(id)
            .map_err(RuntimeError::from_module_error)
    })
}

fn resolve_native(state: Weak<RefCell<LoaderState>>) -> Value {
    Value::native("resolve", move |args| {
        let [id] = args else {
            return Err(RuntimeError::new(format!(
                "resolve expects 1 argument, got {}",
                args.len()
            )));
        };
        let id = ModuleId::from_value(id).map_err(RuntimeError::from_module_error)?;
        let loader = loader_from(&state)?;
        let resource = id.and_then(|id| loader.state.borrow().chain.find(&id));
        Ok(resource.map_or(Value::Nil, |r| Value::from(r.uri())))
    })
}
