use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::descriptor::{BootstrapFn, DescriptorKind, ModuleDescriptor, ModuleValue};

/// The lookup capability handed to bootstrap functions and external callers.
///
/// This is the entire contract a module initializer may rely on.
pub trait ModuleLookup: Send + Sync {
    /// Resolve a module's exported value by id, bootstrapping it on first
    /// access.
    fn get_module(&self, id: &str) -> Result<ModuleValue, ContextError>;

    /// Fetch another context previously attached under `name`.
    fn get_context(&self, name: &str) -> Result<Arc<dyn ModuleLookup>, ContextError>;
}

struct PendingEntry {
    run: BootstrapFn,
    lazy: bool,
}

struct ContextState {
    /// Not-yet-initialized modules. Entries leave this table the moment
    /// their bootstrap starts.
    pending: HashMap<String, PendingEntry>,
    /// Authoritative cache of exported values; never recomputed or replaced
    /// for the lifetime of the context.
    resolved: HashMap<String, ModuleValue>,
    /// Ids whose bootstrap is currently on the stack.
    resolving: HashSet<String>,
    /// Other contexts attached under external names.
    contexts: HashMap<String, Arc<dyn ModuleLookup>>,
}

/// Registry and lazy-bootstrap engine over a flat list of discovered module
/// descriptors.
///
/// Each context owns its own registry and cache; multiple contexts may
/// coexist in one process and delegate lookups to each other via
/// [`put_context`](Context::put_context) without merging registries.
pub struct Context {
    state: Mutex<ContextState>,
}

impl Context {
    /// Classify `descriptors` into resolved/pending and run every non-lazy
    /// bootstrap before returning.
    ///
    /// Fails on the first descriptor without a usable id (a module that can
    /// never be looked up must not be silently admitted) and on the first
    /// eager bootstrap error.
    pub fn new(descriptors: Vec<ModuleDescriptor>) -> Result<Self, ContextError> {
        let mut pending = HashMap::new();
        let mut resolved = HashMap::new();
        let mut eager = Vec::new();

        for descriptor in descriptors {
            if descriptor.id().is_empty() {
                return Err(ContextError::MissingId);
            }
            let (id, kind) = descriptor.into_parts();
            // Last write wins: drop any earlier registration of this id.
            pending.remove(&id);
            resolved.remove(&id);
            match kind {
                DescriptorKind::Static(value) => {
                    resolved.insert(id, value);
                }
                DescriptorKind::Bootstrap { run, lazy } => {
                    if !lazy {
                        eager.push(id.clone());
                    }
                    pending.insert(id, PendingEntry { run, lazy });
                }
            }
        }

        tracing::debug!(
            resolved = resolved.len(),
            pending = pending.len(),
            "module descriptors classified"
        );

        let context = Self {
            state: Mutex::new(ContextState {
                pending,
                resolved,
                resolving: HashSet::new(),
                contexts: HashMap::new(),
            }),
        };
        context.bootstrap_eager(eager)?;
        Ok(context)
    }

    /// Resolve a module's exported value by id.
    ///
    /// Reentrant calls from inside a bootstrap are supported for *other* ids;
    /// requesting an id whose bootstrap is still running fails with
    /// [`ContextError::DependencyCycle`].
    pub fn get_module(&self, id: &str) -> Result<ModuleValue, ContextError> {
        let entry = {
            let mut state = self.state.lock();
            if let Some(value) = state.resolved.get(id) {
                return Ok(Arc::clone(value));
            }
            if state.resolving.contains(id) {
                return Err(ContextError::DependencyCycle { id: id.to_string() });
            }
            let Some(entry) = state.pending.remove(id) else {
                return Err(ContextError::UnknownModule(id.to_string()));
            };
            state.resolving.insert(id.to_string());
            entry
        };

        tracing::debug!(module = %id, "bootstrapping module");
        // The lock is released here: the bootstrap may re-enter get_module
        // for its own dependencies.
        let result = (entry.run)(self);

        let mut state = self.state.lock();
        state.resolving.remove(id);
        match result {
            Ok(value) => {
                state.resolved.insert(id.to_string(), Arc::clone(&value));
                Ok(value)
            }
            Err(source) => {
                // A failed bootstrap goes back to pending so a later lookup
                // may retry it.
                state.pending.insert(id.to_string(), entry);
                Err(ContextError::Bootstrap {
                    module: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Resolve a module and downcast its exported value to `T`.
    pub fn get_module_as<T>(&self, id: &str) -> Result<Arc<T>, ContextError>
    where
        T: std::any::Any + Send + Sync,
    {
        self.get_module(id)?
            .downcast::<T>()
            .map_err(|_| ContextError::TypeMismatch {
                module: id.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Attach another context under an external name, silently overwriting
    /// any previous registration of that name.
    pub fn put_context(&self, name: impl Into<String>, context: Arc<dyn ModuleLookup>) {
        self.state.lock().contexts.insert(name.into(), context);
    }

    /// Fetch a context previously attached with
    /// [`put_context`](Context::put_context).
    pub fn get_context(&self, name: &str) -> Result<Arc<dyn ModuleLookup>, ContextError> {
        self.state
            .lock()
            .contexts
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownContext(name.to_string()))
    }

    /// Eager pass over non-lazy entries in registration order. Resolving X
    /// may inline-resolve Y through X's bootstrap; Y's own turn then finds
    /// nothing left to do.
    fn bootstrap_eager(&self, eager: Vec<String>) -> Result<(), ContextError> {
        for id in eager {
            let still_pending = {
                let state = self.state.lock();
                state.pending.get(&id).is_some_and(|entry| !entry.lazy)
            };
            if still_pending {
                self.get_module(&id)?;
            }
        }
        Ok(())
    }
}

impl ModuleLookup for Context {
    fn get_module(&self, id: &str) -> Result<ModuleValue, ContextError> {
        Context::get_module(self, id)
    }

    fn get_context(&self, name: &str) -> Result<Arc<dyn ModuleLookup>, ContextError> {
        Context::get_context(self, name)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Context")
            .field("resolved", &state.resolved.len())
            .field("pending", &state.pending.len())
            .field("contexts", &state.contexts.len())
            .finish()
    }
}

/// Structured errors for module registration and lookup.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("autoloadable module descriptor must carry a non-empty id")]
    MissingId,
    #[error("module '{0}' is not registered")]
    UnknownModule(String),
    #[error("no context registered under name '{0}'")]
    UnknownContext(String),
    #[error("dependency cycle detected while resolving module '{id}'")]
    DependencyCycle { id: String },
    #[error("bootstrap failed for module '{module}'")]
    Bootstrap {
        module: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("module '{module}' does not export a value of type {expected}")]
    TypeMismatch {
        module: String,
        expected: &'static str,
    },
}
