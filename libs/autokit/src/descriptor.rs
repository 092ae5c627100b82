use std::any::Any;
use std::sync::Arc;

use crate::context::ModuleLookup;

/// The exported value of a resolved module.
///
/// Values are shared, never copied: repeated lookups hand out clones of the
/// same `Arc`.
pub type ModuleValue = Arc<dyn Any + Send + Sync>;

/// User-supplied initializer producing a module's exported value, given the
/// lookup capability it may resolve its own dependencies through.
pub type BootstrapFn =
    Arc<dyn Fn(&dyn ModuleLookup) -> anyhow::Result<ModuleValue> + Send + Sync>;

/// The unit of registration: a module id plus either a ready value or a
/// bootstrap function that produces one.
#[derive(Clone)]
pub struct ModuleDescriptor {
    id: String,
    kind: DescriptorKind,
}

#[derive(Clone)]
pub(crate) enum DescriptorKind {
    /// The descriptor is its own exported value; nothing to run.
    Static(ModuleValue),
    /// Needs initialization. `lazy` defers the bootstrap to first lookup.
    Bootstrap { run: BootstrapFn, lazy: bool },
}

impl ModuleDescriptor {
    /// A descriptor that carries its exported value directly.
    pub fn with_value(id: impl Into<String>, value: ModuleValue) -> Self {
        Self {
            id: id.into(),
            kind: DescriptorKind::Static(value),
        }
    }

    /// A descriptor whose value is produced by `run` (eagerly at context
    /// construction unless marked [`lazy`](Self::lazy)).
    pub fn with_bootstrap<F>(id: impl Into<String>, run: F) -> Self
    where
        F: Fn(&dyn ModuleLookup) -> anyhow::Result<ModuleValue> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            kind: DescriptorKind::Bootstrap {
                run: Arc::new(run),
                lazy: false,
            },
        }
    }

    /// Defer the bootstrap to the first lookup. No effect on static
    /// descriptors, which are resolved by definition.
    pub fn lazy(mut self) -> Self {
        if let DescriptorKind::Bootstrap { lazy, .. } = &mut self.kind {
            *lazy = true;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn needs_bootstrap(&self) -> bool {
        matches!(self.kind, DescriptorKind::Bootstrap { .. })
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, DescriptorKind::Bootstrap { lazy: true, .. })
    }

    pub(crate) fn into_parts(self) -> (String, DescriptorKind) {
        (self.id, self.kind)
    }
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("needs_bootstrap", &self.needs_bootstrap())
            .field("lazy", &self.is_lazy())
            .finish()
    }
}

/// A bootstrap function registered under a stable name.
///
/// Descriptor files reference registered bootstraps through their `bootstrap`
/// field; the filesystem loader resolves the name against submissions
/// collected here.
pub struct BootstrapRegistration {
    pub name: &'static str,
    pub run: fn(&dyn ModuleLookup) -> anyhow::Result<ModuleValue>,
}

impl BootstrapRegistration {
    pub const fn new(
        name: &'static str,
        run: fn(&dyn ModuleLookup) -> anyhow::Result<ModuleValue>,
    ) -> Self {
        Self { name, run }
    }
}

inventory::collect!(BootstrapRegistration);
