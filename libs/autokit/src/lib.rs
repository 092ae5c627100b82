//! # Autokit - Filesystem Module Autoloader
//!
//! A small runtime for module discovery and lazy bootstrap: point it at a
//! set of root directories, and it registers every `*.auto.{json,yaml,yml}`
//! descriptor found beneath them by its declared id, then resolves each
//! module's exported value on first access (eagerly at construction, or
//! lazily on first lookup), running the module's bootstrap exactly once and
//! caching the result for the lifetime of the context.
//!
//! ## Features
//!
//! - **Discovered, not declared**: modules are plain manifest files under
//!   the scan roots; adding one requires no registration code.
//! - **Lazy by choice**: a descriptor opts into deferred bootstrap with
//!   `lazy: true`; everything else runs before the context is handed out.
//! - **Implicit dependency graph**: a bootstrap receives the lookup
//!   capability and pulls its own dependencies through it, depth-first on
//!   demand, with fail-fast cycle detection.
//! - **Composable contexts**: independently built contexts can be attached
//!   to each other under external names and delegate lookups without
//!   merging registries.
//!
//! ## Example
//!
//! ```rust,ignore
//! use autokit::{BootstrapRegistration, ModuleLookup, ModuleValue};
//! use std::sync::Arc;
//!
//! fn cache_bootstrap(ctx: &dyn ModuleLookup) -> anyhow::Result<ModuleValue> {
//!     let settings = ctx.get_module("settings")?;
//!     Ok(Arc::new(Cache::from_settings(&settings)?))
//! }
//!
//! inventory::submit! {
//!     BootstrapRegistration::new("cache", cache_bootstrap)
//! }
//!
//! // plugins/cache.auto.yaml:
//! //   id: cache
//! //   bootstrap: cache
//! //   lazy: true
//!
//! let context = autokit::run(["/app/plugins"])?;
//! let cache = context.get_module("cache")?;
//! ```

pub use anyhow::Result;

// Re-export inventory for user convenience
pub use inventory;

pub mod context;
pub mod descriptor;
pub mod discovery;
pub mod runner;

// Re-export main types
pub use context::{Context, ContextError, ModuleLookup};
pub use descriptor::{BootstrapRegistration, ModuleDescriptor, ModuleValue};
pub use discovery::{DescriptorLoader, Discovery, DiscoveryError, FsLoader};
pub use runner::{run, run_with_loader};
