//! Autokit entry point.
//!
//! Wires a [`Discovery`] over the given directories into a freshly
//! constructed [`Context`]: scan once, register, eagerly bootstrap. This is
//! the only thing external code needs to call to stand up the whole system.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;

use crate::context::Context;
use crate::discovery::{DescriptorLoader, Discovery, FsLoader};

/// Stand up the autoloader over `dirs` with the filesystem-backed loader.
///
/// Non-lazy modules have bootstrapped by the time this returns; the returned
/// context is the lookup capability for everything else.
pub fn run<I, P>(dirs: I) -> anyhow::Result<Context>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    run_with_loader(dirs, Arc::new(FsLoader::new()))
}

/// Like [`run`], with an injected descriptor loader.
pub fn run_with_loader<I, P>(
    dirs: I,
    loader: Arc<dyn DescriptorLoader>,
) -> anyhow::Result<Context>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let discovery = Discovery::with_dirs(dirs, loader);
    let descriptors = discovery
        .discover()
        .context("module discovery failed")?;
    tracing::info!(count = descriptors.len(), "module descriptors discovered");

    let context = Context::new(descriptors).context("module context construction failed")?;
    tracing::info!("module context ready");
    Ok(context)
}
