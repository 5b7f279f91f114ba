//! CLI command implementations.

mod build;
mod render;

use std::path::PathBuf;

use scadoc_config::Config;
use scadoc_render::{Pipeline, RenderCache};

pub(crate) use build::BuildArgs;
pub(crate) use render::RenderArgs;

/// Render pipeline writing to `out_dir`, resolving includes under `source_root`.
fn pipeline(config: &Config, out_dir: PathBuf, source_root: PathBuf) -> Pipeline {
    let cache = RenderCache::new(out_dir, config.openscad.command.clone())
        .with_source_root(source_root);
    Pipeline::new(cache).with_epstopdf(config.openscad.epstopdf.clone())
}
