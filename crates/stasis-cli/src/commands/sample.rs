//! `stasis sample`: write a demo snapshot

use crate::demo;
use stasis_core::{save_graph, Heap, SnapshotContext, SnapshotOptions};
use std::path::Path;
use tracing::info;

pub fn execute(out: &Path, options: &SnapshotOptions) -> anyhow::Result<()> {
    let mut heap = Heap::new();
    demo::load_program(&mut heap)?;
    let ctx = SnapshotContext::with_options(&heap, options.clone());

    let world = demo::build_world(&mut heap)?;
    save_graph(&ctx, &heap, world, out)?;

    info!(path = %out.display(), "Wrote sample snapshot");
    Ok(())
}
