//! `stasis verify`: envelope, structure and (optionally) a trial restore

use crate::demo;
use anyhow::Context;
use stasis_core::snapshot::load_snapshot;
use stasis_core::{unserialize_graph, Heap, RawGraph, SnapshotContext, SnapshotOptions};
use std::path::Path;
use tracing::{debug, info};

pub fn execute(file: &Path, restore: bool, options: &SnapshotOptions) -> anyhow::Result<()> {
    let payload = load_snapshot(file).with_context(|| format!("verifying {}", file.display()))?;
    let graph = RawGraph::parse_with_limit(&payload, options.max_objects)?;
    graph.validate()?;
    debug!(objects = graph.object_count(), "Structure is valid");

    if restore {
        let mut heap = Heap::new();
        demo::load_program(&mut heap)?;
        let ctx = SnapshotContext::with_options(&heap, options.clone());
        let root = unserialize_graph(&ctx, &mut heap, &payload)
            .with_context(|| format!("restoring {}", file.display()))?;
        info!(root = ?root, objects = heap.object_count(), "Restored against demo program");
    }

    println!("{}: OK", file.display());
    Ok(())
}
