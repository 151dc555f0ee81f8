//! `stasis inspect`: header and section summary of a snapshot file

use anyhow::Context;
use stasis_core::snapshot::{open, read_header};
use stasis_core::{RawGraph, SnapshotOptions, SnapshotSummary};
use std::path::Path;

pub fn execute(file: &Path, options: &SnapshotOptions) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let header = read_header(&bytes)?;
    let payload = open(&bytes)?;
    let graph = RawGraph::parse_with_limit(payload, options.max_objects)?;

    println!("file:        {}", file.display());
    println!("version:     {}", header.version);
    println!("checksum:    {:08x}", header.checksum);
    println!("payload:     {} bytes", payload.len());
    print!("{}", SnapshotSummary::of(&graph));
    Ok(())
}
