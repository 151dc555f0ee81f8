//! Stasis: object graph snapshots for embedded script heaps
//!
//! This crate saves everything reachable from a root script value into a
//! flat buffer and rebuilds an equivalent graph from it later, including:
//! - Aliasing: two references to one object restore as two references to one object
//! - Cycles, including self-referencing tables and arrays
//! - Static code values (classes, functions) matched by name against the loaded program
//! - A closed set of host-native values
//!
//! The script runtime is reached only through [`ScriptRuntime`]; [`Heap`] is
//! the in-tree implementation.
//!
//! ```ignore
//! let ctx = SnapshotContext::new(&heap);
//! let bytes = serialize_graph(&ctx, &heap, root)?;
//! let restored = unserialize_graph(&ctx, &mut heap, &bytes)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod heap;
pub mod snapshot;
pub mod value;

pub use config::{ConfigError, ShapePolicy, SnapshotOptions};
pub use error::{DecodeError, HeapError, SnapshotError, SnapshotResult, StaticKind};
pub use heap::{Heap, HostData, HostValue, NativeTypeId, ResourceLimits, ScriptRuntime};
pub use snapshot::{
    GraphSerializer, GraphUnserializer, NameCache, ProcessedObject, RawGraph, SnapshotContext,
    SnapshotSummary,
};
pub use value::{ObjectId, Value, ValueKind};

use std::path::Path;

/// Serialize everything reachable from `root` into a graph buffer
pub fn serialize_graph<R: ScriptRuntime + ?Sized>(
    ctx: &SnapshotContext,
    rt: &R,
    root: Value,
) -> SnapshotResult<Vec<u8>> {
    GraphSerializer::new(ctx, rt).serialize(root)
}

/// Rebuild a graph buffer into `rt` and return its root
pub fn unserialize_graph<R: ScriptRuntime + ?Sized>(
    ctx: &SnapshotContext,
    rt: &mut R,
    bytes: &[u8],
) -> SnapshotResult<Value> {
    GraphUnserializer::new(ctx, rt).unserialize(bytes)
}

/// Serialize `root` and save it to a snapshot file
///
/// Nothing is written unless serialization succeeds.
pub fn save_graph<R: ScriptRuntime + ?Sized>(
    ctx: &SnapshotContext,
    rt: &R,
    root: Value,
    path: impl AsRef<Path>,
) -> SnapshotResult<()> {
    let bytes = serialize_graph(ctx, rt, root)?;
    snapshot::save_snapshot(path, &bytes)
}

/// Load a snapshot file and rebuild it into `rt`
pub fn load_graph<R: ScriptRuntime + ?Sized>(
    ctx: &SnapshotContext,
    rt: &mut R,
    path: impl AsRef<Path>,
) -> SnapshotResult<Value> {
    let bytes = snapshot::load_snapshot(path)?;
    unserialize_graph(ctx, rt, &bytes)
}
