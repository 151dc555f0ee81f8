//! Object graph snapshots
//!
//! [`GraphSerializer`] flattens everything reachable from a root value into
//! a buffer of per-kind sections; [`GraphUnserializer`] rebuilds an
//! equivalent graph from it in two passes. Static code values (classes and
//! functions) are written by name and looked up again through the
//! [`NameCache`] held by a [`SnapshotContext`].

mod format;
mod graph;
mod inspect;
mod io;
mod names;
mod persist;
mod processed;
mod registry;
mod serializer;
mod unserializer;
mod user_types;

pub use format::{open, read_header, seal, SnapshotHeader, HEADER_SIZE, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use graph::{ClassRecord, InstanceRecord, RawGraph, SECTION_ORDER};
pub use inspect::SnapshotSummary;
pub use io::{BufferReader, BufferWriter};
pub use names::{scan_namespace, Classification, NameCache};
pub use persist::{load_snapshot, save_snapshot};
pub use processed::ProcessedObject;
pub use registry::Registry;
pub use serializer::GraphSerializer;
pub use unserializer::{GraphUnserializer, Reference};
pub use user_types::{UserTypeTag, UserTypes};

use crate::config::SnapshotOptions;
use crate::error::SnapshotError;
use crate::heap::ScriptRuntime;
use tracing::error;

/// Per-program snapshot state
///
/// Create one after the program has been loaded and before any runtime
/// state exists, then pass it to every save and load against that runtime.
#[derive(Debug)]
pub struct SnapshotContext {
    names: NameCache,
    user_types: UserTypes,
    options: SnapshotOptions,
}

impl SnapshotContext {
    /// Scan a loaded program with default options
    pub fn new<R: ScriptRuntime + ?Sized>(rt: &R) -> Self {
        Self::with_options(rt, SnapshotOptions::default())
    }

    /// Scan a loaded program
    pub fn with_options<R: ScriptRuntime + ?Sized>(rt: &R, options: SnapshotOptions) -> Self {
        Self {
            names: NameCache::build(rt),
            user_types: UserTypes::new(),
            options,
        }
    }

    /// Static name table
    pub fn names(&self) -> &NameCache {
        &self.names
    }

    /// Host type bindings
    pub fn user_types(&self) -> &UserTypes {
        &self.user_types
    }

    /// Options in effect
    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    /// Report an unsupported or unresolved value
    ///
    /// Always logged; in strict mode this panics instead of returning.
    pub(crate) fn content_error(&self, err: SnapshotError) -> SnapshotError {
        error!(error = %err, "Snapshot content error");
        if self.options.strict {
            panic!("{}", err);
        }
        err
    }
}
