//! Snapshot summaries

use super::graph::RawGraph;
use super::processed::ProcessedObject;
use crate::value::ValueKind;
use std::fmt;

/// Per-section counts and static names referenced by a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Number of class references
    pub classes: usize,
    /// Number of function references
    pub closures: usize,
    /// Number of strings
    pub strings: usize,
    /// Number of arrays
    pub arrays: usize,
    /// Number of tables
    pub tables: usize,
    /// Number of instances
    pub instances: usize,
    /// Host payloads, standalone or embedded in instances
    pub host_values: usize,
    /// Total string bytes
    pub string_bytes: usize,
    /// Kind of the root value
    pub root_kind: Option<ValueKind>,
    /// Class and function names, sorted
    pub static_names: Vec<String>,
}

impl SnapshotSummary {
    /// Summarize a parsed graph
    pub fn of(graph: &RawGraph) -> Self {
        let mut host_values = graph.instances.iter().filter(|r| r.native.is_some()).count();
        let mut count_inline = |p: &ProcessedObject| {
            if matches!(p, ProcessedObject::UserData(_)) {
                host_values += 1;
            }
        };
        graph.arrays.iter().flatten().for_each(&mut count_inline);
        for (key, value) in graph.tables.iter().flatten() {
            count_inline(key);
            count_inline(value);
        }
        graph
            .instances
            .iter()
            .flat_map(|r| r.members.iter())
            .for_each(&mut count_inline);
        count_inline(&graph.root);

        let mut static_names: Vec<String> = graph
            .classes
            .iter()
            .map(|c| c.name.clone())
            .chain(graph.closures.iter().cloned())
            .collect();
        static_names.sort();

        Self {
            classes: graph.classes.len(),
            closures: graph.closures.len(),
            strings: graph.strings.len(),
            arrays: graph.arrays.len(),
            tables: graph.tables.len(),
            instances: graph.instances.len(),
            host_values,
            string_bytes: graph.strings.iter().map(Vec::len).sum(),
            root_kind: Some(graph.root.kind()),
            static_names,
        }
    }

    /// Total number of section objects
    pub fn object_count(&self) -> usize {
        self.classes + self.closures + self.strings + self.arrays + self.tables + self.instances
    }
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "objects:     {}", self.object_count())?;
        writeln!(f, "  classes:   {}", self.classes)?;
        writeln!(f, "  functions: {}", self.closures)?;
        writeln!(f, "  strings:   {} ({} bytes)", self.strings, self.string_bytes)?;
        writeln!(f, "  arrays:    {}", self.arrays)?;
        writeln!(f, "  tables:    {}", self.tables)?;
        writeln!(f, "  instances: {}", self.instances)?;
        writeln!(f, "host values: {}", self.host_values)?;
        if let Some(kind) = self.root_kind {
            writeln!(f, "root:        {}", kind)?;
        }
        if !self.static_names.is_empty() {
            writeln!(f, "static references:")?;
            for name in &self.static_names {
                writeln!(f, "  {}", name)?;
            }
        }
        Ok(())
    }
}
